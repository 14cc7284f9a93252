/// 请求 ID 生成器

use super::message::Id;
use std::sync::Arc;
use uuid::Uuid;

/// 可替换的 ID 生成函数
///
/// 替换后唯一性由调用方保证
pub type IdGenerator = Arc<dyn Fn() -> Id + Send + Sync>;

/// 默认生成器：基于时间的 UUID v1 字符串
///
/// 节点号每个生成器随机取一次
pub fn default_generator() -> IdGenerator {
    let node_id: [u8; 6] = rand::random();
    Arc::new(move || Id::String(Uuid::now_v1(&node_id).to_string()))
}
