/// 事件分发器
///
/// 每个类别一组按注册顺序排列的订阅者，只追加不删除

use super::classify::MessageKind;
use super::error::RpcError;
use super::transport::CloseInfo;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

/// 消息订阅者
pub type MessageSubscriber = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

/// 连接建立订阅者
pub type OpenSubscriber = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// 传输错误订阅者
pub type ErrorSubscriber = Arc<dyn Fn(&RpcError) -> anyhow::Result<()> + Send + Sync>;

/// 连接关闭订阅者
pub type CloseSubscriber = Arc<dyn Fn(Option<&CloseInfo>) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
struct Registry {
    open: Vec<OpenSubscriber>,
    any_message: Vec<MessageSubscriber>,
    notification: Vec<MessageSubscriber>,
    request: Vec<MessageSubscriber>,
    success_response: Vec<MessageSubscriber>,
    error_response: Vec<MessageSubscriber>,
    transport_error: Vec<ErrorSubscriber>,
    close: Vec<CloseSubscriber>,
}

/// 依次执行订阅者，单个失败不影响后续，收集所有错误
fn run_each<S: ?Sized>(
    subscribers: &[Arc<S>],
    invoke: impl Fn(&S) -> anyhow::Result<()>,
) -> Vec<anyhow::Error> {
    subscribers
        .iter()
        .filter_map(|subscriber| invoke(&**subscriber).err())
        .collect()
}

/// 事件分发器
#[derive(Clone, Default)]
pub struct EventDispatcher {
    registry: Arc<RwLock<Registry>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_open<F>(&self, f: F)
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.registry.write().open.push(Arc::new(f));
    }

    /// 每条成功解码的入站消息都会触发，无论分类结果
    pub fn on_any_message<F>(&self, f: F)
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.registry.write().any_message.push(Arc::new(f));
    }

    pub fn on_notification<F>(&self, f: F)
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.registry.write().notification.push(Arc::new(f));
    }

    pub fn on_request<F>(&self, f: F)
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.registry.write().request.push(Arc::new(f));
    }

    pub fn on_success_response<F>(&self, f: F)
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.registry.write().success_response.push(Arc::new(f));
    }

    pub fn on_error_response<F>(&self, f: F)
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.registry.write().error_response.push(Arc::new(f));
    }

    pub fn on_error<F>(&self, f: F)
    where
        F: Fn(&RpcError) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.registry.write().transport_error.push(Arc::new(f));
    }

    pub fn on_close<F>(&self, f: F)
    where
        F: Fn(Option<&CloseInfo>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.registry.write().close.push(Arc::new(f));
    }

    /// 分发入站消息：先 any-message，再对应类别
    ///
    /// 订阅者在锁外执行，订阅者内部可以继续注册
    pub fn dispatch_message(&self, value: &Value, kind: Option<MessageKind>) -> Vec<anyhow::Error> {
        let (any, category) = {
            let registry = self.registry.read();
            let category = match kind {
                Some(MessageKind::Notification) => registry.notification.clone(),
                Some(MessageKind::Request) => registry.request.clone(),
                Some(MessageKind::SuccessResponse) => registry.success_response.clone(),
                Some(MessageKind::ErrorResponse) => registry.error_response.clone(),
                None => Vec::new(),
            };
            (registry.any_message.clone(), category)
        };

        let mut errors = run_each(&any[..], |s| s(value));
        errors.extend(run_each(&category[..], |s| s(value)));
        errors
    }

    pub fn dispatch_open(&self) -> Vec<anyhow::Error> {
        let subscribers = self.registry.read().open.clone();
        run_each(&subscribers[..], |s| s())
    }

    pub fn dispatch_error(&self, err: &RpcError) -> Vec<anyhow::Error> {
        let subscribers = self.registry.read().transport_error.clone();
        run_each(&subscribers[..], |s| s(err))
    }

    pub fn dispatch_close(&self, info: Option<&CloseInfo>) -> Vec<anyhow::Error> {
        let subscribers = self.registry.read().close.clone();
        run_each(&subscribers[..], |s| s(info))
    }
}
