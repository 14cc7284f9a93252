/// 入站消息分类
///
/// 按固定顺序逐条匹配，先命中者生效：
/// Notification → Request → SuccessResponse → ErrorResponse

use serde_json::{Map, Value};

/// 入站消息类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Notification,
    Request,
    SuccessResponse,
    ErrorResponse,
}

/// 按 JSON-RPC 对端惯用的真值规则判断字段
///
/// null、false、0、空字符串为假
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn has_truthy(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).map_or(false, is_truthy)
}

/// 对解码后的入站值分类
///
/// 非对象，或者带 id 却既没有 method 也没有 result/error 的对象，返回 `None`
pub fn classify(value: &Value) -> Option<MessageKind> {
    let obj = value.as_object()?;

    // id 缺失或为假值即视为通知，必须先于 method 判断
    if !has_truthy(obj, "id") {
        return Some(MessageKind::Notification);
    }
    if has_truthy(obj, "method") {
        return Some(MessageKind::Request);
    }
    // result / error 按字段存在判断，null 也算
    if obj.contains_key("result") {
        return Some(MessageKind::SuccessResponse);
    }
    if obj.contains_key("error") {
        return Some(MessageKind::ErrorResponse);
    }
    None
}
