/// JSON-RPC 2.0 消息信封定义
///
/// 四种信封（Notification / Request / SuccessResponse / ErrorResponse）
/// 由字段形状区分，没有显式的类型标签字段

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// 严格模式下写入的协议版本号
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 预定义错误码：内部错误
pub const INTERNAL_ERROR: i64 = -32603;

/// 请求标识符（字符串或整数）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Number(i64),
    String(String),
}

impl Id {
    /// 从解码后的 JSON 值中提取标识符
    ///
    /// 只接受整数和字符串，其余形状返回 `None`
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Number(n) => n.as_i64().map(Self::Number),
            _ => None,
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// ErrorResponse 中的结构化错误对象
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// 错误码
    pub code: i64,

    /// 错误消息
    pub message: String,

    /// 错误详情（可选，缺省时不序列化）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(code: i64, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// 宽松解析对端发来的 `error` 字段
    ///
    /// 形状不符合 `{code, message, data?}` 时，原始值放进 `data` 交给调用方
    pub fn from_value(value: &Value) -> Self {
        match serde_json::from_value::<Self>(value.clone()) {
            Ok(obj) => obj,
            Err(_) => Self::with_data(INTERNAL_ERROR, "响应中的 error 字段格式无效", value.clone()),
        }
    }
}

impl fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// 信封构建模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// 携带 `jsonrpc: "2.0"` 字段
    #[default]
    Strict,
    /// 省略 `jsonrpc` 字段
    Bare,
}

/// 通知消息（无 id，不需要响应）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<&'static str>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// 请求消息（期望恰好一个响应）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<&'static str>,
    pub id: Id,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// 成功响应
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<&'static str>,
    pub id: Id,
    pub result: Value,
}

/// 错误响应
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<&'static str>,
    pub id: Id,
    pub error: ErrorObject,
}

/// 任意一种出站信封
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    Notification(Notification),
    Request(Request),
    SuccessResponse(SuccessResponse),
    ErrorResponse(ErrorResponse),
}

impl Envelope {
    /// 序列化为 JSON 字符串
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// 序列化为 JSON 值
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// 信封构建器
///
/// 模式在配置时确定，四种信封共用同一个模式，不支持单次调用覆盖
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeBuilder {
    mode: BuildMode,
}

impl EnvelopeBuilder {
    pub fn new(mode: BuildMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    fn version(&self) -> Option<&'static str> {
        match self.mode {
            BuildMode::Strict => Some(JSONRPC_VERSION),
            BuildMode::Bare => None,
        }
    }

    /// 创建通知消息
    pub fn notification(&self, method: impl Into<String>, params: Option<Value>) -> Envelope {
        Envelope::Notification(Notification {
            jsonrpc: self.version(),
            method: method.into(),
            params,
        })
    }

    /// 创建请求消息
    pub fn request(&self, id: Id, method: impl Into<String>, params: Option<Value>) -> Envelope {
        Envelope::Request(Request {
            jsonrpc: self.version(),
            id,
            method: method.into(),
            params,
        })
    }

    /// 创建成功响应
    pub fn success(&self, id: Id, result: Value) -> Envelope {
        Envelope::SuccessResponse(SuccessResponse {
            jsonrpc: self.version(),
            id,
            result,
        })
    }

    /// 创建错误响应
    pub fn error(&self, id: Id, error: ErrorObject) -> Envelope {
        Envelope::ErrorResponse(ErrorResponse {
            jsonrpc: self.version(),
            id,
            error,
        })
    }
}
