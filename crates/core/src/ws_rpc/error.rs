/// WebSocket RPC 错误定义

use super::message::{ErrorObject, Id};
use std::fmt;
use thiserror::Error;

/// RPC 错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorCode {
    Timeout,
    RemoteError,
    NotConnected,
    ConnectionClosed,
    DuplicateId,
    SerializationError,
    TransportError,
    InvalidUrl,
}

impl RpcErrorCode {
    /// 转换为字符串码
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "TIMEOUT",
            Self::RemoteError => "REMOTE_ERROR",
            Self::NotConnected => "NOT_CONNECTED",
            Self::ConnectionClosed => "CONNECTION_CLOSED",
            Self::DuplicateId => "DUPLICATE_ID",
            Self::SerializationError => "SERIALIZATION_ERROR",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::InvalidUrl => "INVALID_URL",
        }
    }
}

impl fmt::Display for RpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// RPC 错误
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// 在 responseTimeout 内没有收到响应
    #[error("请求超时: method={method}, id={id}")]
    Timeout { method: String, id: Id },

    /// 对端返回的 ErrorResponse，原样携带 `{code, message, data?}`
    #[error("远端错误: {0}")]
    Remote(ErrorObject),

    #[error("连接未建立")]
    NotConnected,

    #[error("连接已关闭")]
    ConnectionClosed,

    /// 同一个 id 仍在等待响应时再次注册
    #[error("请求 id 仍在等待响应: {0}")]
    DuplicateId(Id),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("传输错误: {0}")]
    Transport(String),

    #[error("无效的连接地址: {0}")]
    InvalidUrl(String),
}

impl RpcError {
    /// 超时错误
    pub fn timeout(method: impl Into<String>, id: Id) -> Self {
        Self::Timeout {
            method: method.into(),
            id,
        }
    }

    /// 连接关闭错误
    pub fn connection_closed() -> Self {
        Self::ConnectionClosed
    }

    /// 序列化错误
    pub fn serialization_error(err: impl fmt::Display) -> Self {
        Self::Serialization(err.to_string())
    }

    /// 传输层错误
    pub fn transport(err: impl fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn invalid_url(err: impl fmt::Display) -> Self {
        Self::InvalidUrl(err.to_string())
    }

    /// 稳定的错误码
    pub fn code(&self) -> RpcErrorCode {
        match self {
            Self::Timeout { .. } => RpcErrorCode::Timeout,
            Self::Remote(_) => RpcErrorCode::RemoteError,
            Self::NotConnected => RpcErrorCode::NotConnected,
            Self::ConnectionClosed => RpcErrorCode::ConnectionClosed,
            Self::DuplicateId(_) => RpcErrorCode::DuplicateId,
            Self::Serialization(_) => RpcErrorCode::SerializationError,
            Self::Transport(_) => RpcErrorCode::TransportError,
            Self::InvalidUrl(_) => RpcErrorCode::InvalidUrl,
        }
    }

    /// 如果是远端返回的错误，取出结构化错误对象
    pub fn remote(&self) -> Option<&ErrorObject> {
        match self {
            Self::Remote(obj) => Some(obj),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_error(err)
    }
}

impl From<RpcError> for crate::Error {
    fn from(err: RpcError) -> Self {
        crate::Error::Rpc(err)
    }
}
