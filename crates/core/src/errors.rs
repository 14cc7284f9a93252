use thiserror::Error;

/// 统一错误类型
#[derive(Error, Debug)]
pub enum Error {
    #[error("RPC 错误: {0}")]
    Rpc(crate::ws_rpc::RpcError),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, Error>;
