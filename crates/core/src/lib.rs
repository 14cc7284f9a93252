/// wsrpc - WebSocket JSON-RPC 2.0 客户端
///
/// 提供信封构建、消息分类、请求关联和超时控制

pub mod errors;
pub mod ws_rpc;

// 重新导出常用类型
pub use errors::{Error, Result};
pub use ws_rpc::{ClientConfig, ClosePolicy, Id, MessageKind, RpcError, WsRpcClient};
