/// WebSocket JSON-RPC 模块
///
/// 单条 WebSocket 连接上的 JSON-RPC 2.0 客户端引擎：
/// 信封构建、入站分类、按 id 关联响应、单次调用超时

pub mod classify;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod id;
pub mod message;
pub mod pending;
pub mod transport;

pub use classify::{classify, MessageKind};
pub use client::WsRpcClient;
pub use config::{ClientConfig, ClosePolicy, DEFAULT_RESPONSE_TIMEOUT};
pub use dispatcher::EventDispatcher;
pub use error::{RpcError, RpcErrorCode};
pub use id::{default_generator, IdGenerator};
pub use message::{BuildMode, Envelope, EnvelopeBuilder, ErrorObject, Id, JSONRPC_VERSION};
pub use pending::{PendingCalls, PendingGuard};
pub use transport::{CloseInfo, SocketHandle, SocketPeer, SocketSender, TransportEvent};
