/// 传输层边界
///
/// 引擎只通过事件流（入站）和消息通道（出站）接触 WebSocket，
/// 具体连接可以来自 `connect`，也可以是其他代码持有的 socket

use super::error::RpcError;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error};

/// 连接关闭信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

impl From<CloseFrame<'_>> for CloseInfo {
    fn from(frame: CloseFrame<'_>) -> Self {
        Self {
            code: frame.code.into(),
            reason: frame.reason.into_owned(),
        }
    }
}

impl From<&CloseInfo> for CloseFrame<'static> {
    fn from(info: &CloseInfo) -> Self {
        CloseFrame {
            code: CloseCode::from(info.code),
            reason: info.reason.clone().into(),
        }
    }
}

/// 传输层事件
#[derive(Debug)]
pub enum TransportEvent {
    Open,
    Message(WsMessage),
    Error(RpcError),
    Close(Option<CloseInfo>),
}

/// 其他代码预先挂在 socket 上的原始消息处理器
///
/// 监听时先于引擎自身的分类流程执行
pub type RawMessageHook = Arc<dyn Fn(&WsMessage) + Send + Sync>;

/// 出站发送端
#[derive(Clone)]
pub struct SocketSender {
    tx: mpsc::UnboundedSender<WsMessage>,
}

impl SocketSender {
    pub fn send(&self, msg: WsMessage) -> Result<(), RpcError> {
        self.tx.send(msg).map_err(|_| RpcError::connection_closed())
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<(), RpcError> {
        self.send(WsMessage::Text(text.into()))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// 入站事件流及其附带的原始处理器
pub struct SocketInbound {
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
    pub hook: Option<RawMessageHook>,
}

/// 引擎持有的传输句柄
pub struct SocketHandle {
    sender: SocketSender,
    inbound: Option<SocketInbound>,
}

impl SocketHandle {
    /// 由发送通道和事件流组装句柄
    pub fn new(
        outbound: mpsc::UnboundedSender<WsMessage>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self {
            sender: SocketSender { tx: outbound },
            inbound: Some(SocketInbound { events, hook: None }),
        }
    }

    /// 创建内存句柄，另一端交给 socket 的实际持有者
    pub fn pair() -> (Self, SocketPeer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let handle = Self::new(out_tx, event_rx);
        let peer = SocketPeer {
            events: event_tx,
            frames: out_rx,
        };
        (handle, peer)
    }

    /// 包装已经完成握手的 WebSocket 连接
    ///
    /// 拆分为发送任务和接收任务，两者通过通道与引擎交互
    pub fn from_stream<S>(stream: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_sender, mut ws_receiver) = stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<WsMessage>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<TransportEvent>();

        // 发送任务
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, WsMessage::Close(_));
                if let Err(e) = ws_sender.send(msg).await {
                    error!("发送消息失败: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            debug!("发送任务结束");
        });

        // 接收任务
        tokio::spawn(async move {
            let mut close_info = None;
            while let Some(result) = ws_receiver.next().await {
                match result {
                    Ok(WsMessage::Close(frame)) => {
                        close_info = frame.map(CloseInfo::from);
                        break;
                    }
                    Ok(msg) => {
                        if event_tx.send(TransportEvent::Message(msg)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("接收消息错误: {}", e);
                        let _ = event_tx.send(TransportEvent::Error(RpcError::transport(e)));
                        break;
                    }
                }
            }
            let _ = event_tx.send(TransportEvent::Close(close_info));
            debug!("接收任务结束");
        });

        Self::new(out_tx, event_rx)
    }

    /// 挂上其他代码的原始消息处理器
    pub fn with_message_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&WsMessage) + Send + Sync + 'static,
    {
        if let Some(inbound) = self.inbound.as_mut() {
            inbound.hook = Some(Arc::new(hook));
        }
        self
    }

    pub fn sender(&self) -> SocketSender {
        self.sender.clone()
    }

    /// 取走入站事件流，只能取一次
    pub fn take_inbound(&mut self) -> Option<SocketInbound> {
        self.inbound.take()
    }
}

/// 内存句柄的对端：向引擎推送事件、读取引擎发出的帧
pub struct SocketPeer {
    events: mpsc::UnboundedSender<TransportEvent>,
    frames: mpsc::UnboundedReceiver<WsMessage>,
}

impl SocketPeer {
    pub fn push(&self, event: TransportEvent) -> Result<(), RpcError> {
        self.events.send(event).map_err(|_| RpcError::connection_closed())
    }

    pub fn open(&self) -> Result<(), RpcError> {
        self.push(TransportEvent::Open)
    }

    pub fn push_text(&self, text: impl Into<String>) -> Result<(), RpcError> {
        self.push(TransportEvent::Message(WsMessage::Text(text.into())))
    }

    pub fn push_json(&self, value: &Value) -> Result<(), RpcError> {
        self.push_text(serde_json::to_string(value)?)
    }

    pub fn error(&self, err: RpcError) -> Result<(), RpcError> {
        self.push(TransportEvent::Error(err))
    }

    pub fn close(&self, info: Option<CloseInfo>) -> Result<(), RpcError> {
        self.push(TransportEvent::Close(info))
    }

    /// 读取引擎发出的下一帧
    pub async fn next_frame(&mut self) -> Option<WsMessage> {
        self.frames.recv().await
    }

    /// 读取下一帧文本并解码为 JSON
    pub async fn next_json(&mut self) -> Option<Result<Value, RpcError>> {
        loop {
            match self.frames.recv().await? {
                WsMessage::Text(text) => return Some(serde_json::from_str(&text).map_err(RpcError::from)),
                WsMessage::Binary(data) => return Some(serde_json::from_slice(&data).map_err(RpcError::from)),
                _ => continue,
            }
        }
    }
}
