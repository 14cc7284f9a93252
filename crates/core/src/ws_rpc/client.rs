/// WebSocket JSON-RPC 客户端
///
/// 持有传输句柄，把入站事件接到分类器、分发器和待响应调用表上

use super::classify::{classify, MessageKind};
use super::config::{ClientConfig, ClosePolicy};
use super::dispatcher::EventDispatcher;
use super::error::RpcError;
use super::id::{default_generator, IdGenerator};
use super::message::{BuildMode, EnvelopeBuilder, ErrorObject, Id};
use super::pending::PendingCalls;
use super::transport::{
    CloseInfo, RawMessageHook, SocketHandle, SocketInbound, SocketSender, TransportEvent,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

/// 记录订阅者返回的错误
fn report(event: &str, errors: Vec<anyhow::Error>) {
    for err in errors {
        warn!("订阅者处理 {} 事件失败: {:#}", event, err);
    }
}

/// 入站处理流程：解码 → 分类 → 分发 → 关联
#[derive(Clone)]
struct MessagePipeline {
    pending: PendingCalls,
    dispatcher: EventDispatcher,
    config: Arc<RwLock<ClientConfig>>,
}

impl MessagePipeline {
    async fn run(self, inbound: SocketInbound) {
        let SocketInbound { mut events, hook } = inbound;
        while let Some(event) = events.recv().await {
            self.handle_event(event, hook.as_ref());
        }
        debug!("消息监听任务结束");
    }

    fn handle_event(&self, event: TransportEvent, hook: Option<&RawMessageHook>) {
        match event {
            TransportEvent::Open => {
                info!("✅ WebSocket 连接已打开");
                report("open", self.dispatcher.dispatch_open());
            }
            TransportEvent::Message(msg) => {
                // 先交给 socket 上原有的处理器
                if let Some(hook) = hook {
                    hook(&msg);
                }
                self.handle_frame(msg);
            }
            TransportEvent::Error(err) => {
                warn!("传输错误: {}", err);
                report("error", self.dispatcher.dispatch_error(&err));
            }
            TransportEvent::Close(info) => self.handle_close(info.as_ref()),
        }
    }

    fn handle_frame(&self, msg: WsMessage) {
        let decoded = match msg {
            WsMessage::Text(text) => serde_json::from_str::<Value>(&text),
            WsMessage::Binary(data) => serde_json::from_slice::<Value>(&data),
            WsMessage::Close(frame) => {
                self.handle_close(frame.map(CloseInfo::from).as_ref());
                return;
            }
            _ => {
                debug!("收到控制帧，忽略");
                return;
            }
        };

        match decoded {
            Ok(value) => self.handle_value(value),
            Err(e) => {
                error!("解析入站消息失败: {}", e);
                report("error", self.dispatcher.dispatch_error(&RpcError::from(e)));
            }
        }
    }

    fn handle_close(&self, info: Option<&CloseInfo>) {
        info!("连接已关闭: {:?}", info);
        if self.config.read().close_policy == ClosePolicy::FailPending {
            let failed = self.pending.fail_all(RpcError::connection_closed());
            if failed > 0 {
                warn!("连接关闭，{} 个等待中的调用已失败", failed);
            }
        }
        report("close", self.dispatcher.dispatch_close(info));
    }

    fn handle_value(&self, value: Value) {
        let kind = classify(&value);
        debug!("📨 收到消息: kind={:?}", kind);
        report("message", self.dispatcher.dispatch_message(&value, kind));

        let outcome = match kind {
            Some(MessageKind::SuccessResponse) => {
                Ok(value.get("result").cloned().unwrap_or(Value::Null))
            }
            Some(MessageKind::ErrorResponse) => Err(RpcError::Remote(ErrorObject::from_value(
                value.get("error").unwrap_or(&Value::Null),
            ))),
            _ => return,
        };

        let Some(id) = value.get("id").and_then(Id::from_value) else {
            debug!("响应 id 无法识别: {}", value["id"]);
            return;
        };
        if !self.pending.resolve(&id, outcome) {
            debug!("收到未预期的响应消息: {}", id);
        }
    }
}

/// WebSocket JSON-RPC 客户端
///
/// 克隆得到的句柄共享同一个连接、调用表和订阅者
#[derive(Clone)]
pub struct WsRpcClient {
    socket: Arc<Mutex<Option<SocketHandle>>>,
    listener: Arc<Mutex<Option<JoinHandle<()>>>>,
    pending: PendingCalls,
    dispatcher: EventDispatcher,
    builder: Arc<RwLock<EnvelopeBuilder>>,
    id_generator: Arc<RwLock<IdGenerator>>,
    config: Arc<RwLock<ClientConfig>>,
}

impl Default for WsRpcClient {
    fn default() -> Self {
        Self::new()
    }
}

impl WsRpcClient {
    pub fn new() -> Self {
        Self {
            socket: Arc::new(Mutex::new(None)),
            listener: Arc::new(Mutex::new(None)),
            pending: PendingCalls::new(),
            dispatcher: EventDispatcher::new(),
            builder: Arc::new(RwLock::new(EnvelopeBuilder::default())),
            id_generator: Arc::new(RwLock::new(default_generator())),
            config: Arc::new(RwLock::new(ClientConfig::default())),
        }
    }

    fn pipeline(&self) -> MessagePipeline {
        MessagePipeline {
            pending: self.pending.clone(),
            dispatcher: self.dispatcher.clone(),
            config: self.config.clone(),
        }
    }

    /// 建立连接，握手完成（open）后返回
    ///
    /// 不设内部超时，需要有界等待时由调用方自行包一层 `tokio::time::timeout`
    pub async fn connect(&self, url: &str, protocols: &[&str]) -> Result<(), RpcError> {
        let mut request = url.into_client_request().map_err(RpcError::invalid_url)?;
        if !protocols.is_empty() {
            let value = HeaderValue::from_str(&protocols.join(", ")).map_err(RpcError::invalid_url)?;
            request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
        }

        info!("尝试连接到: {}", url);
        let (stream, _) = match connect_async(request).await {
            Ok(conn) => conn,
            Err(e) => {
                let err = RpcError::transport(e);
                error!("连接错误: {}", err);
                report("error", self.dispatcher.dispatch_error(&err));
                return Err(err);
            }
        };
        info!("✅ WebSocket 连接成功: {}", url);

        self.change_socket(SocketHandle::from_stream(stream));
        report("open", self.dispatcher.dispatch_open());
        self.listen_messages()
    }

    /// 替换传输句柄，不重新握手
    ///
    /// 旧句柄的监听任务随之停止，需要再调用 `listen_messages` 接收新句柄的消息
    pub fn change_socket(&self, handle: SocketHandle) {
        if let Some(task) = self.listener.lock().take() {
            task.abort();
        }
        *self.socket.lock() = Some(handle);
        debug!("传输句柄已替换");
    }

    /// 开始监听当前句柄的入站事件
    ///
    /// 句柄上原有的原始消息处理器保留，并先于引擎执行
    pub fn listen_messages(&self) -> Result<(), RpcError> {
        let inbound = {
            let mut socket = self.socket.lock();
            let handle = socket.as_mut().ok_or(RpcError::NotConnected)?;
            handle.take_inbound()
        };
        let Some(inbound) = inbound else {
            debug!("当前句柄已在监听");
            return Ok(());
        };

        let task = tokio::spawn(self.pipeline().run(inbound));
        if let Some(previous) = self.listener.lock().replace(task) {
            previous.abort();
        }
        Ok(())
    }

    fn sender(&self) -> Result<SocketSender, RpcError> {
        self.socket
            .lock()
            .as_ref()
            .map(SocketHandle::sender)
            .ok_or(RpcError::NotConnected)
    }

    fn builder(&self) -> EnvelopeBuilder {
        *self.builder.read()
    }

    /// 发送请求并等待响应
    ///
    /// 返回对端的 `result`；对端返回 error 时为 `RpcError::Remote`，超时为 `RpcError::Timeout`
    pub async fn call(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> Result<Value, RpcError> {
        let method = method.into();
        let sender = self.sender()?;

        let generate = self.id_generator.read().clone();
        let id = generate();
        let json = self
            .builder()
            .request(id.clone(), method.as_str(), params)
            .to_json()?;
        let timeout = self.config.read().effective_timeout();

        // 先注册再发送，避免响应先于注册到达。
        // 发送失败或调用方丢弃 future 时由守卫移除条目
        let (rx, _guard) = self
            .pending
            .register_guarded(id.clone(), method.as_str(), timeout)?;

        info!("📤 发送请求: method={}, id={}", method, id);
        debug!("📤 请求内容: {}", json);
        sender.send_text(json)?;

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(RpcError::connection_closed()),
        }
    }

    /// 发送通知（不等待响应）
    pub fn notify(&self, method: impl Into<String>, params: Option<Value>) -> Result<(), RpcError> {
        let method = method.into();
        let json = self.builder().notification(method.as_str(), params).to_json()?;
        debug!("📤 发送通知: method={}", method);
        self.sender()?.send_text(json)
    }

    /// 回复对端发来的请求
    pub fn send_response(&self, id: Id, result: Value) -> Result<(), RpcError> {
        let json = self.builder().success(id, result).to_json()?;
        self.sender()?.send_text(json)
    }

    /// 以错误回复对端发来的请求
    pub fn send_error_response(&self, id: Id, error: ErrorObject) -> Result<(), RpcError> {
        let json = self.builder().error(id, error).to_json()?;
        self.sender()?.send_text(json)
    }

    /// 替换 ID 生成器，唯一性由调用方负责
    pub fn custom_id<F>(&self, generate: F)
    where
        F: Fn() -> Id + Send + Sync + 'static,
    {
        *self.id_generator.write() = Arc::new(generate);
    }

    /// 切换到裸模式：四种信封都不再携带 `jsonrpc`
    pub fn no_rpc(&self) {
        *self.builder.write() = EnvelopeBuilder::new(BuildMode::Bare);
    }

    /// 切回严格 JSON-RPC 2.0 模式
    pub fn strict_rpc(&self) {
        *self.builder.write() = EnvelopeBuilder::new(BuildMode::Strict);
    }

    pub fn build_mode(&self) -> BuildMode {
        self.builder().mode()
    }

    /// 替换配置，对之后的 `call` 生效
    pub fn configure(&self, config: ClientConfig) {
        *self.config.write() = config;
    }

    pub fn config(&self) -> ClientConfig {
        self.config.read().clone()
    }

    /// 直接处理一条已解码的入站消息
    pub fn handle_message(&self, value: Value) {
        self.pipeline().handle_value(value);
    }

    /// 等待中的调用数量
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_connected(&self) -> bool {
        self.sender().map_or(false, |s| !s.is_closed())
    }

    /// 发送关闭帧并释放传输句柄
    ///
    /// 关闭事件仍由监听任务在对端确认后分发
    pub fn close(&self, info: Option<CloseInfo>) -> Result<(), RpcError> {
        let handle = self.socket.lock().take().ok_or(RpcError::NotConnected)?;
        handle
            .sender()
            .send(WsMessage::Close(info.as_ref().map(Into::into)))
    }

    pub fn on_open<F>(&self, f: F)
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.on_open(f);
    }

    pub fn on_any_message<F>(&self, f: F)
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.on_any_message(f);
    }

    pub fn on_notification<F>(&self, f: F)
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.on_notification(f);
    }

    pub fn on_request<F>(&self, f: F)
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.on_request(f);
    }

    pub fn on_success_response<F>(&self, f: F)
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.on_success_response(f);
    }

    pub fn on_error_response<F>(&self, f: F)
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.on_error_response(f);
    }

    /// 传输错误（包括入站消息解码失败）
    pub fn on_error<F>(&self, f: F)
    where
        F: Fn(&RpcError) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.on_error(f);
    }

    pub fn on_close<F>(&self, f: F)
    where
        F: Fn(Option<&CloseInfo>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.on_close(f);
    }
}
