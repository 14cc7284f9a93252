/// 待响应调用表
///
/// 每个 id 的状态：不存在 → 等待中 → 终态（立即移除）。
/// 超时和响应到达都通过同一次 `remove` 完成状态迁移，后到的一方是空操作

use super::error::RpcError;
use super::message::Id;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// 调用结果接收端
pub type CallOutcome = Result<Value, RpcError>;

/// RPC 响应等待器
type Resolver = oneshot::Sender<CallOutcome>;

struct PendingCall {
    method: String,
    /// 注册序号，防止旧定时器误删同 id 的新条目
    seq: u64,
    resolver: Resolver,
    timer: Option<JoinHandle<()>>,
}

/// `register_guarded` 返回的守卫
///
/// 调用已结束（响应、超时、批量失败）时释放守卫是空操作
pub struct PendingGuard {
    calls: PendingCalls,
    id: Id,
    seq: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.calls.abandon(&self.id, self.seq);
    }
}

#[derive(Default)]
struct Table {
    calls: HashMap<Id, PendingCall>,
}

/// 待响应调用表
#[derive(Clone, Default)]
pub struct PendingCalls {
    table: Arc<Mutex<Table>>,
    next_seq: Arc<AtomicU64>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册等待响应的调用
    ///
    /// `timeout` 为正数时启动一次性定时器；同一 id 仍在等待时返回 `DuplicateId`。
    /// 必须在 tokio 运行时内调用
    pub fn register(
        &self,
        id: Id,
        method: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<oneshot::Receiver<CallOutcome>, RpcError> {
        self.insert(id, method.into(), timeout).map(|(rx, _)| rx)
    }

    /// 注册调用并返回守卫，守卫释放时若调用仍在等待则将其移除
    ///
    /// 调用方放弃等待（future 被丢弃）时不会在表里留下条目
    pub fn register_guarded(
        &self,
        id: Id,
        method: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<(oneshot::Receiver<CallOutcome>, PendingGuard), RpcError> {
        let (rx, seq) = self.insert(id.clone(), method.into(), timeout)?;
        let guard = PendingGuard {
            calls: self.clone(),
            id,
            seq,
        };
        Ok((rx, guard))
    }

    fn insert(
        &self,
        id: Id,
        method: String,
        timeout: Option<Duration>,
    ) -> Result<(oneshot::Receiver<CallOutcome>, u64), RpcError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        let mut table = self.table.lock();
        if table.calls.contains_key(&id) {
            return Err(RpcError::DuplicateId(id));
        }

        let timer = timeout.filter(|d| !d.is_zero()).map(|duration| {
            let calls = self.clone();
            let id = id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                calls.expire(&id, seq);
            })
        });

        table.calls.insert(
            id,
            PendingCall {
                method,
                seq,
                resolver: tx,
                timer,
            },
        );
        Ok((rx, seq))
    }

    /// 用响应结果结束等待中的调用
    ///
    /// 返回 false 表示 id 未知或已经结束
    pub fn resolve(&self, id: &Id, outcome: CallOutcome) -> bool {
        let call = self.table.lock().calls.remove(id);
        match call {
            Some(call) => {
                if let Some(timer) = call.timer {
                    timer.abort();
                }
                debug!("调用完成: method={}, id={}", call.method, id);
                // 调用方已放弃等待时发送失败，忽略即可
                let _ = call.resolver.send(outcome);
                true
            }
            None => false,
        }
    }

    /// 只移除由 `seq` 这次注册产生的条目
    fn take(&self, id: &Id, seq: u64) -> Option<PendingCall> {
        let mut table = self.table.lock();
        match table.calls.get(id) {
            Some(call) if call.seq == seq => table.calls.remove(id),
            _ => None,
        }
    }

    /// 定时器触发
    fn expire(&self, id: &Id, seq: u64) {
        if let Some(call) = self.take(id, seq) {
            warn!("⏱️ 请求超时: method={}, id={}", call.method, id);
            let _ = call.resolver.send(Err(RpcError::timeout(call.method, id.clone())));
        }
    }

    /// 调用方放弃等待
    fn abandon(&self, id: &Id, seq: u64) {
        if let Some(call) = self.take(id, seq) {
            if let Some(timer) = call.timer {
                timer.abort();
            }
            debug!("调用方已放弃等待: method={}, id={}", call.method, id);
        }
    }

    /// 以同一个错误结束所有等待中的调用，返回结束的数量
    pub fn fail_all(&self, err: RpcError) -> usize {
        let calls: Vec<(Id, PendingCall)> = self.table.lock().calls.drain().collect();
        let count = calls.len();
        for (id, call) in calls {
            if let Some(timer) = call.timer {
                timer.abort();
            }
            debug!("清理待处理请求: method={}, id={}", call.method, id);
            let _ = call.resolver.send(Err(err.clone()));
        }
        count
    }

    /// 是否仍在等待
    pub fn contains(&self, id: &Id) -> bool {
        self.table.lock().calls.contains_key(id)
    }

    /// 等待中的调用数量
    pub fn len(&self) -> usize {
        self.table.lock().calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Instant;

    #[tokio::test]
    async fn test_register_and_resolve() {
        let pending = PendingCalls::new();
        let rx = pending.register(Id::from("a"), "sum", None).unwrap();
        assert_eq!(pending.len(), 1);

        assert!(pending.resolve(&Id::from("a"), Ok(json!(3))));
        assert!(pending.is_empty());
        assert_eq!(rx.await.unwrap().unwrap(), json!(3));
    }

    #[tokio::test]
    async fn test_resolve_unknown_id() {
        let pending = PendingCalls::new();
        assert!(!pending.resolve(&Id::Number(1), Ok(json!(null))));
    }

    #[tokio::test]
    async fn test_second_resolution_is_noop() {
        let pending = PendingCalls::new();
        let rx = pending.register(Id::Number(9), "x", None).unwrap();

        assert!(pending.resolve(&Id::Number(9), Ok(json!("first"))));
        assert!(!pending.resolve(
            &Id::Number(9),
            Err(RpcError::Remote(crate::ws_rpc::ErrorObject::new(1, "second")))
        ));
        assert_eq!(rx.await.unwrap().unwrap(), json!("first"));
    }

    #[tokio::test]
    async fn test_timeout_expires_entry() {
        let pending = PendingCalls::new();
        let started = Instant::now();
        let rx = pending
            .register(Id::from("slow"), "never-answered", Some(Duration::from_millis(30)))
            .unwrap();

        let err = rx.await.unwrap().unwrap_err();
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(err.code(), crate::ws_rpc::RpcErrorCode::Timeout);
        assert!(err.to_string().contains("never-answered"));
        assert!(!pending.contains(&Id::from("slow")));

        // 迟到的响应不再生效
        assert!(!pending.resolve(&Id::from("slow"), Ok(json!(1))));
    }

    #[tokio::test]
    async fn test_response_before_timeout_cancels_timer() {
        let pending = PendingCalls::new();
        let rx = pending
            .register(Id::Number(1), "fast", Some(Duration::from_millis(20)))
            .unwrap();
        assert!(pending.resolve(&Id::Number(1), Ok(json!("ok"))));
        assert_eq!(rx.await.unwrap().unwrap(), json!("ok"));

        // 同 id 重新注册后，旧定时器不会影响新条目
        let _rx = pending.register(Id::Number(1), "again", None).unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(pending.contains(&Id::Number(1)));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let pending = PendingCalls::new();
        let _rx = pending.register(Id::from("dup"), "a", None).unwrap();
        let err = pending.register(Id::from("dup"), "b", None).unwrap_err();
        assert!(matches!(err, RpcError::DuplicateId(_)));
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_timeout_disables_timer() {
        let pending = PendingCalls::new();
        let _rx = pending
            .register(Id::from("z"), "wait", Some(Duration::ZERO))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(pending.contains(&Id::from("z")));
    }

    #[tokio::test]
    async fn test_guard_drop_removes_abandoned_call() {
        let pending = PendingCalls::new();
        let (rx, guard) = pending
            .register_guarded(Id::from("g"), "abandoned", None)
            .unwrap();
        drop(rx);
        drop(guard);
        assert!(pending.is_empty());

        // 同一 id 可以再次注册
        let _call = pending.register_guarded(Id::from("g"), "again", None).unwrap();
        assert!(pending.contains(&Id::from("g")));
    }

    #[tokio::test]
    async fn test_stale_guard_leaves_newer_call() {
        let pending = PendingCalls::new();
        let (rx, old_guard) = pending.register_guarded(Id::Number(7), "first", None).unwrap();
        assert!(pending.resolve(&Id::Number(7), Ok(json!(1))));
        assert_eq!(rx.await.unwrap().unwrap(), json!(1));

        let _rx = pending.register(Id::Number(7), "second", None).unwrap();
        drop(old_guard);
        assert!(pending.contains(&Id::Number(7)));
    }

    #[tokio::test]
    async fn test_fail_all() {
        let pending = PendingCalls::new();
        let rx1 = pending.register(Id::Number(1), "a", None).unwrap();
        let rx2 = pending
            .register(Id::Number(2), "b", Some(Duration::from_secs(60)))
            .unwrap();

        assert_eq!(pending.fail_all(RpcError::connection_closed()), 2);
        assert!(pending.is_empty());
        assert!(matches!(rx1.await.unwrap(), Err(RpcError::ConnectionClosed)));
        assert!(matches!(rx2.await.unwrap(), Err(RpcError::ConnectionClosed)));
    }
}
