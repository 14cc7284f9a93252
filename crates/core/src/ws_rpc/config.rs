/// 客户端配置

use std::time::Duration;

/// 默认响应超时
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// 连接关闭时如何处理仍在等待的调用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClosePolicy {
    /// 保持等待，只受各自的超时约束
    #[default]
    LeavePending,
    /// 全部以 `ConnectionClosed` 失败
    FailPending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// 每次调用的响应超时，`None` 表示不限时
    pub response_timeout: Option<Duration>,

    pub close_policy: ClosePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            response_timeout: Some(DEFAULT_RESPONSE_TIMEOUT),
            close_policy: ClosePolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_response_timeout(timeout: Duration) -> Self {
        Self {
            response_timeout: Some(timeout),
            ..Self::default()
        }
    }

    pub fn without_timeout() -> Self {
        Self {
            response_timeout: None,
            ..Self::default()
        }
    }

    pub fn close_policy(mut self, policy: ClosePolicy) -> Self {
        self.close_policy = policy;
        self
    }

    /// 生效的超时：零时长等同于不限时
    pub fn effective_timeout(&self) -> Option<Duration> {
        self.response_timeout.filter(|d| !d.is_zero())
    }
}
