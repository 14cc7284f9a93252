/// 配置管理

use std::time::Duration;
use wsrpc::{ClientConfig, ClosePolicy, Error, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub server_url: String,
    pub protocols: Vec<String>,
    /// 0 表示不限时
    pub response_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub bare: bool,
    pub fail_pending_on_close: bool,
    pub log_level: String,
}

fn parse_u64(name: &str, raw: String) -> Result<u64> {
    raw.parse()
        .map_err(|e| Error::Config(format!("{} 不是有效的整数: {}", name, e)))
}

fn parse_bool(name: &str, raw: String) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        other => Err(Error::Config(format!("{} 不是有效的布尔值: {}", name, other))),
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let server_url = lookup("WSRPC_URL")
            .unwrap_or_else(|| "ws://localhost:3000/rpc".to_string());

        let protocols = lookup("WSRPC_PROTOCOLS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let response_timeout_ms = parse_u64(
            "WSRPC_RESPONSE_TIMEOUT_MS",
            lookup("WSRPC_RESPONSE_TIMEOUT_MS").unwrap_or_else(|| "10000".to_string()),
        )?;

        let connect_timeout_ms = parse_u64(
            "WSRPC_CONNECT_TIMEOUT_MS",
            lookup("WSRPC_CONNECT_TIMEOUT_MS").unwrap_or_else(|| "10000".to_string()),
        )?;

        let bare = parse_bool("WSRPC_BARE", lookup("WSRPC_BARE").unwrap_or_default())?;

        let fail_pending_on_close = parse_bool(
            "WSRPC_FAIL_PENDING_ON_CLOSE",
            lookup("WSRPC_FAIL_PENDING_ON_CLOSE").unwrap_or_default(),
        )?;

        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            server_url,
            protocols,
            response_timeout_ms,
            connect_timeout_ms,
            bare,
            fail_pending_on_close,
            log_level,
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        let config = if self.response_timeout_ms == 0 {
            ClientConfig::without_timeout()
        } else {
            ClientConfig::with_response_timeout(Duration::from_millis(self.response_timeout_ms))
        };
        if self.fail_pending_on_close {
            config.close_policy(ClosePolicy::FailPending)
        } else {
            config
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
