/// wsrpc - 命令行客户端
///
/// 连接到 JSON-RPC WebSocket 服务，执行一次 call 或 notify 后退出

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use wsrpc::{Error, WsRpcClient};

mod config;

#[derive(Parser, Debug)]
#[command(name = "wsrpc", version, about = "JSON-RPC 2.0 over WebSocket 客户端")]
struct Cli {
    /// 服务地址，覆盖 WSRPC_URL
    #[arg(long)]
    url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 发送请求并打印 result
    Call {
        method: String,
        /// JSON 格式的参数
        params: Option<String>,
    },
    /// 发送通知（不等待响应）
    Notify {
        method: String,
        /// JSON 格式的参数
        params: Option<String>,
    },
}

fn parse_params(raw: Option<&str>) -> wsrpc::Result<Option<Value>> {
    raw.map(|text| {
        serde_json::from_str(text)
            .map_err(|e| Error::InvalidArgument(format!("参数不是有效的 JSON: {}", e)))
    })
    .transpose()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let cfg = config::Config::from_env()?;

    // 初始化日志
    // RUST_LOG 优先，否则使用 LOG_LEVEL
    tracing_subscriber::fmt()
        .with_target(false)
        .with_line_number(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log_level)),
        )
        .init();

    run(cli, cfg).await?;
    Ok(())
}

/// 连接、执行一次命令、关闭连接
///
/// 命令失败时同样先发送关闭帧，再返回错误
async fn run(cli: Cli, cfg: config::Config) -> wsrpc::Result<()> {
    let client = WsRpcClient::new();
    client.configure(cfg.client_config());
    if cfg.bare {
        client.no_rpc();
    }

    client.on_notification(|msg| {
        info!("📨 收到通知: {}", msg);
        Ok(())
    });
    client.on_error(|err| {
        warn!("传输错误: {}", err);
        Ok(())
    });
    let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();
    client.on_close(move |info| {
        closed_tx.send(info.cloned())?;
        Ok(())
    });

    let url = cli.url.unwrap_or_else(|| cfg.server_url.clone());
    let protocols: Vec<&str> = cfg.protocols.iter().map(String::as_str).collect();
    info!("🎯 连接到: {}", url);
    tokio::time::timeout(cfg.connect_timeout(), client.connect(&url, &protocols))
        .await
        .map_err(|_| anyhow::anyhow!("连接超时: {}", url))??;

    let outcome = execute(&client, cli.command).await;

    // 等待对端确认关闭，保证已排队的消息发出
    match client.close(None) {
        Ok(()) => {
            let _ = tokio::time::timeout(Duration::from_secs(2), closed_rx.recv()).await;
        }
        Err(e) => warn!("关闭连接失败: {}", e),
    }

    outcome
}

async fn execute(client: &WsRpcClient, command: Command) -> wsrpc::Result<()> {
    match command {
        Command::Call { method, params } => {
            let result = client.call(method, parse_params(params.as_deref())?).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Notify { method, params } => {
            client.notify(method, parse_params(params.as_deref())?)?;
        }
    }
    Ok(())
}
