//! Craft Worker 进程入口
//!
//! stdin 每行一条入站 JSON 消息，stdout 每行一条出站 JSON 消息；日志写 stderr。

use std::sync::Arc;

use anyhow::Context;
use craft_worker::backend::{MockSolverEngine, StaticEngineSource};
use craft_worker::config::{load_config, AppConfig};
use craft_worker::host::serve_json_lines;
use craft_worker::{observability, spawn_worker, Worker};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    tracing::warn!("No solver engine linked, using mock solver");
    let source = Arc::new(StaticEngineSource::new(Arc::new(MockSolverEngine::new())));
    let worker = Worker::from_config(config, source).context("Failed to create worker")?;

    let shutdown = CancellationToken::new();
    let mut channels = spawn_worker(worker, shutdown.clone());

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C");
                shutdown.cancel();
            }
        });
    }

    let mut stdout = tokio::io::stdout();
    let replies = serve_json_lines(
        BufReader::new(tokio::io::stdin()),
        &mut stdout,
        &mut channels,
        &shutdown,
    )
    .await?;
    tracing::info!(replies, "Input closed");

    shutdown.cancel();
    drop(channels.inbound);
    if let Err(e) = channels.task.await {
        tracing::error!("Worker task failed: {}", e);
    }
    Ok(())
}
