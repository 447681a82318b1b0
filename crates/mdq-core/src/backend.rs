//! Backend assembly: catalog + queue + control plane for `mdq serve`.

use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::catalog::CatalogStore;
use crate::config::MdqConfig;
use crate::fetcher::ToolFetcher;
use crate::queue::{JobQueue, QueueOptions};
use crate::server::{ControlPlane, SigningKey};
use crate::supervisor::Handshake;

/// Grace given to in-flight jobs (and their tool children) on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Run the backend until a shutdown request or interrupt.
///
/// Startup is all-or-nothing: failure to open the catalog or bind the
/// control plane aborts with an error. There is no degraded mode without
/// authentication.
pub async fn run_backend(cfg: MdqConfig, port_override: Option<u16>) -> Result<()> {
    let catalog = CatalogStore::open_default().await.context("open catalog")?;
    let fetcher = Arc::new(ToolFetcher::from_config(&cfg));
    let queue = JobQueue::start(catalog.clone(), fetcher, QueueOptions::from_config(&cfg));

    let key = SigningKey::generate();
    let shutdown = Arc::new(Notify::new());
    let plane = ControlPlane::bind(
        catalog,
        queue.clone(),
        key.clone(),
        port_override.or(cfg.port),
        tokio::runtime::Handle::current(),
        Arc::clone(&shutdown),
    )
    .context("start control plane")?;

    // The handshake channel: exactly one JSON line on stdout, consumed by
    // the supervisor. The key goes nowhere else and is never logged.
    let handshake = Handshake { port: plane.port(), key: key.expose().to_string() };
    let mut stdout = std::io::stdout();
    writeln!(stdout, "{}", serde_json::to_string(&handshake)?)?;
    stdout.flush()?;

    let server_thread = plane.spawn();
    tracing::info!(port = plane.port(), "backend running");

    tokio::select! {
        _ = shutdown.notified() => tracing::info!("shutdown requested via control plane"),
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupt received"),
    }

    // Cancel in-flight jobs first so no tool child outlives the backend.
    queue.shutdown(SHUTDOWN_GRACE).await;
    plane.stop();
    let _ = tokio::task::spawn_blocking(move || server_thread.join()).await;
    Ok(())
}
