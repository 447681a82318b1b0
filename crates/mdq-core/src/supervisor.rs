//! Process supervisor: runs inside the shell process, owns the backend.
//!
//! Launches the backend, reads the one-line JSON handshake from its stdout,
//! confirms readiness via `health`, and restarts it (bounded, with backoff)
//! on unexpected exit. Every restart rotates the handshake; a previously
//! distributed signing key is invalid the moment the old process dies.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::client::ControlClient;

/// Port + shared secret for one backend process lifetime. Treat as secret;
/// re-fetch after any backend restart.
#[derive(Clone, Serialize, Deserialize)]
pub struct Handshake {
    pub port: u16,
    pub key: String,
}

// Keep the key out of debug output and logs.
impl std::fmt::Debug for Handshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handshake").field("port", &self.port).field("key", &"..").finish()
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Backend executable; defaults to the current binary.
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Restart attempts per crash before giving up.
    pub max_restarts: u32,
    pub restart_base_delay: Duration,
    /// Time allowed for handshake + health readiness on each launch.
    pub ready_timeout: Duration,
    /// How long stop() waits for a graceful exit before killing.
    pub stop_grace: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        let program = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("mdq"));
        Self {
            program,
            args: vec!["serve".to_string()],
            max_restarts: 3,
            restart_base_delay: Duration::from_millis(500),
            ready_timeout: Duration::from_secs(10),
            stop_grace: Duration::from_secs(5),
        }
    }
}

struct SupState {
    child: Option<Child>,
    handshake: Option<Handshake>,
    stopping: bool,
}

struct SupInner {
    opts: SupervisorOptions,
    state: Mutex<SupState>,
}

/// Supervises one backend process; cheap to clone.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<SupInner>,
}

impl Supervisor {
    pub fn new(opts: SupervisorOptions) -> Self {
        Self {
            inner: Arc::new(SupInner {
                opts,
                state: Mutex::new(SupState { child: None, handshake: None, stopping: false }),
            }),
        }
    }

    /// Launch the backend and return its handshake once `health` confirms
    /// readiness. Callers must not submit jobs before this returns.
    pub async fn start(&self) -> Result<Handshake> {
        let (child, handshake) = launch(&self.inner.opts).await?;
        {
            let mut state = self.inner.state.lock().await;
            state.child = Some(child);
            state.handshake = Some(handshake.clone());
            state.stopping = false;
        }
        tokio::spawn(monitor(Arc::clone(&self.inner)));
        Ok(handshake)
    }

    /// The current handshake; None while the backend is down or restarting.
    pub async fn handshake(&self) -> Option<Handshake> {
        self.inner.state.lock().await.handshake.clone()
    }

    /// Graceful stop: in-flight jobs are cancelled by the backend's
    /// shutdown route before process exit; a stuck process is killed after
    /// the grace period. No tool child processes outlive the backend.
    pub async fn stop(&self) -> Result<()> {
        let (handshake, mut child) = {
            let mut state = self.inner.state.lock().await;
            state.stopping = true;
            (state.handshake.take(), state.child.take())
        };

        if let Some(h) = &handshake {
            let client = ControlClient::new(h.port, h.key.clone());
            if let Err(e) = client.shutdown().await {
                tracing::debug!("backend shutdown request: {e}");
            }
        }

        if let Some(child) = child.as_mut() {
            match tokio::time::timeout(self.inner.opts.stop_grace, child.wait()).await {
                Ok(status) => {
                    let status = status.context("wait for backend exit")?;
                    tracing::info!("backend exited: {status}");
                }
                Err(_) => {
                    tracing::warn!("backend did not exit within grace period, killing");
                    let _ = child.kill().await;
                }
            }
        }
        Ok(())
    }
}

/// Spawn the backend, read its handshake line, wait for readiness.
async fn launch(opts: &SupervisorOptions) -> Result<(Child, Handshake)> {
    let mut child = Command::new(&opts.program)
        .args(&opts.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawn backend: {}", opts.program.display()))?;

    let stdout = child.stdout.take().ok_or_else(|| anyhow!("backend stdout not captured"))?;
    let mut lines = BufReader::new(stdout).lines();
    let line = tokio::time::timeout(opts.ready_timeout, lines.next_line())
        .await
        .map_err(|_| anyhow!("timed out waiting for backend handshake"))?
        .context("read backend stdout")?
        .ok_or_else(|| anyhow!("backend exited before sending a handshake"))?;
    let handshake: Handshake =
        serde_json::from_str(line.trim()).context("parse backend handshake")?;

    // Drain remaining stdout so the child can never block on a full pipe.
    tokio::spawn(async move { while let Ok(Some(_)) = lines.next_line().await {} });

    // The handshake is valid only once health() confirms.
    let client = ControlClient::new(handshake.port, handshake.key.clone());
    let deadline = Instant::now() + opts.ready_timeout;
    loop {
        if client.health().await.unwrap_or(false) {
            break;
        }
        if Instant::now() >= deadline {
            let _ = child.kill().await;
            bail!("backend did not become healthy within {:?}", opts.ready_timeout);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    tracing::info!(port = handshake.port, "backend ready");
    Ok((child, handshake))
}

fn restart_delay(base: Duration, attempt: u32) -> Duration {
    let exp = 1u32 << attempt.saturating_sub(1).min(6);
    base.saturating_mul(exp).min(Duration::from_secs(30))
}

/// Watch for unexpected exit and restart with bounded backoff.
async fn monitor(inner: Arc<SupInner>) {
    loop {
        tokio::time::sleep(Duration::from_millis(300)).await;

        {
            let mut state = inner.state.lock().await;
            if state.stopping {
                return;
            }
            let exited = match state.child.as_mut() {
                Some(child) => child.try_wait().ok().flatten().is_some(),
                None => false,
            };
            if !exited {
                continue;
            }
            // The old signing key dies with the old process.
            state.child = None;
            state.handshake = None;
        }
        tracing::warn!("backend exited unexpectedly, restarting");

        let mut attempt = 1u32;
        loop {
            if inner.state.lock().await.stopping {
                return;
            }
            match launch(&inner.opts).await {
                Ok((child, handshake)) => {
                    let mut state = inner.state.lock().await;
                    state.child = Some(child);
                    state.handshake = Some(handshake);
                    tracing::info!("backend restarted");
                    break;
                }
                Err(e) if attempt < inner.opts.max_restarts => {
                    let delay = restart_delay(inner.opts.restart_base_delay, attempt);
                    tracing::warn!(attempt, "backend restart failed: {e:#}; retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!("giving up on backend restarts: {e:#}");
                    return;
                }
            }
        }
    }
}
