//! Control-plane HTTP server.
//!
//! Loopback-only boundary between the backend and the presentation shell.
//! Binds `127.0.0.1` on an ephemeral (or pinned) port; every route except
//! `health` requires the per-process signing key. Request handling runs on
//! a dedicated thread and bridges into the tokio runtime for queue/catalog
//! calls; a per-request failure becomes a structured error response, never
//! a crash.

mod auth;
mod handlers;

pub use auth::{SigningKey, KEY_HEADER};

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::catalog::CatalogStore;
use crate::queue::JobQueue;

pub(crate) struct PlaneInner {
    pub(crate) server: tiny_http::Server,
    pub(crate) port: u16,
    pub(crate) key: SigningKey,
    pub(crate) catalog: CatalogStore,
    pub(crate) queue: JobQueue,
    pub(crate) rt: tokio::runtime::Handle,
    /// Signalled by the authenticated shutdown route.
    pub(crate) shutdown: Arc<Notify>,
    pub(crate) stopping: AtomicBool,
}

/// Running control-plane server; cheap to clone.
#[derive(Clone)]
pub struct ControlPlane {
    inner: Arc<PlaneInner>,
}

impl ControlPlane {
    /// Bind to 127.0.0.1. `port` of None picks an ephemeral port. Failure
    /// to bind aborts backend startup; there is no unauthenticated mode.
    pub fn bind(
        catalog: CatalogStore,
        queue: JobQueue,
        key: SigningKey,
        port: Option<u16>,
        rt: tokio::runtime::Handle,
        shutdown: Arc<Notify>,
    ) -> Result<Self> {
        let addr = format!("127.0.0.1:{}", port.unwrap_or(0));
        let server = tiny_http::Server::http(&addr)
            .map_err(|e| anyhow!("bind control plane on {addr}: {e}"))?;
        let bound = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| anyhow!("control plane bound to a non-IP address"))?;
        let port = bound.port();
        tracing::info!(port, "control plane listening on 127.0.0.1");

        Ok(Self {
            inner: Arc::new(PlaneInner {
                server,
                port,
                key,
                catalog,
                queue,
                rt,
                shutdown,
                stopping: AtomicBool::new(false),
            }),
        })
    }

    pub fn port(&self) -> u16 {
        self.inner.port
    }

    /// Run the accept loop on a dedicated OS thread.
    pub fn spawn(&self) -> std::thread::JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        std::thread::spawn(move || serve_loop(inner))
    }

    /// Stop the accept loop (idempotent).
    pub fn stop(&self) {
        self.inner.stopping.store(true, Ordering::SeqCst);
        self.inner.server.unblock();
    }
}

fn serve_loop(inner: Arc<PlaneInner>) {
    for request in inner.server.incoming_requests() {
        if inner.stopping.load(Ordering::SeqCst) {
            break;
        }
        handlers::handle_request(&inner, request);
    }
    tracing::debug!("control plane accept loop ended");
}
