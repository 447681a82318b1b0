//! Typed localhost client for the control plane.
//!
//! Used by the CLI, the supervisor's readiness probe, and integration
//! tests. Mirrors the routes in `server::handlers`.

use serde::Deserialize;
use thiserror::Error;

use crate::catalog::CatalogEntry;
use crate::queue::{JobSnapshot, SubmitRequest};
use crate::server::KEY_HEADER;

/// Errors surfaced by the control-plane client, mapped from status codes.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Handshake mismatch: the presented key is stale or wrong. This is an
    /// integration bug, not a retryable condition.
    #[error("unauthorized: signing key rejected")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    #[error("duplicate: a job for this source and destination is in flight")]
    Duplicate,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response ({0}): {1}")]
    Unexpected(u16, String),
}

/// Reply to a submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitReply {
    /// Set when a new job was queued.
    #[serde(default)]
    pub job_id: Option<String>,
    /// Set when the catalog already held the item; no job was created.
    #[serde(default)]
    pub already_completed: Option<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ClearReply {
    cleared: u64,
}

/// Client for one backend instance, carrying its port and signing key.
#[derive(Clone)]
pub struct ControlClient {
    http: reqwest::Client,
    base: String,
    key: String,
}

impl ControlClient {
    pub fn new(port: u16, key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: format!("http://127.0.0.1:{port}"),
            key: key.into(),
        }
    }

    /// Liveness probe; the only call that needs no key.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self.http.get(format!("{}/health", self.base)).send().await?;
        Ok(resp.status().is_success())
    }

    pub async fn submit(&self, req: &SubmitRequest) -> Result<SubmitReply, ClientError> {
        let resp = self
            .http
            .post(format!("{}/jobs", self.base))
            .header(KEY_HEADER, &self.key)
            .json(req)
            .send()
            .await?;
        Self::parse(resp).await
    }

    pub async fn job(&self, id: &str) -> Result<JobSnapshot, ClientError> {
        let resp = self
            .http
            .get(format!("{}/jobs/{id}", self.base))
            .header(KEY_HEADER, &self.key)
            .send()
            .await?;
        Self::parse(resp).await
    }

    pub async fn jobs(&self) -> Result<Vec<JobSnapshot>, ClientError> {
        let resp = self
            .http
            .get(format!("{}/jobs", self.base))
            .header(KEY_HEADER, &self.key)
            .send()
            .await?;
        Self::parse(resp).await
    }

    pub async fn cancel(&self, id: &str) -> Result<JobSnapshot, ClientError> {
        let resp = self
            .http
            .post(format!("{}/jobs/{id}/cancel", self.base))
            .header(KEY_HEADER, &self.key)
            .send()
            .await?;
        Self::parse(resp).await
    }

    pub async fn catalog(&self, contains: Option<&str>) -> Result<Vec<CatalogEntry>, ClientError> {
        let mut url = format!("{}/catalog", self.base);
        if let Some(needle) = contains {
            url.push_str(&format!("?contains={}", urlencoding::encode(needle)));
        }
        let resp = self.http.get(url).header(KEY_HEADER, &self.key).send().await?;
        Self::parse(resp).await
    }

    pub async fn clear_catalog(&self) -> Result<u64, ClientError> {
        let resp = self
            .http
            .delete(format!("{}/catalog", self.base))
            .header(KEY_HEADER, &self.key)
            .send()
            .await?;
        let reply: ClearReply = Self::parse(resp).await?;
        Ok(reply.cleared)
    }

    /// Graceful backend stop: cancels in-flight jobs, then the process exits.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        let resp = self
            .http
            .post(format!("{}/shutdown", self.base))
            .header(KEY_HEADER, &self.key)
            .send()
            .await?;
        if resp.status().is_success() {
            return Ok(());
        }
        Err(Self::error_from(resp).await)
    }

    async fn parse<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
        if resp.status().is_success() {
            return Ok(resp.json::<T>().await?);
        }
        Err(Self::error_from(resp).await)
    }

    async fn error_from(resp: reqwest::Response) -> ClientError {
        let status = resp.status().as_u16();
        let body: ErrorBody = resp.json().await.unwrap_or(ErrorBody {
            error: String::new(),
            message: String::new(),
        });
        match status {
            401 => ClientError::Unauthorized,
            404 => ClientError::NotFound,
            409 => ClientError::Duplicate,
            400 => ClientError::InvalidRequest(body.message),
            _ => ClientError::Unexpected(status, format!("{}: {}", body.error, body.message)),
        }
    }
}
