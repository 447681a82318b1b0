//! Error taxonomy shared across the queue, fetcher, and control plane.
//!
//! Submission-time errors (`SubmitError`) are rejected synchronously and
//! never enter the queue. Execution errors (`FetchError`) are captured on
//! the job record and drive the retry/terminal decision.

use thiserror::Error;

/// Classification of a failed fetch attempt. Drives the retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Transient network failure (DNS, reset, timeout). Retryable.
    NetworkError,
    /// The remote item is gone, private, or region-blocked. Never retried.
    SourceUnavailable,
    /// Tool exited non-zero for an unknown reason, or stalled. Retryable up to the limit.
    ToolFailure,
    /// Local disk problem (no space, permissions). Never retried.
    DiskError,
}

impl FetchErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, FetchErrorKind::NetworkError | FetchErrorKind::ToolFailure)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FetchErrorKind::NetworkError => "network_error",
            FetchErrorKind::SourceUnavailable => "source_unavailable",
            FetchErrorKind::ToolFailure => "tool_failure",
            FetchErrorKind::DiskError => "disk_error",
        }
    }
}

/// Terminal error of one fetch attempt.
#[derive(Debug, Clone, Error)]
#[error("{}: {message}", .kind.as_str())]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::NetworkError, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::SourceUnavailable, message)
    }

    pub fn tool(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::ToolFailure, message)
    }

    pub fn disk(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::DiskError, message)
    }
}

/// Errors rejected synchronously at submission; none of these create a job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The request is malformed (bad source_ref, bad destination).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// A non-terminal job for the same (source_ref, destination_dir) exists.
    #[error("duplicate: a job for this source and destination is already in flight")]
    Duplicate,
}
