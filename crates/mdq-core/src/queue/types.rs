//! Types used by the job queue.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::catalog::CatalogEntry;
use crate::fetcher::{Phase, Quality};

/// Job identifier (UUID v4, assigned at submission).
pub type JobId = String;

/// Lifecycle state of a job.
///
/// Transitions: Queued -> Running -> {Completed | Failed -> Queued (retry) | Cancelled}.
/// Completed, Failed-at-limit, and Cancelled are terminal and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Cancelled)
    }
}

/// A submission from the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub source_ref: String,
    #[serde(default)]
    pub quality: Quality,
    pub destination_dir: PathBuf,
}

/// Successful submission outcomes. Errors are `SubmitError`.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// A new job was queued.
    Queued(JobId),
    /// The catalog already holds this source with its file intact; no job
    /// is created and no worker dispatched.
    AlreadyCompleted(CatalogEntry),
}

/// Point-in-time view of one job, as served over the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub source_ref: String,
    pub quality: Quality,
    pub destination_dir: PathBuf,
    pub state: JobState,
    pub attempt_count: u32,
    pub percent: u8,
    pub phase: Option<Phase>,
    pub created_at: i64,
    pub last_error: Option<String>,
    pub file_path: Option<String>,
}
