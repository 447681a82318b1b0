//! Lifecycle and progress events published to subscribers.

use serde::Serialize;

use crate::fetcher::Phase;

use super::types::{JobId, JobState};

/// One event on the queue's broadcast channel.
///
/// Progress events for a single job are published in non-decreasing percent
/// order; lifecycle transitions are strictly ordered and never skip a state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    Progress {
        job_id: JobId,
        percent: u8,
        phase: Phase,
        timestamp: i64,
    },
    StateChanged {
        job_id: JobId,
        state: JobState,
        timestamp: i64,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> &str {
        match self {
            JobEvent::Progress { job_id, .. } => job_id,
            JobEvent::StateChanged { job_id, .. } => job_id,
        }
    }
}
