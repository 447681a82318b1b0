//! Fetch executor: runs the external download tool for one media item.
//!
//! The tool (yt-dlp compatible) is treated as a black-box subprocess: this
//! module owns argument construction, progress-stream parsing, stall
//! detection, cancellation, and partial-file cleanup. It never speaks the
//! download protocol itself.

mod args;
mod progress;
mod tool;

pub use args::{build_tool_args, validate_destination, validate_source_ref};
pub use progress::{parse_progress_line, Phase, ProgressUpdate};
pub use tool::ToolFetcher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::FetchError;

/// Requested bitrate tier, ordered low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    #[default]
    Standard,
    High,
}

impl Quality {
    /// Target bitrate in kbit/s for the audio extraction step.
    pub fn kbps(self) -> u32 {
        match self {
            Quality::Low => 128,
            Quality::Standard => 192,
            Quality::High => 320,
        }
    }
}

/// One fetch handed to the executor: a single remote item to a local dir.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub job_id: String,
    pub source_ref: String,
    pub quality: Quality,
    pub destination_dir: PathBuf,
}

/// Terminal success of a fetch: where the file landed and its size.
#[derive(Debug, Clone)]
pub struct FetchOutput {
    pub file_path: PathBuf,
    pub file_size: u64,
}

/// Abstraction over the external tool, so the queue can be driven by a
/// scripted fetcher in tests.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Run one fetch attempt.
    ///
    /// Progress updates are sent on `progress` in the order produced. When
    /// `abort` is set the attempt must terminate promptly and leave no
    /// partial files behind.
    async fn fetch(
        &self,
        req: &FetchRequest,
        progress: mpsc::Sender<ProgressUpdate>,
        abort: Arc<AtomicBool>,
    ) -> Result<FetchOutput, FetchError>;
}
