//! Parse the external tool's progress stream into normalized updates.
//!
//! yt-dlp with `--newline` prints lines like:
//!   `[download]  42.3% of 5.32MiB at 1.21MiB/s ETA 00:03`
//!   `[ExtractAudio] Destination: /music/job-1.mp3`
//! Unparseable lines are ignored, never fatal.

use serde::{Deserialize, Serialize};

/// Which stage of the pipeline a running job is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Downloading,
    Converting,
    Finalizing,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Downloading => "downloading",
            Phase::Converting => "converting",
            Phase::Finalizing => "finalizing",
        }
    }
}

/// One normalized progress sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Overall percent in 0..=99. 100 is reserved for job completion.
    pub percent: u8,
    pub phase: Phase,
}

/// Raw download percent is scaled into 0..=95 so the conversion and
/// finalization stages have room; 100 is only ever reported by the queue
/// when the job reaches Completed.
const DOWNLOAD_CEILING: u8 = 95;
const CONVERT_PERCENT: u8 = 97;
const FINALIZE_PERCENT: u8 = 99;

/// Parse one output line into a normalized update, or None to ignore it.
pub fn parse_progress_line(line: &str) -> Option<ProgressUpdate> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("[download]") {
        let rest = rest.trim_start();
        // "[download] Destination: ..." and similar carry no percent.
        let percent_token = rest.split_whitespace().next()?;
        let raw = percent_token.strip_suffix('%')?.parse::<f64>().ok()?;
        if !(0.0..=100.0).contains(&raw) {
            return None;
        }
        let scaled = (raw * f64::from(DOWNLOAD_CEILING) / 100.0).floor() as u8;
        return Some(ProgressUpdate {
            percent: scaled.min(DOWNLOAD_CEILING),
            phase: Phase::Downloading,
        });
    }
    if line.starts_with("[ExtractAudio]") {
        return Some(ProgressUpdate { percent: CONVERT_PERCENT, phase: Phase::Converting });
    }
    if line.starts_with("[Fixup") || line.starts_with("[MoveFiles]") || line.starts_with("Deleting original file")
    {
        return Some(ProgressUpdate { percent: FINALIZE_PERCENT, phase: Phase::Finalizing });
    }
    None
}
