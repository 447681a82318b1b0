//! Scripted fetcher for integration tests: behavior is keyed off the
//! source_ref so tests never shell out to a real tool.
//!
//! - refs containing "block" run until aborted
//! - refs containing "netfail" fail with a retryable network error
//! - anything else reports progress, writes the output file, and succeeds

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use mdq_core::error::FetchError;
use mdq_core::fetcher::{FetchOutput, FetchRequest, Fetcher, Phase, ProgressUpdate};

#[derive(Default)]
pub struct StubFetcher;

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(
        &self,
        req: &FetchRequest,
        progress: mpsc::Sender<ProgressUpdate>,
        abort: Arc<AtomicBool>,
    ) -> Result<FetchOutput, FetchError> {
        if req.source_ref.contains("block") {
            loop {
                if abort.load(Ordering::Relaxed) {
                    return Err(FetchError::tool("aborted by cancellation"));
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
        if req.source_ref.contains("netfail") {
            return Err(FetchError::network("scripted network failure"));
        }

        for percent in [0, 47, 95] {
            let _ = progress.send(ProgressUpdate { percent, phase: Phase::Downloading }).await;
        }
        let _ = progress.send(ProgressUpdate { percent: 97, phase: Phase::Converting }).await;

        let file_path = req.destination_dir.join(format!("{}.mp3", req.job_id));
        tokio::fs::write(&file_path, b"audio")
            .await
            .map_err(|e| FetchError::disk(e.to_string()))?;
        Ok(FetchOutput { file_path, file_size: 5 })
    }
}
