//! ToolFetcher: spawn the external tool, stream its progress, classify failures.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::config::MdqConfig;
use crate::error::{FetchError, FetchErrorKind};

use super::args::{build_tool_args, validate_destination};
use super::progress::parse_progress_line;
use super::{FetchOutput, FetchRequest, Fetcher, ProgressUpdate};

/// How many trailing stderr lines are kept for failure classification.
const STDERR_TAIL_LINES: usize = 20;

/// Fetch executor backed by a yt-dlp-compatible external tool.
pub struct ToolFetcher {
    tool_path: String,
    stall_window: Duration,
}

impl ToolFetcher {
    pub fn new(tool_path: impl Into<String>, stall_window: Duration) -> Self {
        Self { tool_path: tool_path.into(), stall_window }
    }

    pub fn from_config(cfg: &MdqConfig) -> Self {
        Self::new(cfg.tool_path.clone(), Duration::from_secs(cfg.stall_window_secs))
    }
}

#[async_trait]
impl Fetcher for ToolFetcher {
    async fn fetch(
        &self,
        req: &FetchRequest,
        progress: mpsc::Sender<ProgressUpdate>,
        abort: Arc<AtomicBool>,
    ) -> Result<FetchOutput, FetchError> {
        // The queue validated the request at submission; the destination can
        // still vanish between then and dispatch.
        validate_destination(&req.destination_dir).map_err(FetchError::disk)?;

        let args = build_tool_args(req);
        let mut child = Command::new(&self.tool_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FetchError::tool(format!("spawn {}: {}", self.tool_path, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FetchError::tool("child stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FetchError::tool("child stderr not captured"))?;

        let stderr_task = tokio::spawn(collect_stderr_tail(stderr));

        let mut lines = BufReader::new(stdout).lines();
        let mut aborted = false;
        let mut stalled = false;
        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(update) = parse_progress_line(&line) {
                            let _ = progress.send(update).await;
                        } else {
                            tracing::trace!(job_id = %req.job_id, line = %line, "ignored tool output");
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!(job_id = %req.job_id, "tool stdout read: {}", e);
                        break;
                    }
                },
                _ = tokio::time::sleep(self.stall_window) => {
                    stalled = true;
                    break;
                }
                _ = wait_for_abort(&abort) => {
                    aborted = true;
                    break;
                }
            }
        }

        if aborted || stalled {
            let _ = child.kill().await;
            let _ = stderr_task.await;
            cleanup_partials(&req.destination_dir, &req.job_id).await;
            if aborted {
                return Err(FetchError::tool("aborted by cancellation"));
            }
            return Err(FetchError::tool(format!(
                "no progress within {}s, treating as stalled",
                self.stall_window.as_secs()
            )));
        }

        let status = child
            .wait()
            .await
            .map_err(|e| FetchError::tool(format!("wait for tool: {}", e)))?;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            cleanup_partials(&req.destination_dir, &req.job_id).await;
            return Err(classify_failure(status.code(), &stderr_tail));
        }

        let file_path = locate_output(&req.destination_dir, &req.job_id).await?;
        let file_size = tokio::fs::metadata(&file_path)
            .await
            .map_err(|e| FetchError::disk(format!("stat {}: {}", file_path.display(), e)))?
            .len();
        Ok(FetchOutput { file_path, file_size })
    }
}

async fn wait_for_abort(abort: &AtomicBool) {
    loop {
        if abort.load(Ordering::Relaxed) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
}

async fn collect_stderr_tail(stderr: tokio::process::ChildStderr) -> String {
    let mut tail: Vec<String> = Vec::new();
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tail.len() == STDERR_TAIL_LINES {
            tail.remove(0);
        }
        tail.push(line);
    }
    tail.join("\n")
}

/// Map the tool's exit status and stderr onto the failure taxonomy.
fn classify_failure(exit_code: Option<i32>, stderr: &str) -> FetchError {
    let lower = stderr.to_lowercase();
    let kind = if lower.contains("video unavailable")
        || lower.contains("private video")
        || lower.contains("has been removed")
        || lower.contains("not available in your country")
        || lower.contains("404")
        || lower.contains("403")
    {
        FetchErrorKind::SourceUnavailable
    } else if lower.contains("no space left")
        || lower.contains("permission denied")
        || lower.contains("read-only file system")
    {
        FetchErrorKind::DiskError
    } else if lower.contains("unable to connect")
        || lower.contains("connection reset")
        || lower.contains("connection refused")
        || lower.contains("timed out")
        || lower.contains("temporary failure in name resolution")
        || lower.contains("getaddrinfo")
        || lower.contains("network is unreachable")
    {
        FetchErrorKind::NetworkError
    } else {
        FetchErrorKind::ToolFailure
    };

    let last_line = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
    let message = if last_line.is_empty() {
        format!("tool exited with code {:?}", exit_code)
    } else {
        format!("tool exited with code {:?}: {}", exit_code, last_line)
    };
    FetchError::new(kind, message)
}

/// Find the finished output for a job: `<dir>/<job_id>.mp3`, or any other
/// non-partial `<job_id>.*` file the tool left (container fallback).
async fn locate_output(dir: &Path, job_id: &str) -> Result<PathBuf, FetchError> {
    let expected = dir.join(format!("{job_id}.mp3"));
    if tokio::fs::try_exists(&expected).await.unwrap_or(false) {
        return Ok(expected);
    }

    let prefix = format!("{job_id}.");
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| FetchError::disk(format!("read {}: {}", dir.display(), e)))?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) && !name.ends_with(".part") {
            return Ok(entry.path());
        }
    }
    Err(FetchError::tool("tool exited successfully but produced no output file"))
}

/// Remove everything the tool wrote for this job so a re-attempt starts clean.
async fn cleanup_partials(dir: &Path, job_id: &str) {
    let prefix = format!("{job_id}.");
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) {
            if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                tracing::warn!(path = %entry.path().display(), "partial cleanup: {}", e);
            }
        }
    }
}
