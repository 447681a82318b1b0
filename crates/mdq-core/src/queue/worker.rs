//! Worker loop: claim the next eligible job, run one fetch attempt, settle it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::catalog::NewEntry;
use crate::error::FetchError;
use crate::fetcher::{FetchRequest, ProgressUpdate};

use super::retry::RetryDecision;
use super::types::{JobId, JobState};
use super::{emit_progress, emit_state, QueueInner, QueueState};

struct Work {
    job_id: JobId,
    req: FetchRequest,
    abort: Arc<AtomicBool>,
}

enum Claim {
    Job(Work),
    /// Nothing eligible; sleep until the earliest backoff expires (or a wake).
    Wait(Option<Duration>),
    Shutdown,
}

pub(super) async fn worker_loop(inner: Arc<QueueInner>, worker_id: usize) {
    loop {
        match claim_next(&inner).await {
            Claim::Job(work) => run_attempt(&inner, work, worker_id).await,
            Claim::Wait(Some(delay)) => {
                tokio::select! {
                    _ = inner.wake.notified() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Claim::Wait(None) => inner.wake.notified().await,
            Claim::Shutdown => break,
        }
    }
    tracing::debug!(worker_id, "worker exiting");
}

/// Atomically claim the first eligible Queued job in submission order.
/// Ownership transfers to the calling worker with the Running transition.
async fn claim_next(inner: &QueueInner) -> Claim {
    let mut state = inner.state.lock().await;
    if state.shutting_down {
        return Claim::Shutdown;
    }

    let now = Instant::now();
    let mut best: Option<(u64, JobId)> = None;
    let mut earliest_backoff: Option<Instant> = None;
    let mut more_eligible = false;
    for job in state.jobs.values() {
        if job.state != JobState::Queued {
            continue;
        }
        if job.eligible_at <= now {
            let is_better = match &best {
                Some((seq, _)) => job.seq < *seq,
                None => false,
            };
            if best.is_none() {
                best = Some((job.seq, job.id.clone()));
            } else if is_better {
                more_eligible = true;
                best = Some((job.seq, job.id.clone()));
            } else {
                more_eligible = true;
            }
        } else {
            earliest_backoff =
                Some(earliest_backoff.map_or(job.eligible_at, |e| e.min(job.eligible_at)));
        }
    }

    let Some((_, id)) = best else {
        return Claim::Wait(earliest_backoff.map(|e| e.saturating_duration_since(now)));
    };

    let abort = Arc::new(AtomicBool::new(false));
    let Some(job) = state.jobs.get_mut(&id) else {
        return Claim::Wait(None);
    };
    job.state = JobState::Running;
    job.abort = Some(Arc::clone(&abort));
    let work = Work {
        job_id: id.clone(),
        req: FetchRequest {
            job_id: id.clone(),
            source_ref: job.source_ref.clone(),
            quality: job.quality,
            destination_dir: job.destination_dir.clone(),
        },
        abort,
    };
    emit_state(inner, &id, JobState::Running);
    drop(state);

    if more_eligible {
        // Another worker may have capacity for the rest of the backlog.
        inner.wake.notify_one();
    }
    Claim::Job(work)
}

async fn run_attempt(inner: &Arc<QueueInner>, work: Work, worker_id: usize) {
    tracing::info!(
        worker_id,
        job_id = %work.job_id,
        source_ref = %work.req.source_ref,
        "fetch starting"
    );

    let (tx, mut rx) = mpsc::channel::<ProgressUpdate>(64);
    let pump = {
        let inner = Arc::clone(inner);
        let job_id = work.job_id.clone();
        tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                apply_progress(&inner, &job_id, update).await;
            }
        })
    };

    let result = inner.fetcher.fetch(&work.req, tx, Arc::clone(&work.abort)).await;
    let _ = pump.await;
    let aborted = work.abort.load(Ordering::Relaxed);

    match result {
        Ok(output) => {
            // Catalog first, job-terminal second: a crash in between leaves
            // the completion durably recorded, never lost or double-counted.
            let recorded = inner
                .catalog
                .record(&NewEntry {
                    source_ref: work.req.source_ref.clone(),
                    file_path: output.file_path.to_string_lossy().into_owned(),
                    file_size: output.file_size as i64,
                })
                .await;

            let mut state = inner.state.lock().await;
            match recorded {
                Ok(entry) => {
                    settle_terminal(inner, &mut state, &work.job_id, JobState::Completed, |job| {
                        job.percent = 100;
                        job.file_path = Some(entry.file_path.clone());
                        job.last_error = None;
                    });
                    tracing::info!(worker_id, job_id = %work.job_id, "fetch completed");
                }
                Err(e) => {
                    let msg = format!("catalog record failed: {e:#}");
                    settle_terminal(inner, &mut state, &work.job_id, JobState::Failed, |job| {
                        job.attempt_count += 1;
                        job.last_error = Some(msg.clone());
                    });
                    tracing::error!(worker_id, job_id = %work.job_id, "{msg}");
                }
            }
        }
        Err(_) if aborted => {
            let mut state = inner.state.lock().await;
            settle_terminal(inner, &mut state, &work.job_id, JobState::Cancelled, |_| {});
            tracing::info!(worker_id, job_id = %work.job_id, "fetch cancelled");
        }
        Err(err) => settle_failure(inner, &work, err, worker_id).await,
    }
}

async fn settle_failure(inner: &Arc<QueueInner>, work: &Work, err: FetchError, worker_id: usize) {
    let mut state = inner.state.lock().await;
    let Some(job) = state.jobs.get_mut(&work.job_id) else {
        return;
    };
    let attempt = job.attempt_count + 1;
    job.attempt_count = attempt;
    job.last_error = Some(err.to_string());
    job.abort = None;

    match inner.retry.decide(attempt, err.kind) {
        RetryDecision::RetryAfter(delay) => {
            job.state = JobState::Queued;
            job.eligible_at = Instant::now() + delay;
            emit_state(inner, &work.job_id, JobState::Queued);
            drop(state);
            tracing::warn!(
                worker_id,
                job_id = %work.job_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "fetch failed, retrying: {err}"
            );
            inner.wake.notify_one();
        }
        RetryDecision::NoRetry => {
            settle_terminal(inner, &mut state, &work.job_id, JobState::Failed, |_| {});
            tracing::error!(worker_id, job_id = %work.job_id, attempt, "fetch failed: {err}");
        }
    }
}

/// Move a job into a terminal state: count the finished attempt, free its
/// dedup slot, stamp retention, and publish the transition.
fn settle_terminal(
    inner: &QueueInner,
    state: &mut QueueState,
    job_id: &str,
    terminal: JobState,
    mutate: impl FnOnce(&mut super::Job),
) {
    let Some(job) = state.jobs.get_mut(job_id) else {
        return;
    };
    if terminal == JobState::Completed {
        job.attempt_count += 1;
    }
    job.state = terminal;
    job.finished_at = Some(Instant::now());
    job.abort = None;
    mutate(job);
    let percent = job.percent;
    let phase = job.phase;
    let key = job.dedup_key();
    state.in_flight.remove(&key);
    if terminal == JobState::Completed {
        if let Some(phase) = phase {
            emit_progress(inner, job_id, percent, phase);
        }
    }
    emit_state(inner, job_id, terminal);
}

/// Fold a progress sample into the job, keeping percent monotonic, and
/// publish it. Samples that do not advance percent update the phase only.
async fn apply_progress(inner: &QueueInner, job_id: &str, update: ProgressUpdate) {
    let mut state = inner.state.lock().await;
    let Some(job) = state.jobs.get_mut(job_id) else {
        return;
    };
    if job.state != JobState::Running {
        return;
    }
    if update.percent > job.percent || job.phase.is_none() {
        job.percent = job.percent.max(update.percent);
        job.phase = Some(update.phase);
        emit_progress(inner, job_id, job.percent, update.phase);
    } else {
        job.phase = Some(update.phase);
    }
}
