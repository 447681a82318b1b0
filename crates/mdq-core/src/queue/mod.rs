//! Job queue and worker pool.
//!
//! Accepts submissions, dedups against the catalog and in-flight jobs,
//! dispatches to a bounded pool of workers in FIFO order, retries transient
//! failures with backoff, and fans out lifecycle/progress events. All queue
//! state lives behind a single mutex; transitions are infrequent relative
//! to the I/O they bracket, so the lock is cheap.

mod events;
mod retry;
mod types;
mod worker;

pub use events::JobEvent;
pub use retry::{RetryDecision, RetryPolicy};
pub use types::{JobId, JobSnapshot, JobState, SubmitOutcome, SubmitRequest};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, Mutex, Notify};
use uuid::Uuid;

use crate::catalog::db::unix_timestamp;
use crate::catalog::CatalogStore;
use crate::config::MdqConfig;
use crate::error::SubmitError;
use crate::fetcher::{validate_destination, validate_source_ref, Fetcher, Phase, Quality};

/// Sizing and policy knobs for the queue.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Worker-pool size: at most this many fetches run at once.
    pub workers: usize,
    pub retry: RetryPolicy,
    /// How long terminal jobs stay queryable.
    pub retention: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            workers: 3,
            retry: RetryPolicy::default(),
            retention: Duration::from_secs(3600),
        }
    }
}

impl QueueOptions {
    pub fn from_config(cfg: &MdqConfig) -> Self {
        Self {
            workers: cfg.max_concurrent_fetches.max(1),
            retry: RetryPolicy::from_config(cfg),
            retention: Duration::from_secs(cfg.retention_secs),
        }
    }
}

/// Internal job record. Mutated only under the queue mutex, and only by the
/// queue itself or the worker that currently owns the job.
pub(crate) struct Job {
    pub(crate) id: JobId,
    /// Submission order; FIFO dispatch key (created_at has 1s granularity).
    pub(crate) seq: u64,
    pub(crate) source_ref: String,
    pub(crate) quality: Quality,
    pub(crate) destination_dir: PathBuf,
    pub(crate) state: JobState,
    pub(crate) attempt_count: u32,
    pub(crate) percent: u8,
    pub(crate) phase: Option<Phase>,
    pub(crate) created_at: i64,
    pub(crate) last_error: Option<String>,
    pub(crate) file_path: Option<String>,
    /// Earliest dispatch time; in the future while backing off a retry.
    pub(crate) eligible_at: Instant,
    pub(crate) finished_at: Option<Instant>,
    pub(crate) abort: Option<Arc<AtomicBool>>,
}

impl Job {
    pub(crate) fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            source_ref: self.source_ref.clone(),
            quality: self.quality,
            destination_dir: self.destination_dir.clone(),
            state: self.state,
            attempt_count: self.attempt_count,
            percent: self.percent,
            phase: self.phase,
            created_at: self.created_at,
            last_error: self.last_error.clone(),
            file_path: self.file_path.clone(),
        }
    }

    fn dedup_key(&self) -> (String, PathBuf) {
        (self.source_ref.clone(), self.destination_dir.clone())
    }
}

pub(crate) struct QueueState {
    pub(crate) jobs: HashMap<JobId, Job>,
    /// (source_ref, destination_dir) -> job id, for every non-terminal job.
    pub(crate) in_flight: HashMap<(String, PathBuf), JobId>,
    pub(crate) next_seq: u64,
    pub(crate) shutting_down: bool,
}

pub(crate) struct QueueInner {
    pub(crate) catalog: CatalogStore,
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) retry: RetryPolicy,
    pub(crate) retention: Duration,
    pub(crate) state: Mutex<QueueState>,
    pub(crate) wake: Notify,
    pub(crate) events: broadcast::Sender<JobEvent>,
}

pub(crate) fn emit_state(inner: &QueueInner, job_id: &str, state: JobState) {
    let _ = inner.events.send(JobEvent::StateChanged {
        job_id: job_id.to_string(),
        state,
        timestamp: unix_timestamp(),
    });
}

pub(crate) fn emit_progress(inner: &QueueInner, job_id: &str, percent: u8, phase: Phase) {
    let _ = inner.events.send(JobEvent::Progress {
        job_id: job_id.to_string(),
        percent,
        phase,
        timestamp: unix_timestamp(),
    });
}

/// Drop terminal jobs whose retention window has elapsed.
fn prune_expired(state: &mut QueueState, retention: Duration) {
    state.jobs.retain(|_, job| match job.finished_at {
        Some(at) if job.state.is_terminal() => at.elapsed() < retention,
        _ => true,
    });
}

/// Handle to the job queue; cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<QueueInner>,
    workers: Arc<Mutex<Vec<tokio::task::JoinHandle<()>>>>,
}

impl JobQueue {
    /// Build the queue and spawn its worker pool. Must be called from
    /// within a tokio runtime.
    pub fn start(catalog: CatalogStore, fetcher: Arc<dyn Fetcher>, opts: QueueOptions) -> Self {
        let (events, _) = broadcast::channel(256);
        let inner = Arc::new(QueueInner {
            catalog,
            fetcher,
            retry: opts.retry,
            retention: opts.retention,
            state: Mutex::new(QueueState {
                jobs: HashMap::new(),
                in_flight: HashMap::new(),
                next_seq: 0,
                shutting_down: false,
            }),
            wake: Notify::new(),
            events,
        });

        let pool_size = opts.workers.max(1);
        let mut handles = Vec::with_capacity(pool_size);
        for worker_id in 0..pool_size {
            handles.push(tokio::spawn(worker::worker_loop(Arc::clone(&inner), worker_id)));
        }
        tracing::info!(workers = pool_size, "job queue started");

        Self { inner, workers: Arc::new(Mutex::new(handles)) }
    }

    /// Submit one download request.
    ///
    /// Validation and dedup happen synchronously here; nothing invalid or
    /// duplicate ever enters the queue. A fresh catalog hit short-circuits
    /// without dispatching a worker.
    pub async fn submit(&self, req: SubmitRequest) -> Result<SubmitOutcome, SubmitError> {
        let source_ref =
            validate_source_ref(&req.source_ref).map_err(SubmitError::InvalidRequest)?;
        validate_destination(&req.destination_dir).map_err(SubmitError::InvalidRequest)?;

        match self.inner.catalog.lookup(&source_ref).await {
            Ok(Some(hit)) if hit.file_present => {
                tracing::debug!(source_ref = %source_ref, "submit answered from catalog");
                return Ok(SubmitOutcome::AlreadyCompleted(hit.entry));
            }
            Ok(_) => {}
            // A read failure must not block new work; dedup still holds for
            // in-flight jobs below.
            Err(e) => tracing::warn!("catalog lookup during submit: {e:#}"),
        }

        let key = (source_ref.clone(), req.destination_dir.clone());
        let mut state = self.inner.state.lock().await;
        prune_expired(&mut state, self.inner.retention);
        if state.shutting_down {
            return Err(SubmitError::InvalidRequest("backend is shutting down".to_string()));
        }
        if state.in_flight.contains_key(&key) {
            return Err(SubmitError::Duplicate);
        }

        let id = Uuid::new_v4().to_string();
        let seq = state.next_seq;
        state.next_seq += 1;
        let job = Job {
            id: id.clone(),
            seq,
            source_ref,
            quality: req.quality,
            destination_dir: req.destination_dir,
            state: JobState::Queued,
            attempt_count: 0,
            percent: 0,
            phase: None,
            created_at: unix_timestamp(),
            last_error: None,
            file_path: None,
            eligible_at: Instant::now(),
            finished_at: None,
            abort: None,
        };
        state.in_flight.insert(key, id.clone());
        state.jobs.insert(id.clone(), job);
        emit_state(&self.inner, &id, JobState::Queued);
        drop(state);

        self.inner.wake.notify_one();
        Ok(SubmitOutcome::Queued(id))
    }

    /// Point-in-time view of one job.
    pub async fn snapshot(&self, id: &str) -> Option<JobSnapshot> {
        let mut state = self.inner.state.lock().await;
        prune_expired(&mut state, self.inner.retention);
        state.jobs.get(id).map(Job::snapshot)
    }

    /// All retained jobs, newest first.
    pub async fn list(&self) -> Vec<JobSnapshot> {
        let mut state = self.inner.state.lock().await;
        prune_expired(&mut state, self.inner.retention);
        let mut out: Vec<JobSnapshot> = state.jobs.values().map(Job::snapshot).collect();
        drop(state);
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        out
    }

    /// Request cancellation. Queued jobs turn Cancelled immediately; for a
    /// Running job the abort token is set and the owning worker finishes
    /// the transition. Terminal jobs are left untouched.
    pub async fn cancel(&self, id: &str) -> Option<JobSnapshot> {
        let mut state = self.inner.state.lock().await;
        let (remove_key, snapshot) = {
            let job = state.jobs.get_mut(id)?;
            match job.state {
                JobState::Queued => {
                    job.state = JobState::Cancelled;
                    job.finished_at = Some(Instant::now());
                    emit_state(&self.inner, id, JobState::Cancelled);
                    (Some(job.dedup_key()), job.snapshot())
                }
                JobState::Running => {
                    if let Some(abort) = &job.abort {
                        abort.store(true, Ordering::Relaxed);
                    }
                    (None, job.snapshot())
                }
                _ => (None, job.snapshot()),
            }
        };
        if let Some(key) = remove_key {
            state.in_flight.remove(&key);
        }
        Some(snapshot)
    }

    /// Subscribe to lifecycle/progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    /// Cancel every non-terminal job and wait (bounded by `grace`) for
    /// running workers to wind down their external processes.
    pub async fn cancel_all(&self, grace: Duration) {
        let ids: Vec<JobId> = {
            let state = self.inner.state.lock().await;
            state
                .jobs
                .values()
                .filter(|j| !j.state.is_terminal())
                .map(|j| j.id.clone())
                .collect()
        };
        for id in &ids {
            let _ = self.cancel(id).await;
        }

        let deadline = Instant::now() + grace;
        loop {
            let still_running = {
                let state = self.inner.state.lock().await;
                state.jobs.values().any(|j| j.state == JobState::Running)
            };
            if !still_running || Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Cancel everything and stop the worker pool. Used by backend shutdown.
    pub async fn shutdown(&self, grace: Duration) {
        self.cancel_all(grace).await;
        {
            let mut state = self.inner.state.lock().await;
            state.shutting_down = true;
        }
        self.inner.wake.notify_waiters();
        let handles = std::mem::take(&mut *self.workers.lock().await);
        for handle in handles {
            let _ = handle.await;
        }
        tracing::info!("job queue stopped");
    }
}
