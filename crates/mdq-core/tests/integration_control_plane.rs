//! Integration tests: real HTTP against an ephemeral-port control plane
//! backed by a live queue and a temp-dir catalog.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use common::stub_fetcher::StubFetcher;
use mdq_core::catalog::CatalogStore;
use mdq_core::client::{ClientError, ControlClient};
use mdq_core::fetcher::Quality;
use mdq_core::queue::{JobQueue, JobState, QueueOptions, RetryPolicy, SubmitRequest};
use mdq_core::server::{ControlPlane, SigningKey};

struct Backend {
    client: ControlClient,
    plane: ControlPlane,
    queue: JobQueue,
    shutdown: Arc<Notify>,
    key: SigningKey,
    _state_dir: tempfile::TempDir,
    dest_dir: tempfile::TempDir,
}

async fn start_backend() -> Backend {
    let state_dir = tempfile::tempdir().unwrap();
    let dest_dir = tempfile::tempdir().unwrap();
    let catalog = CatalogStore::open_at(state_dir.path().join("catalog.db")).await.unwrap();
    let queue = JobQueue::start(
        catalog.clone(),
        Arc::new(StubFetcher),
        QueueOptions {
            workers: 2,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(50),
            },
            retention: Duration::from_secs(3600),
        },
    );
    let key = SigningKey::generate();
    let shutdown = Arc::new(Notify::new());
    let plane = ControlPlane::bind(
        catalog,
        queue.clone(),
        key.clone(),
        None,
        tokio::runtime::Handle::current(),
        Arc::clone(&shutdown),
    )
    .expect("bind control plane");
    let _ = plane.spawn();

    let client = ControlClient::new(plane.port(), key.expose());
    Backend { client, plane, queue, shutdown, key, _state_dir: state_dir, dest_dir }
}

fn request(backend: &Backend, source_ref: &str) -> SubmitRequest {
    SubmitRequest {
        source_ref: source_ref.to_string(),
        quality: Quality::High,
        destination_dir: backend.dest_dir.path().to_path_buf(),
    }
}

async fn wait_for_state(client: &ControlClient, id: &str, state: JobState) {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(snap) = client.job(id).await {
            if snap.state == state {
                return;
            }
        }
        assert!(
            std::time::Instant::now() < deadline,
            "timed out waiting for job {id} to reach {state:?}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn health_is_open_but_everything_else_needs_the_key() {
    let backend = start_backend().await;

    // health: no key required.
    let anon = ControlClient::new(backend.plane.port(), "wrong-key");
    assert!(anon.health().await.unwrap());

    // submit without a valid key: rejected, and no job is created.
    let err = anon.submit(&request(&backend, "https://example.com/watch?v=auth")).await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized));
    assert!(backend.client.jobs().await.unwrap().is_empty());

    // catalog and clear are gated too.
    assert!(matches!(anon.catalog(None).await.unwrap_err(), ClientError::Unauthorized));
    assert!(matches!(anon.clear_catalog().await.unwrap_err(), ClientError::Unauthorized));

    backend.plane.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn submit_completes_and_resubmission_hits_the_catalog() {
    let backend = start_backend().await;
    let src = "https://example.com/watch?v=full-flow";

    let reply = backend.client.submit(&request(&backend, src)).await.unwrap();
    let id = reply.job_id.expect("fresh submission queues a job");
    wait_for_state(&backend.client, &id, JobState::Completed).await;

    let snap = backend.client.job(&id).await.unwrap();
    assert_eq!(snap.percent, 100);
    let file_path = snap.file_path.expect("completed job carries a file path");
    assert!(std::path::Path::new(&file_path).exists());

    let entries = backend.client.catalog(None).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].source_ref, src);

    // Same source again: answered from the catalog, no new job id.
    let again = backend.client.submit(&request(&backend, src)).await.unwrap();
    assert!(again.job_id.is_none());
    assert_eq!(again.already_completed.unwrap().source_ref, src);

    // Filtered catalog listing.
    let filtered = backend.client.catalog(Some("full-flow")).await.unwrap();
    assert_eq!(filtered.len(), 1);
    let none = backend.client.catalog(Some("no-such-thing")).await.unwrap();
    assert!(none.is_empty());

    backend.plane.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_and_invalid_submissions_map_to_client_errors() {
    let backend = start_backend().await;
    let src = "https://example.com/watch?v=block-dup";

    let reply = backend.client.submit(&request(&backend, src)).await.unwrap();
    let id = reply.job_id.unwrap();
    wait_for_state(&backend.client, &id, JobState::Running).await;

    let err = backend.client.submit(&request(&backend, src)).await.unwrap_err();
    assert!(matches!(err, ClientError::Duplicate));

    let err = backend.client.submit(&request(&backend, "not a url")).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidRequest(_)));

    // Unknown job id is a NotFound, matching the crash-recovery policy:
    // jobs do not survive a backend restart and must be resubmitted.
    let err = backend.client.job("no-such-job").await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound));

    let cancelled = backend.client.cancel(&id).await.unwrap();
    assert!(matches!(cancelled.state, JobState::Running | JobState::Cancelled));
    wait_for_state(&backend.client, &id, JobState::Cancelled).await;

    backend.plane.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn transient_failure_is_retried_and_attempts_are_visible() {
    let backend = start_backend().await;
    let src = "https://example.com/watch?v=netfail";

    let reply = backend.client.submit(&request(&backend, src)).await.unwrap();
    let id = reply.job_id.unwrap();
    wait_for_state(&backend.client, &id, JobState::Failed).await;

    let snap = backend.client.job(&id).await.unwrap();
    assert_eq!(snap.attempt_count, 3, "retried to the limit");
    assert!(snap.last_error.unwrap().contains("network_error"));

    backend.plane.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn clear_catalog_removes_recorded_completions() {
    let backend = start_backend().await;
    let src = "https://example.com/watch?v=clear-me";

    let id = backend.client.submit(&request(&backend, src)).await.unwrap().job_id.unwrap();
    wait_for_state(&backend.client, &id, JobState::Completed).await;
    assert_eq!(backend.client.catalog(None).await.unwrap().len(), 1);

    let n = backend.client.clear_catalog().await.unwrap();
    assert_eq!(n, 1);
    assert!(backend.client.catalog(None).await.unwrap().is_empty());

    backend.plane.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_route_cancels_jobs_and_signals_the_backend() {
    let backend = start_backend().await;
    let src = "https://example.com/watch?v=block-shutdown";

    let id = backend.client.submit(&request(&backend, src)).await.unwrap().job_id.unwrap();
    wait_for_state(&backend.client, &id, JobState::Running).await;

    backend.client.shutdown().await.unwrap();
    // The route stores a wakeup even if nobody is waiting yet.
    tokio::time::timeout(Duration::from_secs(2), backend.shutdown.notified())
        .await
        .expect("shutdown must be signalled");

    // What run_backend does next: cancel in-flight jobs, then stop the plane.
    backend.queue.shutdown(Duration::from_secs(2)).await;
    let snap = backend.queue.snapshot(&id).await.unwrap();
    assert_eq!(snap.state, JobState::Cancelled);

    backend.plane.stop();
    // Requests after stop fail at the transport level; the key object is
    // dropped with the process and never reusable across restarts.
    drop(backend.key);
}
