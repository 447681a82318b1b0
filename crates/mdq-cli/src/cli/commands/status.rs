//! `mdq status` – show one job.

use anyhow::Result;
use mdq_core::client::ControlClient;

pub async fn run_status(client: &ControlClient, id: &str) -> Result<()> {
    let job = client.job(id).await?;
    println!("{:<10} {}", "id", job.id);
    println!("{:<10} {}", "state", job.state.as_str());
    println!("{:<10} {}%", "progress", job.percent);
    if let Some(phase) = job.phase {
        println!("{:<10} {}", "phase", phase.as_str());
    }
    println!("{:<10} {}", "attempts", job.attempt_count);
    println!("{:<10} {}", "source", job.source_ref);
    if let Some(path) = &job.file_path {
        println!("{:<10} {}", "file", path);
    }
    if let Some(err) = &job.last_error {
        println!("{:<10} {}", "error", err);
    }
    Ok(())
}
