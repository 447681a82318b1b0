//! `mdq jobs` – list all retained jobs.

use anyhow::Result;
use mdq_core::client::ControlClient;

pub async fn run_jobs(client: &ControlClient) -> Result<()> {
    let jobs = client.jobs().await?;
    if jobs.is_empty() {
        println!("No jobs.");
        return Ok(());
    }
    println!("{:<38} {:<10} {:>4} {}", "ID", "STATE", "PCT", "SOURCE");
    for j in jobs {
        println!("{:<38} {:<10} {:>3}% {}", j.id, j.state.as_str(), j.percent, j.source_ref);
    }
    Ok(())
}
