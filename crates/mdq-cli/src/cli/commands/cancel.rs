//! `mdq cancel` – cancel a queued or running job.

use anyhow::Result;
use mdq_core::client::ControlClient;

pub async fn run_cancel(client: &ControlClient, id: &str) -> Result<()> {
    let job = client.cancel(id).await?;
    println!("{} {}", job.id, job.state.as_str());
    Ok(())
}
