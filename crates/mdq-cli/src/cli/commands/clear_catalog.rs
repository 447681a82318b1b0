//! `mdq clear-catalog` – destructive catalog reset.

use anyhow::Result;
use mdq_core::client::ControlClient;

pub async fn run_clear_catalog(client: &ControlClient) -> Result<()> {
    let n = client.clear_catalog().await?;
    println!("cleared {n} entries");
    Ok(())
}
