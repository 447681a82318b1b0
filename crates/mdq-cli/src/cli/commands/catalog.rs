//! `mdq catalog` – list completed downloads.

use anyhow::Result;
use mdq_core::client::ControlClient;

pub async fn run_catalog(client: &ControlClient, contains: Option<&str>) -> Result<()> {
    let entries = client.catalog(contains).await?;
    if entries.is_empty() {
        println!("Catalog is empty.");
        return Ok(());
    }
    println!("{:<6} {:<12} {}", "ID", "SIZE", "FILE");
    for e in entries {
        println!("{:<6} {:<12} {}", e.id, e.file_size, e.file_path);
    }
    Ok(())
}
