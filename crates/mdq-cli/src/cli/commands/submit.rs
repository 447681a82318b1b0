//! `mdq submit` – submit a download job to the backend.

use anyhow::Result;
use mdq_core::client::ControlClient;
use mdq_core::fetcher::Quality;
use mdq_core::queue::SubmitRequest;
use std::path::PathBuf;

pub async fn run_submit(
    client: &ControlClient,
    source_ref: &str,
    quality: Quality,
    dest: PathBuf,
) -> Result<()> {
    let reply = client
        .submit(&SubmitRequest {
            source_ref: source_ref.to_string(),
            quality,
            destination_dir: dest,
        })
        .await?;

    if let Some(id) = reply.job_id {
        println!("queued {id}");
    } else if let Some(entry) = reply.already_completed {
        println!("already downloaded: {}", entry.file_path);
    }
    Ok(())
}
