//! `mdq up` – launch and supervise a backend process.

use anyhow::Result;
use mdq_core::supervisor::{Supervisor, SupervisorOptions};

pub async fn run_up() -> Result<()> {
    let supervisor = Supervisor::new(SupervisorOptions::default());
    let handshake = supervisor.start().await?;

    // Relay the handshake to the consuming shell; stdout is the channel.
    println!("{}", serde_json::to_string(&handshake)?);

    tokio::signal::ctrl_c().await?;
    supervisor.stop().await?;
    Ok(())
}
