//! `mdq health` – backend liveness probe.

use anyhow::Result;
use mdq_core::client::ControlClient;

pub async fn run_health(port: u16) -> Result<()> {
    // health needs no key; an empty one keeps the client simple.
    let client = ControlClient::new(port, "");
    match client.health().await {
        Ok(true) => println!("ok"),
        Ok(false) => println!("unhealthy"),
        Err(e) => println!("unreachable: {e}"),
    }
    Ok(())
}
