//! CLI for the MDQ download orchestrator.

mod commands;

use anyhow::{anyhow, bail, Result};
use clap::{Args, Parser, Subcommand};
use mdq_core::client::ControlClient;
use mdq_core::config;
use mdq_core::fetcher::Quality;
use std::path::PathBuf;

use commands::{
    run_cancel, run_catalog, run_clear_catalog, run_health, run_jobs, run_serve, run_status,
    run_submit, run_up,
};

/// Top-level CLI for the MDQ download orchestrator.
#[derive(Debug, Parser)]
#[command(name = "mdq")]
#[command(about = "MDQ: local media download orchestrator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Where to find the backend: port + signing key from its handshake.
#[derive(Debug, Args)]
pub struct Connection {
    /// Control-plane port from the backend handshake.
    #[arg(long)]
    pub port: u16,

    /// Signing key from the backend handshake (falls back to $MDQ_KEY).
    #[arg(long)]
    pub key: Option<String>,
}

impl Connection {
    fn client(&self) -> Result<ControlClient> {
        let key = match &self.key {
            Some(k) => k.clone(),
            None => std::env::var("MDQ_KEY")
                .map_err(|_| anyhow!("no signing key: pass --key or set MDQ_KEY"))?,
        };
        Ok(ControlClient::new(self.port, key))
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the backend in the foreground; prints the handshake line on stdout.
    Serve {
        /// Bind the control plane to a fixed port instead of an ephemeral one.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Launch and supervise a backend process (restarted on crash).
    Up,

    /// Submit a download job.
    Submit {
        /// Remote item URL.
        source_ref: String,

        /// Quality tier: low, standard, or high.
        #[arg(long, default_value = "high")]
        quality: String,

        /// Destination directory (defaults to configured download_dir, then the current directory).
        #[arg(long)]
        dest: Option<PathBuf>,

        #[command(flatten)]
        conn: Connection,
    },

    /// Show one job by id.
    Status {
        /// Job identifier.
        id: String,

        #[command(flatten)]
        conn: Connection,
    },

    /// List all retained jobs.
    Jobs {
        #[command(flatten)]
        conn: Connection,
    },

    /// Cancel a queued or running job.
    Cancel {
        /// Job identifier.
        id: String,

        #[command(flatten)]
        conn: Connection,
    },

    /// List the catalog of completed downloads.
    Catalog {
        /// Substring filter against source or file path.
        #[arg(long)]
        contains: Option<String>,

        #[command(flatten)]
        conn: Connection,
    },

    /// Clear the catalog (destructive).
    ClearCatalog {
        #[command(flatten)]
        conn: Connection,
    },

    /// Check backend liveness (no key required).
    Health {
        /// Control-plane port from the backend handshake.
        #[arg(long)]
        port: u16,
    },
}

fn parse_quality(s: &str) -> Result<Quality> {
    match s {
        "low" => Ok(Quality::Low),
        "standard" => Ok(Quality::Standard),
        "high" => Ok(Quality::High),
        other => bail!("unknown quality tier: {other} (expected low, standard, or high)"),
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Serve { port } => run_serve(cfg, port).await?,
            CliCommand::Up => run_up().await?,
            CliCommand::Submit { source_ref, quality, dest, conn } => {
                let quality = parse_quality(&quality)?;
                let dest = match dest.or_else(|| cfg.download_dir.clone()) {
                    Some(d) => d,
                    None => std::env::current_dir()?,
                };
                run_submit(&conn.client()?, &source_ref, quality, dest).await?;
            }
            CliCommand::Status { id, conn } => run_status(&conn.client()?, &id).await?,
            CliCommand::Jobs { conn } => run_jobs(&conn.client()?).await?,
            CliCommand::Cancel { id, conn } => run_cancel(&conn.client()?, &id).await?,
            CliCommand::Catalog { contains, conn } => {
                run_catalog(&conn.client()?, contains.as_deref()).await?;
            }
            CliCommand::ClearCatalog { conn } => run_clear_catalog(&conn.client()?).await?,
            CliCommand::Health { port } => run_health(port).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
