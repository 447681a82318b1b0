//! `mdq serve` – run the backend in the foreground.

use anyhow::Result;
use mdq_core::backend;
use mdq_core::config::MdqConfig;

pub async fn run_serve(cfg: MdqConfig, port: Option<u16>) -> Result<()> {
    backend::run_backend(cfg, port).await
}
