use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of executions per job (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 1.0 = 1s).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 1.0,
            max_delay_secs: 60,
        }
    }
}

/// Global configuration loaded from `~/.config/mdq/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MdqConfig {
    /// Maximum number of fetches running at once (worker-pool size).
    pub max_concurrent_fetches: usize,
    /// No progress from the external tool within this window => treat the attempt as stalled.
    pub stall_window_secs: u64,
    /// How long terminal jobs stay queryable before being pruned.
    pub retention_secs: u64,
    /// External fetch tool binary (resolved via PATH unless absolute).
    pub tool_path: String,
    /// Default destination for downloads when a request does not carry one.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Pin the control-plane port instead of using an ephemeral one.
    #[serde(default)]
    pub port: Option<u16>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for MdqConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 3,
            stall_window_secs: 90,
            retention_secs: 3600,
            tool_path: "yt-dlp".to_string(),
            download_dir: None,
            port: None,
            retry: None,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MdqConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = MdqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: MdqConfig = toml::from_str(&data)?;
    Ok(cfg)
}
