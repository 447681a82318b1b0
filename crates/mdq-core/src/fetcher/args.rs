//! Request validation and external tool argument construction.

use std::path::Path;
use url::Url;

use super::FetchRequest;

/// Validate a source_ref: must parse as an absolute http/https URL.
/// Returns the normalized URL string. Fails fast, before any tool spawn.
pub fn validate_source_ref(source_ref: &str) -> Result<String, String> {
    let trimmed = source_ref.trim();
    if trimmed.is_empty() {
        return Err("source_ref is empty".to_string());
    }
    let parsed = Url::parse(trimmed).map_err(|e| format!("source_ref is not a valid URL: {e}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        other => Err(format!("unsupported source_ref scheme: {other}")),
    }
}

/// Validate a destination: must be an absolute path to an existing directory.
pub fn validate_destination(dir: &Path) -> Result<(), String> {
    if !dir.is_absolute() {
        return Err(format!("destination_dir must be absolute: {}", dir.display()));
    }
    if !dir.is_dir() {
        return Err(format!("destination_dir does not exist: {}", dir.display()));
    }
    Ok(())
}

/// Build the argument vector for the external tool.
///
/// Output lands at `<destination_dir>/<job_id>.mp3` so partial files and
/// the final product are findable by job id alone. `--newline` makes the
/// tool emit one progress line per update for stream parsing.
pub fn build_tool_args(req: &FetchRequest) -> Vec<String> {
    let output_template = req
        .destination_dir
        .join(format!("{}.%(ext)s", req.job_id))
        .to_string_lossy()
        .into_owned();

    vec![
        "--newline".to_string(),
        "--no-playlist".to_string(),
        "--format".to_string(),
        "bestaudio[acodec!=none]/best[acodec!=none]/bestaudio/best".to_string(),
        "--extract-audio".to_string(),
        "--audio-format".to_string(),
        "mp3".to_string(),
        "--audio-quality".to_string(),
        format!("{}K", req.quality.kbps()),
        "--output".to_string(),
        output_template,
        req.source_ref.clone(),
    ]
}
