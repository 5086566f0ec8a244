use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, LogFormat};

/// Maximum size of the diagnostics log before rotation (in bytes).
const MAX_LOG_BYTES: u64 = 1_000_000; // ~1 MB

/// File name (inside the configured log directory) of the yt-dlp diagnostics log.
const YT_DLP_LOG_FILE: &str = "tubequeue-yt-dlp.log";

/// Filter used when the configured level is not a valid directive.
const FALLBACK_FILTER: &str = "info";

static YT_DLP_LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    Network,
    Validation,
    System,
    Download,
    Delivery,
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Validation => "validation",
            ErrorCategory::System => "system",
            ErrorCategory::Download => "download",
            ErrorCategory::Delivery => "delivery",
            ErrorCategory::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Install the global tracing subscriber and remember where diagnostics go.
///
/// Calling this more than once keeps the first subscriber.
pub fn init(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let installed = match config.log_format {
        LogFormat::Json => builder.json().try_init().is_ok(),
        LogFormat::Pretty => builder.try_init().is_ok(),
    };

    let _ = YT_DLP_LOG_PATH.set(config.log_dir.join(YT_DLP_LOG_FILE));

    if installed && EnvFilter::try_new(&config.log_level).is_err() {
        tracing::warn!(
            category = %ErrorCategory::Validation,
            level = %config.log_level,
            "invalid log level directive, falling back to info"
        );
    }
}

fn current_timestamp() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0)
}

fn rotate_if_needed(path: &Path) -> io::Result<()> {
    if let Ok(meta) = fs::metadata(path)
        && meta.len() >= MAX_LOG_BYTES
    {
        // Single-file rotation: tubequeue-yt-dlp.log -> tubequeue-yt-dlp.log.1
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| YT_DLP_LOG_FILE.to_string());

        let rotated_path = path.with_file_name(format!("{file_name}.1"));
        let _ = fs::remove_file(&rotated_path);

        fs::rename(path, rotated_path)?;
    }

    Ok(())
}

fn append_line(path: &Path, line: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    rotate_if_needed(path)?;

    let mut file = if path.exists() {
        OpenOptions::new().append(true).open(path)?
    } else {
        File::create(path)?
    };

    writeln!(file, "[{}] {}", current_timestamp(), line)?;
    Ok(())
}

/// Append one raw yt-dlp output line to the rotated diagnostics log.
///
/// Best-effort: failures only produce a tracing event.
pub fn append_yt_dlp_log(job_id: &str, line: &str) {
    let Some(path) = YT_DLP_LOG_PATH.get() else {
        tracing::debug!(job_id, line, "yt-dlp output");
        return;
    };

    if let Err(e) = append_line(path, &format!("[job-{job_id}] {line}")) {
        tracing::debug!(job_id, line, path = %path.display(), error = %e, "failed to write yt-dlp log entry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_line_creates_parent_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(YT_DLP_LOG_FILE);

        append_line(&path, "first").unwrap();
        append_line(&path, "second").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("first"));
        assert!(lines[1].ends_with("second"));
        assert!(lines[0].starts_with('['));
    }

    #[test]
    fn test_rotation_moves_full_log_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(YT_DLP_LOG_FILE);
        fs::write(&path, vec![b'x'; MAX_LOG_BYTES as usize]).unwrap();

        append_line(&path, "fresh").unwrap();

        let rotated = dir.path().join(format!("{YT_DLP_LOG_FILE}.1"));
        assert_eq!(fs::metadata(&rotated).unwrap().len(), MAX_LOG_BYTES);
        assert!(fs::read_to_string(&path).unwrap().ends_with("fresh\n"));
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Download.to_string(), "download");
        assert_eq!(ErrorCategory::Delivery.to_string(), "delivery");
    }
}
