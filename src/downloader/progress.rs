//! Progress parsing utilities for yt-dlp output.

/// Parse progress percentage from a yt-dlp progress line.
/// Returns None if line doesn't contain valid progress.
///
/// The progress template emits strings like "tubequeue-  12.3%".
/// Find the marker anywhere in the line to be resilient to prefix changes.
pub fn parse_progress_percent(line: &str) -> Option<f64> {
    const MARKER: &str = "tubequeue-";

    let idx = line.find(MARKER)?;
    let after_prefix = &line[idx + MARKER.len()..];
    let percent_end = after_prefix.find('%')?;
    let percent_str = after_prefix[..percent_end].trim();

    if percent_str == "N/A" {
        return None;
    }

    percent_str.parse::<f64>().ok().map(|p| p.clamp(0.0, 100.0))
}

/// Check if a stderr line is worth keeping in the diagnostics log.
pub fn should_log_stderr(line: &str) -> bool {
    let line_lower = line.to_lowercase();
    line_lower.contains("error") || line_lower.contains("warning") || line_lower.contains("failed")
}
