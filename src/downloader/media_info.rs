//! Media info extraction from yt-dlp JSON output.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;

use crate::config::{Config, ToolCommand};
use crate::error::{DownloaderError, ResolutionKind};
use crate::logging::append_yt_dlp_log;
use crate::thumbnail::resolve_thumbnail;

use super::settings::build_info_args;
use super::ytdlp::{command, run_yt_dlp, tail};

/// Format id whose size stands in for the audio download estimate.
pub const REFERENCE_AUDIO_FORMAT_ID: &str = "140";

/// Container whose first sized entry stands in for the video download estimate.
pub const VIDEO_CONTAINER: &str = "mp4";

/// What the user asked for: a direct link or free-text search terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaReference {
    Url(String),
    Search(String),
}

impl MediaReference {
    pub fn as_str(&self) -> &str {
        match self {
            MediaReference::Url(s) | MediaReference::Search(s) => s,
        }
    }
}

/// Media info extracted from yt-dlp JSON
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSummary {
    pub canonical_id: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub performer: Option<String>,
    /// 0 when the reference audio format reports no size
    pub audio_size_bytes: u64,
    /// 0 when no mp4 format reports a size
    pub video_size_bytes: u64,
}

fn non_empty_str<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(|s| s.as_str()).map(str::trim).filter(|s| !s.is_empty())
}

fn format_size(format: &Value) -> Option<u64> {
    format.get("filesize").and_then(|s| s.as_u64())
}

/// Size estimates from the `formats` array.
fn extract_sizes(v: &Value) -> (u64, u64) {
    let Some(formats) = v.get("formats").and_then(|f| f.as_array()) else {
        return (0, 0);
    };

    let audio = formats
        .iter()
        .filter(|f| f.get("format_id").and_then(|id| id.as_str()) == Some(REFERENCE_AUDIO_FORMAT_ID))
        .find_map(format_size)
        .unwrap_or(0);

    let video = formats
        .iter()
        .filter(|f| f.get("ext").and_then(|e| e.as_str()) == Some(VIDEO_CONTAINER))
        .find_map(format_size)
        .unwrap_or(0);

    (audio, video)
}

/// Turn one yt-dlp JSON document into a summary.
///
/// Search results and playlists arrive wrapped in `entries`; the first entry
/// is used.
pub fn summarize(v: &Value, reference: &str) -> Result<MediaSummary, DownloaderError> {
    if let Some(entries) = v.get("entries").and_then(|e| e.as_array()) {
        let first = entries.first().ok_or_else(|| {
            DownloaderError::resolution(ResolutionKind::NoResults, reference, "yt-dlp returned no entries")
        })?;
        return summarize(first, reference);
    }

    let canonical_id = non_empty_str(v, "id")
        .ok_or_else(|| DownloaderError::resolution(ResolutionKind::MalformedOutput, reference, "metadata has no id"))?
        .to_string();

    let title = non_empty_str(v, "title").unwrap_or(&canonical_id).to_string();

    let performer = non_empty_str(v, "creator")
        .or_else(|| non_empty_str(v, "uploader"))
        .or_else(|| non_empty_str(v, "channel"))
        .map(str::to_string);

    let (audio_size_bytes, video_size_bytes) = extract_sizes(v);

    Ok(MediaSummary {
        canonical_id,
        title,
        thumbnail: resolve_thumbnail(v),
        performer,
        audio_size_bytes,
        video_size_bytes,
    })
}

/// Metadata lookups through yt-dlp.
#[derive(Debug, Clone)]
pub struct MediaResolver {
    tool: ToolCommand,
    cookies: Option<PathBuf>,
    timeout: Duration,
}

impl MediaResolver {
    pub fn new(tool: ToolCommand, cookies: Option<PathBuf>, timeout: Duration) -> Self {
        Self { tool, cookies, timeout }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.ytdlp.clone(), config.cookies_file.clone(), config.resolve_timeout)
    }

    /// Resolve a reference to the metadata of a single media item.
    pub async fn resolve(&self, reference: &MediaReference) -> Result<MediaSummary, DownloaderError> {
        let text = reference.as_str();
        if text.trim().is_empty() {
            return Err(DownloaderError::invalid_reference("reference cannot be empty"));
        }

        let mut cmd = command(&self.tool);
        cmd.args(build_info_args(reference, self.cookies.as_deref()));

        let output = run_yt_dlp(&mut cmd, self.timeout).await.map_err(|e| {
            let kind = if e.kind() == io::ErrorKind::TimedOut {
                ResolutionKind::Timeout
            } else {
                ResolutionKind::ProcessFailed
            };
            DownloaderError::resolution(kind, text, format!("failed to run yt-dlp: {e}"))
        })?;

        for line in output.stderr.lines().filter(|l| !l.trim().is_empty()) {
            append_yt_dlp_log("resolve", line);
        }

        // Partial metadata from a failed run is not trusted.
        if !output.status.success() {
            return Err(DownloaderError::resolution(
                ResolutionKind::ProcessFailed,
                text,
                format!("yt-dlp failed: {}", tail(&output.stderr, 5)),
            ));
        }

        let Some(line) = output.stdout.lines().map(str::trim).find(|l| !l.is_empty()) else {
            return Err(DownloaderError::resolution(
                ResolutionKind::NoResults,
                text,
                "yt-dlp printed no metadata",
            ));
        };

        let v: Value = serde_json::from_str(line).map_err(|e| {
            DownloaderError::resolution(ResolutionKind::MalformedOutput, text, format!("invalid metadata JSON: {e}"))
        })?;
        summarize(&v, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summary_takes_audio_size_from_reference_format() {
        let v = json!({
            "id": "abc",
            "title": "Song",
            "uploader": "Someone",
            "formats": [
                {"format_id": "139", "ext": "m4a", "filesize": 1_000},
                {"format_id": "140", "ext": "m4a", "filesize": 3_000_000},
                {"format_id": "18", "ext": "mp4", "filesize": 9_000_000},
                {"format_id": "22", "ext": "mp4", "filesize": 20_000_000},
            ]
        });

        let summary = summarize(&v, "ref").unwrap();
        assert_eq!(summary.canonical_id, "abc");
        assert_eq!(summary.title, "Song");
        assert_eq!(summary.performer.as_deref(), Some("Someone"));
        assert_eq!(summary.audio_size_bytes, 3_000_000);
        assert_eq!(summary.video_size_bytes, 9_000_000);
    }

    #[test]
    fn unsized_formats_default_to_zero() {
        let v = json!({
            "id": "abc",
            "formats": [
                {"format_id": "140", "ext": "m4a", "filesize": null},
                {"format_id": "18", "ext": "mp4"},
            ]
        });

        let summary = summarize(&v, "ref").unwrap();
        assert_eq!(summary.audio_size_bytes, 0);
        assert_eq!(summary.video_size_bytes, 0);
        assert_eq!(summary.title, "abc");
    }

    #[test]
    fn first_sized_mp4_wins() {
        let v = json!({
            "id": "abc",
            "formats": [
                {"format_id": "160", "ext": "mp4"},
                {"format_id": "133", "ext": "mp4", "filesize": 5},
                {"format_id": "18", "ext": "mp4", "filesize": 7},
            ]
        });
        assert_eq!(summarize(&v, "ref").unwrap().video_size_bytes, 5);
    }

    #[test]
    fn creator_preferred_over_uploader() {
        let v = json!({"id": "abc", "creator": "Artist", "uploader": "Channel"});
        assert_eq!(summarize(&v, "ref").unwrap().performer.as_deref(), Some("Artist"));
    }

    #[test]
    fn search_wrapper_uses_first_entry() {
        let v = json!({"_type": "playlist", "entries": [{"id": "first"}, {"id": "second"}]});
        assert_eq!(summarize(&v, "q").unwrap().canonical_id, "first");

        let empty = json!({"_type": "playlist", "entries": []});
        let err = summarize(&empty, "q").unwrap_err();
        assert!(matches!(err, DownloaderError::Resolution { kind: ResolutionKind::NoResults, .. }));
    }

    #[test]
    fn missing_id_is_malformed() {
        let err = summarize(&json!({"title": "x"}), "ref").unwrap_err();
        assert!(matches!(err, DownloaderError::Resolution { kind: ResolutionKind::MalformedOutput, .. }));
    }

    #[cfg(unix)]
    fn shell_resolver(script: &str) -> MediaResolver {
        // The script ignores the appended yt-dlp arguments.
        MediaResolver::new(
            ToolCommand::with_args("sh", ["-c", script, "yt-dlp"]),
            None,
            Duration::from_secs(5),
        )
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn resolve_parses_tool_output() {
        let resolver = shell_resolver(r#"echo '{"id":"abc","title":"T","formats":[{"format_id":"140","filesize":10}]}'"#);
        let summary = resolver.resolve(&MediaReference::Url("https://youtu.be/abc".into())).await.unwrap();
        assert_eq!(summary.canonical_id, "abc");
        assert_eq!(summary.audio_size_bytes, 10);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn resolve_reports_failures_by_kind() {
        let reference = MediaReference::Search("nothing".into());

        let err = shell_resolver("exit 0").resolve(&reference).await.unwrap_err();
        assert!(matches!(err, DownloaderError::Resolution { kind: ResolutionKind::NoResults, .. }));

        let err = shell_resolver("echo 'ERROR: boom' 1>&2; exit 1").resolve(&reference).await.unwrap_err();
        assert!(matches!(err, DownloaderError::Resolution { kind: ResolutionKind::ProcessFailed, .. }));

        let err = shell_resolver("echo 'not json'").resolve(&reference).await.unwrap_err();
        assert!(matches!(err, DownloaderError::Resolution { kind: ResolutionKind::MalformedOutput, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn metadata_from_failed_run_is_rejected() {
        let resolver = shell_resolver(r#"echo '{"id":"abc","title":"T"}'; exit 1"#);
        let err = resolver
            .resolve(&MediaReference::Url("https://youtu.be/abc".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloaderError::Resolution { kind: ResolutionKind::ProcessFailed, .. }));
    }

    #[tokio::test]
    async fn blank_reference_is_invalid() {
        let resolver = MediaResolver::new(ToolCommand::new("yt-dlp"), None, Duration::from_secs(1));
        let err = resolver.resolve(&MediaReference::Search("  ".into())).await.unwrap_err();
        assert!(matches!(err, DownloaderError::Validation { .. }));
    }
}
