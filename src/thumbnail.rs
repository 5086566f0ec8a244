use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::Value;

use crate::error::DownloaderError;

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Telegram rejects larger audio thumbnails.
const MAX_THUMBNAIL_BYTES: usize = 200 * 1024;

static CLIENT: Lazy<Result<Client, String>> = Lazy::new(|| {
    Client::builder()
        .user_agent(concat!("tubequeue/", env!("CARGO_PKG_VERSION")))
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| e.to_string())
});

/// Resolve a thumbnail URL from yt-dlp JSON output.
pub fn resolve_thumbnail(v: &Value) -> Option<String> {
    let direct = |key: &str| v.get(key).and_then(|t| t.as_str()).filter(|s| !s.is_empty()).map(str::to_string);

    direct("thumbnail")
        .or_else(|| {
            v.get("thumbnails")
                .and_then(|arr| arr.as_array())
                .and_then(|thumbs| thumbs.last())
                .and_then(|t| t.get("url"))
                .and_then(|u| u.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .or_else(|| direct("thumbnail_url"))
        .filter(|s| s.starts_with("http"))
}

/// Download thumbnail bytes for an audio upload.
pub async fn fetch_thumbnail(url: &str) -> Result<Vec<u8>, DownloaderError> {
    let client = (*CLIENT).as_ref().map_err(|e| DownloaderError::internal(format!("http client unavailable: {e}")))?;

    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| DownloaderError::network(url, format!("thumbnail request failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(DownloaderError::network(url, format!("thumbnail returned status {}", resp.status())));
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| DownloaderError::network(url, format!("reading thumbnail body failed: {e}")))?;

    if bytes.len() > MAX_THUMBNAIL_BYTES {
        return Err(DownloaderError::network(url, format!("thumbnail is too large ({} bytes)", bytes.len())));
    }

    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefers_direct_thumbnail_field() {
        let v = json!({
            "thumbnail": "https://i.ytimg.com/vi/abc/maxresdefault.jpg",
            "thumbnails": [{"url": "https://i.ytimg.com/vi/abc/default.jpg"}]
        });
        assert_eq!(resolve_thumbnail(&v).as_deref(), Some("https://i.ytimg.com/vi/abc/maxresdefault.jpg"));
    }

    #[test]
    fn falls_back_to_last_thumbnail_entry() {
        let v = json!({
            "thumbnail": "",
            "thumbnails": [{"url": "https://a/small.jpg"}, {"url": "https://a/large.jpg"}]
        });
        assert_eq!(resolve_thumbnail(&v).as_deref(), Some("https://a/large.jpg"));
    }

    #[test]
    fn ignores_non_http_references() {
        assert!(resolve_thumbnail(&json!({"thumbnail": "file:///etc/passwd"})).is_none());
        assert!(resolve_thumbnail(&json!({"title": "no thumbs"})).is_none());
    }
}
