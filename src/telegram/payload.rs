//! Inline button payloads.

use crate::error::DownloaderError;
use crate::job::FormatChoice;

/// Telegram's limit on `callback_data`.
pub const MAX_CALLBACK_DATA_BYTES: usize = 64;

pub fn encode(choice: &FormatChoice) -> Result<String, DownloaderError> {
    let data = serde_json::to_string(choice)
        .map_err(|e| DownloaderError::invalid_payload(format!("serializing format choice: {e}")))?;
    if data.len() > MAX_CALLBACK_DATA_BYTES {
        return Err(DownloaderError::invalid_payload(format!(
            "format choice payload is {} bytes, limit is {MAX_CALLBACK_DATA_BYTES}",
            data.len()
        )));
    }
    Ok(data)
}

/// Decode a button payload. The extension is checked against the kind on admission.
pub fn decode(data: &str) -> Result<FormatChoice, DownloaderError> {
    serde_json::from_str(data).map_err(|e| DownloaderError::invalid_payload(format!("malformed button payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{FormatKind, ADMISSION_THRESHOLD_BYTES};

    #[test]
    fn fits_callback_limit_for_realistic_ids() {
        let choice = FormatChoice::new(FormatKind::Video, "dQw4w9WgXcQ", ADMISSION_THRESHOLD_BYTES - 1);
        let data = encode(&choice).unwrap();
        assert!(data.len() <= MAX_CALLBACK_DATA_BYTES, "{data}");
        assert_eq!(decode(&data).unwrap(), choice);
    }

    #[test]
    fn wire_form_is_compact() {
        let data = encode(&FormatChoice::new(FormatKind::Audio, "abc", 3_000_000)).unwrap();
        assert_eq!(data, r#"{"k":"a","i":"abc","e":"mp3","s":3000000}"#);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let choice = FormatChoice::new(FormatKind::Audio, "x".repeat(60), 1);
        assert!(matches!(encode(&choice), Err(DownloaderError::Validation { .. })));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode("video|abc|mp4|123").is_err());
        assert!(decode(r#"{"k":"x","i":"abc","e":"mp4","s":1}"#).is_err());
    }
}
