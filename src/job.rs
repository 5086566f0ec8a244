//! Download jobs and their terminal outcomes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DownloaderError, ErrorCode};

/// Size estimates at or above this are rejected before a job exists.
///
/// Independent of the retrieval cap in `downloader::settings`; the two are
/// separate layers and are not meant to be reconciled here.
pub const ADMISSION_THRESHOLD_BYTES: u64 = 200_000_000;

/// Where a message lives in the chat platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatKind {
    #[serde(rename = "v")]
    Video,
    #[serde(rename = "a")]
    Audio,
}

impl FormatKind {
    pub const fn extension(&self) -> &'static str {
        match self {
            FormatKind::Video => "mp4",
            FormatKind::Audio => "mp3",
        }
    }
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatKind::Video => f.write_str("video"),
            FormatKind::Audio => f.write_str("audio"),
        }
    }
}

/// A format picked by the user for a resolved media item.
///
/// Field names are short because the serialized form travels in a
/// size-limited button payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatChoice {
    #[serde(rename = "k")]
    pub kind: FormatKind,
    #[serde(rename = "i")]
    pub media_id: String,
    #[serde(rename = "e")]
    pub extension: String,
    #[serde(rename = "s")]
    pub estimated_size_bytes: u64,
}

impl FormatChoice {
    pub fn new(kind: FormatKind, media_id: impl Into<String>, estimated_size_bytes: u64) -> Self {
        Self {
            kind,
            media_id: media_id.into(),
            extension: kind.extension().to_string(),
            estimated_size_bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// A single admitted download request. Immutable once enqueued.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub media_id: String,
    pub kind: FormatKind,
    pub estimated_size_bytes: u64,
    /// The message carrying the format buttons; its chat receives all status.
    pub origin: MessageRef,
}

impl Job {
    /// Admission check: turns a choice into a job, or rejects it.
    pub fn admit(choice: FormatChoice, origin: MessageRef) -> Result<Self, DownloaderError> {
        if choice.extension != choice.kind.extension() {
            return Err(DownloaderError::invalid_payload(format!(
                "extension {:?} does not match {} format",
                choice.extension, choice.kind
            )));
        }
        if choice.media_id.trim().is_empty() {
            return Err(DownloaderError::invalid_payload("media id cannot be empty"));
        }
        if choice.estimated_size_bytes >= ADMISSION_THRESHOLD_BYTES {
            return Err(DownloaderError::Admission {
                estimated_size_bytes: choice.estimated_size_bytes,
                threshold: ADMISSION_THRESHOLD_BYTES,
            });
        }

        Ok(Self {
            id: JobId::new(),
            media_id: choice.media_id,
            kind: choice.kind,
            estimated_size_bytes: choice.estimated_size_bytes,
            origin,
        })
    }

    pub fn output_extension(&self) -> &'static str {
        self.kind.extension()
    }

    pub fn chat_id(&self) -> i64 {
        self.origin.chat_id
    }

    pub fn source_url(&self) -> String {
        watch_url(&self.media_id)
    }
}

/// Canonical page URL for a media id.
pub fn watch_url(media_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={media_id}")
}

/// Terminal result of executing one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded(PathBuf),
    /// The retrieval tool refused the file under its own size cap.
    TooLarge,
    /// The tool succeeded but announced no output file.
    NotFound,
    /// Non-zero exit for any other reason; `detail` is for logs only.
    DownloadFailed { detail: String },
    TimedOut,
    UnexpectedError { message: String },
}

impl Outcome {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedError {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Succeeded(_) => "succeeded",
            Outcome::TooLarge => "too_large",
            Outcome::NotFound => "not_found",
            Outcome::DownloadFailed { .. } => "download_failed",
            Outcome::TimedOut => "timed_out",
            Outcome::UnexpectedError { .. } => "unexpected_error",
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Outcome::Succeeded(_) => None,
            Outcome::TooLarge => Some(ErrorCode::EDlTooLarge),
            Outcome::DownloadFailed { .. } => Some(ErrorCode::EDlProcessFailed),
            Outcome::NotFound => Some(ErrorCode::EIoNotFound),
            Outcome::TimedOut => Some(ErrorCode::EDlTimeout),
            Outcome::UnexpectedError { .. } => Some(ErrorCode::EInternal),
        }
    }
}
