//! User-facing reporting for queued jobs.
//!
//! All chat traffic goes through the [`Messenger`] trait so the worker can run
//! against the real bot API or a recording fake. Failures to talk to the chat
//! platform are logged and never abort the worker.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::downloader::media_info::{MediaReference, MediaResolver};
use crate::error::DownloaderError;
use crate::job::{FormatKind, Job, MessageRef, Outcome};
use crate::logging::ErrorCategory;
use crate::messages;
use crate::thumbnail::fetch_thumbnail;

/// Metadata attached to an audio upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioMetadata {
    pub title: String,
    pub performer: Option<String>,
    pub thumbnail: Option<Vec<u8>>,
}

/// Outbound chat operations.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<MessageRef, DownloaderError>;
    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), DownloaderError>;
    async fn delete(&self, message: MessageRef) -> Result<(), DownloaderError>;
    /// Streamable video upload.
    async fn send_video(&self, chat_id: i64, file: &Path) -> Result<(), DownloaderError>;
    async fn send_audio(&self, chat_id: i64, file: &Path, metadata: AudioMetadata) -> Result<(), DownloaderError>;
}

/// The per-job status message, if one could be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusHandle {
    chat_id: i64,
    message: Option<MessageRef>,
}

impl StatusHandle {
    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    pub fn message(&self) -> Option<MessageRef> {
        self.message
    }
}

/// How a terminal outcome reached the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The file was uploaded.
    Delivered,
    /// A failure text was shown.
    Reported,
    /// Even reporting failed; only the logs know.
    Lost,
}

pub struct Notifier {
    messenger: Arc<dyn Messenger>,
    resolver: Arc<MediaResolver>,
}

impl Notifier {
    pub fn new(messenger: Arc<dyn Messenger>, resolver: Arc<MediaResolver>) -> Self {
        Self { messenger, resolver }
    }

    /// Replace the text of the message a choice was made on.
    pub async fn notify_origin(&self, origin: MessageRef, text: &str) {
        if let Err(e) = self.messenger.edit_text(origin, text).await {
            tracing::warn!(
                chat_id = origin.chat_id,
                category = %ErrorCategory::Delivery,
                error = %e,
                "failed to edit origin message"
            );
        }
    }

    /// Send the status message that later edits go to.
    ///
    /// On failure the handle is empty: progress edits become no-ops and the
    /// terminal report goes out as a new message.
    pub async fn announce_start(&self, chat_id: i64) -> StatusHandle {
        let message = match self.messenger.send_text(chat_id, messages::STARTING).await {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!(chat_id, category = %ErrorCategory::Delivery, error = %e, "failed to send status message");
                None
            }
        };
        StatusHandle { chat_id, message }
    }

    pub async fn announce_progress(&self, status: &StatusHandle, text: &str) {
        let Some(message) = status.message else {
            return;
        };
        if let Err(e) = self.messenger.edit_text(message, text).await {
            tracing::debug!(chat_id = status.chat_id, error = %e, "progress edit failed");
        }
    }

    /// Deliver the file for a successful outcome, or report the failure.
    pub async fn deliver_result(&self, status: &StatusHandle, job: &Job, outcome: Outcome) -> Delivery {
        let path = match outcome {
            Outcome::Succeeded(path) => path,
            failed => {
                let text = messages::failure_text(&failed).unwrap_or(messages::ERR_UNEXPECTED);
                return self.report(status, text).await;
            }
        };

        self.announce_progress(status, messages::UPLOADING).await;

        match self.upload(job, &path).await {
            Ok(()) => {
                if let Some(message) = status.message
                    && let Err(e) = self.messenger.delete(message).await
                {
                    tracing::debug!(chat_id = status.chat_id, error = %e, "failed to delete status message");
                }
                Delivery::Delivered
            }
            Err(e) => {
                tracing::error!(
                    job_id = %job.id,
                    code = %e.code(),
                    category = %ErrorCategory::Delivery,
                    error = %e,
                    "delivery failed"
                );
                self.report(status, messages::ERR_DELIVERY).await
            }
        }
    }

    async fn upload(&self, job: &Job, path: &Path) -> Result<(), DownloaderError> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(DownloaderError::delivery(format!("output file {} is missing", path.display())));
        }

        match job.kind {
            FormatKind::Video => self.messenger.send_video(job.chat_id(), path).await,
            FormatKind::Audio => {
                let metadata = self.audio_metadata(job, path).await;
                self.messenger.send_audio(job.chat_id(), path, metadata).await
            }
        }
    }

    /// Title, performer and cover art for an audio upload.
    ///
    /// Falls back to the file name when re-resolving the media fails; a
    /// missing thumbnail is never fatal.
    async fn audio_metadata(&self, job: &Job, path: &Path) -> AudioMetadata {
        let fallback_title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| job.media_id.clone());

        let summary = match self.resolver.resolve(&MediaReference::Url(job.source_url())).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(job_id = %job.id, code = %e.code(), error = %e, "audio metadata lookup failed");
                return AudioMetadata {
                    title: fallback_title,
                    ..AudioMetadata::default()
                };
            }
        };

        let thumbnail = match summary.thumbnail.as_deref() {
            Some(url) => match fetch_thumbnail(url).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::debug!(job_id = %job.id, error = %e, "thumbnail fetch failed");
                    None
                }
            },
            None => None,
        };

        AudioMetadata {
            title: summary.title,
            performer: summary.performer,
            thumbnail,
        }
    }

    async fn report(&self, status: &StatusHandle, text: &str) -> Delivery {
        let result = match status.message {
            Some(message) => self.messenger.edit_text(message, text).await,
            None => self.messenger.send_text(status.chat_id, text).await.map(|_| ()),
        };

        match result {
            Ok(()) => Delivery::Reported,
            Err(e) => {
                tracing::error!(
                    chat_id = status.chat_id,
                    category = %ErrorCategory::Delivery,
                    error = %e,
                    "failed to report job result"
                );
                Delivery::Lost
            }
        }
    }
}
