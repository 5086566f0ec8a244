//! Download orchestration.
//!
//! This module resolves user references, admits format choices into the
//! queue, and runs the single worker that drains it.
//!
//! ## Module Structure
//! - `media_info` - Media metadata resolution
//! - `progress` - Progress message parsing
//! - `settings` - yt-dlp arguments and retrieval limits
//! - `subprocess` - yt-dlp process management for one job
//! - `ytdlp` - Low-level yt-dlp execution
//!
//! ## Worker lifecycle
//! The worker is spawned by whichever enqueue finds it stopped, and exits as
//! soon as it finds the queue empty. Both transitions happen under the queue
//! lock, so an enqueue either lands before the worker's final check (and is
//! processed) or after it (and starts a new worker).

pub mod media_info;
pub mod progress;
pub mod settings;
pub mod subprocess;
pub mod ytdlp;

pub use media_info::{MediaReference, MediaResolver, MediaSummary};
pub use subprocess::{DownloadExecutor, Execution};

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::sync::{mpsc, watch};

use crate::config::Config;
use crate::download_queue::{DownloadQueue, Enqueued, QueueStatus};
use crate::error::DownloaderError;
use crate::job::{FormatChoice, Job, MessageRef, Outcome};
use crate::logging::ErrorCategory;
use crate::messages;
use crate::notifier::{Messenger, Notifier, StatusHandle};
use crate::storage::{Storage, WorkingDir};

/// Minimum spacing between progress edits of one status message.
pub const PROGRESS_EDIT_INTERVAL: Duration = Duration::from_secs(3);

/// Queue, worker and everything a job needs on its way through them.
pub struct DownloadService {
    queue: Mutex<DownloadQueue>,
    idle: watch::Sender<bool>,
    resolver: Arc<MediaResolver>,
    executor: DownloadExecutor,
    notifier: Notifier,
    storage: Storage,
}

impl DownloadService {
    pub fn new(config: &Config, messenger: Arc<dyn Messenger>) -> Arc<Self> {
        let storage = Storage::new(&config.download_dir);
        let resolver = Arc::new(MediaResolver::from_config(config));
        let (idle, _) = watch::channel(true);

        Arc::new(Self {
            queue: Mutex::new(DownloadQueue::new()),
            idle,
            executor: DownloadExecutor::from_config(config, storage.clone()),
            notifier: Notifier::new(messenger, Arc::clone(&resolver)),
            resolver,
            storage,
        })
    }

    fn with_queue<R>(&self, f: impl FnOnce(&mut DownloadQueue) -> R) -> R {
        // Queue updates cannot be left half-applied, so a poisoned lock is still usable.
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut queue)
    }

    /// Resolve a link or search terms so the user can pick a format.
    pub async fn start_download(&self, reference: &MediaReference) -> Result<MediaSummary, DownloaderError> {
        let started = Instant::now();
        let result = self.resolver.resolve(reference).await;

        match &result {
            Ok(summary) => tracing::info!(
                media_id = %summary.canonical_id,
                audio_size_bytes = summary.audio_size_bytes,
                video_size_bytes = summary.video_size_bytes,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "resolved media"
            ),
            Err(e) => tracing::warn!(
                reference = reference.as_str(),
                code = %e.code(),
                category = %ErrorCategory::Validation,
                error = %e,
                "resolution failed"
            ),
        }
        result
    }

    /// Admit a format choice and put it in the queue.
    ///
    /// Returns as soon as the job is queued; the origin message is edited to
    /// say so (or to say why it was not).
    pub async fn confirm_format(
        self: &Arc<Self>,
        choice: FormatChoice,
        origin: MessageRef,
    ) -> Result<Enqueued, DownloaderError> {
        let job = match Job::admit(choice, origin) {
            Ok(job) => job,
            Err(e) => {
                tracing::info!(chat_id = origin.chat_id, code = %e.code(), error = %e, "format choice rejected");
                let text = match &e {
                    DownloaderError::Admission { .. } => messages::ADMISSION_REJECTED,
                    _ => messages::CHOICE_EXPIRED,
                };
                self.notifier.notify_origin(origin, text).await;
                return Err(e);
            }
        };

        let job_id = job.id;
        let kind = job.kind;
        let enqueued = self.with_queue(|queue| {
            let enqueued = queue.enqueue(job)?;
            if enqueued.start_worker {
                self.idle.send_replace(false);
            }
            Ok::<_, DownloaderError>(enqueued)
        });

        let enqueued = match enqueued {
            Ok(enqueued) => enqueued,
            Err(e) => {
                tracing::info!(chat_id = origin.chat_id, code = %e.code(), "duplicate choice ignored");
                self.notifier.notify_origin(origin, messages::ALREADY_QUEUED).await;
                return Err(e);
            }
        };

        tracing::info!(
            job_id = %job_id,
            chat_id = origin.chat_id,
            kind = %kind,
            position = enqueued.position,
            "job queued"
        );

        // Spawn before any await: a set worker flag must always have a worker behind it.
        if enqueued.start_worker {
            tokio::spawn(Arc::clone(self).drain());
        }

        self.notifier.notify_origin(origin, &messages::queued(enqueued.position)).await;

        Ok(enqueued)
    }

    pub fn status(&self) -> QueueStatus {
        self.with_queue(|queue| queue.status())
    }

    /// Resolves once no job is pending or running.
    pub async fn until_idle(&self) {
        let mut idle = self.idle.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = idle.wait_for(|idle| *idle).await;
    }

    /// Drop all jobs that have not started. Returns how many were dropped.
    pub fn shutdown(&self) -> usize {
        let dropped = self.with_queue(|queue| queue.drain_pending());
        for job in &dropped {
            tracing::info!(job_id = %job.id, chat_id = job.chat_id(), "dropping pending job on shutdown");
        }
        dropped.len()
    }

    /// Remove working directories left by a previous process.
    pub async fn sweep_stale(&self) -> Result<usize, DownloaderError> {
        self.storage.sweep_stale().await
    }

    async fn drain(self: Arc<Self>) {
        tracing::debug!("download worker started");
        loop {
            let next = self.with_queue(|queue| {
                let next = queue.next_to_start();
                if next.is_none() {
                    self.idle.send_replace(true);
                }
                next
            });
            let Some(job) = next else {
                break;
            };

            self.process_job(&job).await;
            self.with_queue(|queue| queue.complete(job.id));
        }
        tracing::debug!("download worker stopped, queue empty");
    }

    /// Run one job to a reported outcome. Never panics outward.
    async fn process_job(&self, job: &Job) {
        let started = Instant::now();
        tracing::info!(
            job_id = %job.id,
            chat_id = job.chat_id(),
            kind = %job.kind,
            media_id = %job.media_id,
            "job started"
        );

        let status = self.notifier.announce_start(job.chat_id()).await;

        // Held outside the unwind boundary so the directory outlives the report, even after a panic.
        let mut workdir = None;
        let outcome = match AssertUnwindSafe(self.run_job(job, &status, &mut workdir)).catch_unwind().await {
            Ok(label) => label,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(
                    job_id = %job.id,
                    category = %ErrorCategory::Unknown,
                    panic = %message,
                    "job panicked"
                );
                self.notifier.deliver_result(&status, job, Outcome::unexpected(message)).await;
                "panicked"
            }
        };

        if let Some(dir) = workdir
            && let Err(e) = self.storage.release(dir).await
        {
            tracing::warn!(job_id = %job.id, category = %ErrorCategory::System, error = %e, "working directory cleanup failed");
        }

        tracing::info!(
            job_id = %job.id,
            outcome,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "job finished"
        );
    }

    /// Execute and report one job. The working directory is handed back
    /// through `workdir` for the caller to release.
    async fn run_job(&self, job: &Job, status: &StatusHandle, workdir: &mut Option<WorkingDir>) -> &'static str {
        let (tx, rx) = mpsc::unbounded_channel();
        let (execution, ()) = tokio::join!(
            self.executor.execute(job, tx),
            forward_progress(&self.notifier, status, rx)
        );
        let Execution { workdir: dir, outcome } = execution;
        *workdir = dir;

        match &outcome {
            Outcome::Succeeded(path) => tracing::debug!(job_id = %job.id, file = %path.display(), "download finished"),
            Outcome::DownloadFailed { detail } => tracing::warn!(
                job_id = %job.id,
                code = ?outcome.code(),
                category = %ErrorCategory::Download,
                detail = %detail,
                "download failed"
            ),
            Outcome::UnexpectedError { message } => tracing::error!(
                job_id = %job.id,
                category = %ErrorCategory::System,
                error = %message,
                "download errored"
            ),
            other => tracing::warn!(
                job_id = %job.id,
                code = ?other.code(),
                category = %ErrorCategory::Download,
                outcome = other.label(),
                "download did not produce a file"
            ),
        }

        let label = outcome.label();
        let delivery = self.notifier.deliver_result(status, job, outcome).await;
        tracing::debug!(job_id = %job.id, ?delivery, "result reported");

        label
    }
}

/// Turn progress percentages into debounced status edits.
///
/// An edit is sent only when the whole percent changed and at least
/// [`PROGRESS_EDIT_INTERVAL`] passed since the previous one.
async fn forward_progress(notifier: &Notifier, status: &StatusHandle, mut rx: mpsc::UnboundedReceiver<f64>) {
    let mut last_percent: Option<u8> = None;
    let mut last_edit: Option<Instant> = None;

    while let Some(percent) = rx.recv().await {
        let percent = percent.clamp(0.0, 100.0).floor() as u8;
        if last_percent == Some(percent) || last_edit.is_some_and(|at| at.elapsed() < PROGRESS_EDIT_INTERVAL) {
            continue;
        }
        notifier.announce_progress(status, &messages::downloading(percent)).await;
        last_percent = Some(percent);
        last_edit = Some(Instant::now());
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "job panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_extracts_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(payload.as_ref()), "owned boom");

        let payload: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(payload.as_ref()), "job panicked");
    }
}
