//! Download Queue
//!
//! Insertion-ordered FIFO of admitted jobs with single-flight bookkeeping:
//! at most one job is active, and exactly one caller is told to start the
//! worker when the queue goes from idle to busy.
//!
//! The queue itself is not synchronized; the download service keeps it
//! behind a mutex and never holds that lock across an await.

use std::collections::VecDeque;

use crate::error::DownloaderError;
use crate::job::{FormatKind, Job, JobId, MessageRef};

/// Result of a successful enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enqueued {
    /// 1-based position counting the active job, if any.
    pub position: usize,
    /// True for exactly the caller that must start the worker loop.
    pub start_worker: bool,
}

/// Download Queue
#[derive(Debug, Default)]
pub struct DownloadQueue {
    /// Jobs waiting to run, in arrival order
    pending: VecDeque<Job>,

    /// The job currently executing
    active: Option<Job>,

    /// Set by the enqueue that arms the worker, cleared when it finds the queue empty
    worker_running: bool,

    /// Jobs that reached a terminal state
    completed: u64,
}

impl DownloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job to the tail of the queue.
    ///
    /// A job with the same origin message and format that is still pending or
    /// active is rejected as a duplicate.
    pub fn enqueue(&mut self, job: Job) -> Result<Enqueued, DownloaderError> {
        if self.contains(job.origin, job.kind) {
            return Err(DownloaderError::queue_duplicate(format!(
                "{} download for message {} in chat {} already queued",
                job.kind, job.origin.message_id, job.origin.chat_id
            )));
        }

        self.pending.push_back(job);
        let position = self.pending.len() + usize::from(self.active.is_some());

        let start_worker = !self.worker_running;
        self.worker_running = true;

        Ok(Enqueued { position, start_worker })
    }

    /// Pop the next job for the worker.
    ///
    /// Returns `None` once the queue is drained, at which point the worker is
    /// considered stopped and the next enqueue re-arms it.
    pub fn next_to_start(&mut self) -> Option<Job> {
        debug_assert!(self.active.is_none(), "previous job must complete first");
        match self.pending.pop_front() {
            Some(job) => {
                self.active = Some(job.clone());
                Some(job)
            }
            None => {
                self.worker_running = false;
                None
            }
        }
    }

    /// Mark the active job as terminal.
    pub fn complete(&mut self, id: JobId) {
        if self.active.as_ref().is_some_and(|job| job.id == id) {
            self.active = None;
            self.completed += 1;
        }
    }

    fn contains(&self, origin: MessageRef, kind: FormatKind) -> bool {
        self.active
            .iter()
            .chain(self.pending.iter())
            .any(|job| job.origin == origin && job.kind == kind)
    }

    /// Get current queue size
    pub fn queue_size(&self) -> usize {
        self.pending.len()
    }

    pub fn is_idle(&self) -> bool {
        !self.worker_running && self.pending.is_empty() && self.active.is_none()
    }

    /// Drop all pending jobs (shutdown). The active job is left alone.
    pub fn drain_pending(&mut self) -> Vec<Job> {
        self.pending.drain(..).collect()
    }

    /// Get queue status summary
    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            queued: self.pending.len(),
            active: self.active.as_ref().map(|job| job.id),
            worker_running: self.worker_running,
            completed: self.completed,
        }
    }
}

/// Queue status for reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStatus {
    pub queued: usize,
    pub active: Option<JobId>,
    pub worker_running: bool,
    pub completed: u64,
}
