//! Per-job working directories.
//!
//! A [`WorkingDir`] is removed by [`Storage::release`] once the job's result
//! has been reported. If it is dropped without being released (a panic, an
//! early return) the directory is removed synchronously in `Drop`.

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::DownloaderError;
use crate::logging::ErrorCategory;

/// Attempts before giving up on finding an unused directory name.
const MAX_ALLOCATE_ATTEMPTS: usize = 4;

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh directory under the root, named by a new random token.
    pub async fn allocate(&self) -> Result<WorkingDir, DownloaderError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| DownloaderError::io(format!("creating download root {}", self.root.display()), e))?;

        for _ in 0..MAX_ALLOCATE_ATTEMPTS {
            let token = Uuid::new_v4().simple().to_string();
            let path = self.root.join(&token);
            // create_dir (not create_dir_all) so an existing name is an error, never shared.
            match tokio::fs::create_dir(&path).await {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "allocated working directory");
                    return Ok(WorkingDir { path, released: false });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(DownloaderError::io(format!("creating working directory {}", path.display()), e));
                }
            }
        }

        Err(DownloaderError::internal("could not find an unused working directory name"))
    }

    /// Recursively remove a working directory. Already-missing paths are fine.
    pub async fn release(&self, mut dir: WorkingDir) -> Result<(), DownloaderError> {
        dir.released = true;
        remove_tree(&dir.path)
            .await
            .map_err(|e| DownloaderError::io(format!("removing working directory {}", dir.path.display()), e))
    }

    /// Remove working directories left behind by a previous run.
    ///
    /// Returns how many were removed. Jobs never survive a restart, so
    /// anything under the root at startup is stale.
    pub async fn sweep_stale(&self) -> Result<usize, DownloaderError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(DownloaderError::io(format!("reading {}", self.root.display()), e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DownloaderError::io(format!("reading {}", self.root.display()), e))?
        {
            let path = entry.path();
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            match remove_tree(&path).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(
                    category = %ErrorCategory::System,
                    path = %path.display(),
                    error = %e,
                    "failed to remove stale working directory"
                ),
            }
        }
        Ok(removed)
    }
}

async fn remove_tree(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Exclusively owned working directory of one job.
#[derive(Debug)]
pub struct WorkingDir {
    path: PathBuf,
    released: bool,
}

impl WorkingDir {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkingDir {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed unreleased working directory"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                category = %ErrorCategory::System,
                path = %self.path.display(),
                error = %e,
                "failed to remove unreleased working directory"
            ),
        }
    }
}
