//! Download subprocess management.
//!
//! Spawns yt-dlp for one job inside a fresh working directory, streams its
//! output for progress, and classifies the exit into an [`Outcome`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedSender;

use crate::config::{Config, ToolCommand};
use crate::job::{Job, Outcome};
use crate::logging::{append_yt_dlp_log, ErrorCategory};
use crate::storage::{Storage, WorkingDir};

use super::progress::{parse_progress_percent, should_log_stderr};
use super::settings::{build_download_args, MAX_FILESIZE_MARKER};
use super::ytdlp::{command, tail};

const DESTINATION_PREFIX: &str = "Destination: ";

/// Stderr lines kept as failure detail.
const DETAIL_LINES: usize = 20;

/// What running a job produced.
///
/// The working directory comes back with the outcome so the file it holds
/// outlives delivery; the caller releases it afterwards.
#[derive(Debug)]
pub struct Execution {
    pub workdir: Option<WorkingDir>,
    pub outcome: Outcome,
}

#[derive(Debug, Clone)]
pub struct DownloadExecutor {
    tool: ToolCommand,
    cookies: Option<PathBuf>,
    timeout: Duration,
    storage: Storage,
}

impl DownloadExecutor {
    pub fn new(tool: ToolCommand, cookies: Option<PathBuf>, timeout: Duration, storage: Storage) -> Self {
        Self {
            tool,
            cookies,
            timeout,
            storage,
        }
    }

    pub fn from_config(config: &Config, storage: Storage) -> Self {
        Self::new(config.ytdlp.clone(), config.cookies_file.clone(), config.download_timeout, storage)
    }

    /// Execute a download (called by the queue worker).
    ///
    /// Progress percentages are sent on `progress` as they are parsed; the
    /// channel closes when this returns.
    pub async fn execute(&self, job: &Job, progress: UnboundedSender<f64>) -> Execution {
        let workdir = match self.storage.allocate().await {
            Ok(dir) => dir,
            Err(e) => {
                tracing::error!(job_id = %job.id, category = %ErrorCategory::System, error = %e, "no working directory");
                return Execution {
                    workdir: None,
                    outcome: Outcome::unexpected(e.to_string()),
                };
            }
        };

        let outcome = self.run(job, workdir.path(), progress).await;
        Execution {
            workdir: Some(workdir),
            outcome,
        }
    }

    async fn run(&self, job: &Job, dir: &Path, progress: UnboundedSender<f64>) -> Outcome {
        let job_id = job.id.to_string();

        let mut cmd = command(&self.tool);
        cmd.args(build_download_args(job, dir, self.cookies.as_deref()));

        tracing::debug!(job_id = %job_id, dir = %dir.display(), "spawning yt-dlp");

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return Outcome::unexpected(format!("spawn yt-dlp failed: {e}")),
        };

        let Some(stdout) = child.stdout.take() else {
            return Outcome::unexpected("yt-dlp stdout unavailable");
        };
        let Some(stderr) = child.stderr.take() else {
            return Outcome::unexpected("yt-dlp stderr unavailable");
        };

        let read_stdout = async {
            let mut reader = BufReader::new(stdout).lines();
            let mut kept = Vec::new();
            while let Some(line) = reader.next_line().await? {
                match parse_progress_percent(&line) {
                    // A closed receiver just means nobody is listening any more.
                    Some(percent) => {
                        let _ = progress.send(percent);
                    }
                    None => kept.push(line),
                }
            }
            Ok::<_, std::io::Error>(kept)
        };

        let read_stderr = async {
            let mut reader = BufReader::new(stderr).lines();
            let mut text = String::new();
            while let Some(line) = reader.next_line().await? {
                if should_log_stderr(&line) {
                    append_yt_dlp_log(&job_id, &line);
                }
                text.push_str(&line);
                text.push('\n');
            }
            Ok::<_, std::io::Error>(text)
        };

        let collect = async {
            let (stdout_lines, stderr_text) = tokio::try_join!(read_stdout, read_stderr)?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, stdout_lines, stderr_text))
        };

        match tokio::time::timeout(self.timeout, collect).await {
            Ok(Ok((status, stdout_lines, stderr_text))) => {
                tracing::debug!(job_id = %job_id, code = ?status.code(), "yt-dlp exited");
                classify(status.success(), &stdout_lines, &stderr_text)
            }
            Ok(Err(e)) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                Outcome::unexpected(format!("reading yt-dlp output failed: {e}"))
            }
            Err(_) => {
                tracing::warn!(
                    job_id = %job_id,
                    category = %ErrorCategory::Download,
                    timeout_secs = self.timeout.as_secs(),
                    "yt-dlp timed out, killing it"
                );
                let _ = child.start_kill();
                let _ = child.wait().await;
                Outcome::TimedOut
            }
        }
    }
}

/// Output file announced by yt-dlp. The last announcement wins, since
/// post-processing (extraction, remuxing) announces the final file last.
pub fn find_destination(stdout_lines: &[String]) -> Option<PathBuf> {
    stdout_lines.iter().rev().find_map(|line| {
        let idx = line.find(DESTINATION_PREFIX)?;
        let path = line[idx + DESTINATION_PREFIX.len()..].trim();
        (!path.is_empty()).then(|| PathBuf::from(path))
    })
}

/// Map a finished yt-dlp run to an outcome.
pub fn classify(success: bool, stdout_lines: &[String], stderr: &str) -> Outcome {
    let too_large = stderr.contains(MAX_FILESIZE_MARKER) || stdout_lines.iter().any(|l| l.contains(MAX_FILESIZE_MARKER));

    if success {
        if let Some(path) = find_destination(stdout_lines) {
            return Outcome::Succeeded(path);
        }
        return if too_large { Outcome::TooLarge } else { Outcome::NotFound };
    }

    if too_large {
        return Outcome::TooLarge;
    }

    let detail = tail(stderr, DETAIL_LINES);
    Outcome::DownloadFailed {
        detail: if detail.is_empty() {
            "yt-dlp exited with an error and no output".to_string()
        } else {
            detail
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn success_with_destination() {
        let out = lines(&["[youtube] abc: Downloading webpage", "[download] Destination: /w/x/Song.mp4"]);
        assert_eq!(classify(true, &out, ""), Outcome::Succeeded(PathBuf::from("/w/x/Song.mp4")));
    }

    #[test]
    fn last_destination_wins() {
        let out = lines(&[
            "[download] Destination: /w/x/Song.webm",
            "[ExtractAudio] Destination: /w/x/Song.mp3",
        ]);
        assert_eq!(find_destination(&out), Some(PathBuf::from("/w/x/Song.mp3")));
    }

    #[test]
    fn success_without_destination_is_not_found() {
        assert_eq!(classify(true, &lines(&["[youtube] abc: Downloading webpage"]), ""), Outcome::NotFound);
    }

    #[test]
    fn size_marker_means_too_large_on_any_exit() {
        let stderr = "ERROR: File is larger than max-filesize (60000000 bytes > 52428800 bytes). Aborting.";
        assert_eq!(classify(false, &[], stderr), Outcome::TooLarge);

        let out = lines(&["[download] File is larger than max-filesize (60000000 bytes > 52428800 bytes). Aborting."]);
        assert_eq!(classify(true, &out, ""), Outcome::TooLarge);
    }

    #[test]
    fn other_failures_keep_stderr_tail_as_detail() {
        let outcome = classify(false, &[], "WARNING: x\nERROR: Video unavailable\n");
        assert_eq!(
            outcome,
            Outcome::DownloadFailed {
                detail: "WARNING: x\nERROR: Video unavailable".into()
            }
        );

        assert!(matches!(classify(false, &[], ""), Outcome::DownloadFailed { detail } if !detail.is_empty()));
    }

    #[cfg(unix)]
    mod process {
        use super::super::*;
        use crate::job::{FormatChoice, FormatKind, MessageRef};
        use tokio::sync::mpsc;

        fn job() -> Job {
            Job::admit(FormatChoice::new(FormatKind::Video, "abc", 1), MessageRef { chat_id: 1, message_id: 1 }).unwrap()
        }

        fn executor(script: &str, timeout: Duration, root: &Path) -> DownloadExecutor {
            DownloadExecutor::new(
                ToolCommand::with_args("sh", ["-c", script, "yt-dlp"]),
                None,
                timeout,
                Storage::new(root),
            )
        }

        #[tokio::test]
        async fn forwards_progress_and_reports_destination() {
            let root = tempfile::tempdir().unwrap();
            let exec = executor(
                "echo 'tubequeue-  10.0%'; echo 'tubequeue- 55.5%'; echo '[download] Destination: /tmp/out.mp4'",
                Duration::from_secs(5),
                root.path(),
            );
            let (tx, mut rx) = mpsc::unbounded_channel();

            let execution = exec.execute(&job(), tx).await;
            assert_eq!(execution.outcome, Outcome::Succeeded(PathBuf::from("/tmp/out.mp4")));

            let workdir = execution.workdir.expect("working dir is handed back");
            assert!(workdir.path().starts_with(root.path()));
            assert!(workdir.path().is_dir());

            assert_eq!(rx.recv().await, Some(10.0));
            assert_eq!(rx.recv().await, Some(55.5));
            assert_eq!(rx.recv().await, None);
        }

        #[tokio::test]
        async fn hung_process_times_out() {
            let root = tempfile::tempdir().unwrap();
            let exec = executor("sleep 5", Duration::from_millis(200), root.path());
            let (tx, _rx) = mpsc::unbounded_channel();

            let execution = exec.execute(&job(), tx).await;
            assert_eq!(execution.outcome, Outcome::TimedOut);
        }

        #[tokio::test]
        async fn unspawnable_tool_is_unexpected_error() {
            let root = tempfile::tempdir().unwrap();
            let exec = DownloadExecutor::new(
                ToolCommand::new("definitely-not-a-real-yt-dlp-binary"),
                None,
                Duration::from_secs(1),
                Storage::new(root.path()),
            );
            let (tx, _rx) = mpsc::unbounded_channel();

            let execution = exec.execute(&job(), tx).await;
            assert!(matches!(execution.outcome, Outcome::UnexpectedError { .. }));
        }
    }
}
