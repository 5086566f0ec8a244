//! yt-dlp subprocess interaction utilities.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::config::ToolCommand;

/// Captured result of a finished process.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Build a non-interactive command for the configured tool.
///
/// Output is piped, stdin is closed, and the child is killed if the handle
/// is dropped (which is how timeouts terminate it).
pub fn command(tool: &ToolCommand) -> Command {
    let mut cmd = Command::new(&tool.program);
    cmd.args(&tool.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // On Windows, prevent window creation
    #[cfg(windows)]
    cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW

    cmd
}

/// Run a command to completion and capture stdout/stderr.
///
/// A non-zero exit is not an error here: yt-dlp can print usable JSON and
/// still exit non-zero, so callers inspect `status` themselves. Exceeding
/// `timeout` kills the child and returns `ErrorKind::TimedOut`.
pub async fn run_yt_dlp(cmd: &mut Command, timeout: Duration) -> io::Result<ProcessOutput> {
    let mut child = cmd.spawn()?;

    let mut stdout = child.stdout.take().ok_or_else(|| io::Error::other("Could not capture stdout"))?;
    let mut stderr = child.stderr.take().ok_or_else(|| io::Error::other("Could not capture stderr"))?;

    let collect = async {
        let mut output = String::new();
        let mut errors = String::new();

        // Read stdout and stderr concurrently
        let (out_res, err_res) = tokio::join!(stdout.read_to_string(&mut output), stderr.read_to_string(&mut errors));
        out_res?;
        err_res?;

        let status = child.wait().await?;
        Ok::<_, io::Error>(ProcessOutput {
            status,
            stdout: output,
            stderr: errors,
        })
    };

    match tokio::time::timeout(timeout, collect).await {
        Ok(result) => result,
        Err(_) => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("process did not finish within {}s", timeout.as_secs()),
            ))
        }
    }
}

/// The last `lines` lines of some process output, for log context.
pub fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        command(&ToolCommand::with_args("sh", ["-c", script]))
    }

    #[tokio::test]
    async fn returns_output_on_non_zero_exit() {
        let mut cmd = sh("echo ok && echo warn 1>&2 && exit 3");

        let output = run_yt_dlp(&mut cmd, Duration::from_secs(10))
            .await
            .expect("should not fail when command exits non-zero but produces output");

        assert!(output.stdout.contains("ok"));
        assert!(output.stderr.contains("warn"));
        assert_eq!(output.status.code(), Some(3));
    }

    #[tokio::test]
    async fn kills_process_after_timeout() {
        let mut cmd = sh("sleep 5");

        let err = run_yt_dlp(&mut cmd, Duration::from_millis(200)).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn missing_program_is_an_io_error() {
        let mut cmd = command(&ToolCommand::new("definitely-not-a-real-yt-dlp-binary"));
        let err = run_yt_dlp(&mut cmd, Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn tail_keeps_last_non_empty_lines() {
        assert_eq!(tail("a\n\nb\nc\n", 2), "b\nc");
        assert_eq!(tail("", 3), "");
    }
}
