//! Process configuration loaded from the environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::DownloaderError;

pub const ENV_TOKEN: &str = "YT_TOKEN_BOT";
pub const ENV_DOWNLOAD_DIR: &str = "TUBEQUEUE_DOWNLOAD_DIR";
pub const ENV_YTDLP: &str = "TUBEQUEUE_YTDLP";
pub const ENV_COOKIES: &str = "TUBEQUEUE_COOKIES";
pub const ENV_DOWNLOAD_TIMEOUT: &str = "TUBEQUEUE_DOWNLOAD_TIMEOUT_SECS";
pub const ENV_RESOLVE_TIMEOUT: &str = "TUBEQUEUE_RESOLVE_TIMEOUT_SECS";
pub const ENV_LOG_LEVEL: &str = "TUBEQUEUE_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "TUBEQUEUE_LOG_FORMAT";
pub const ENV_LOG_DIR: &str = "TUBEQUEUE_LOG_DIR";

const DEFAULT_DOWNLOAD_DIR: &str = "downloads";
const DEFAULT_YTDLP: &str = "yt-dlp";
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 900;
const DEFAULT_RESOLVE_TIMEOUT_SECS: u64 = 120;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_DIR: &str = "logs";

/// An external tool invocation: program plus leading arguments.
///
/// Parsed from a whitespace-separated command line so `python3 -m yt_dlp`
/// works as well as a plain `yt-dlp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn parse(line: &str) -> Result<Self, DownloaderError> {
        let mut parts = line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| DownloaderError::invalid_config(format!("{ENV_YTDLP} cannot be empty")))?;
        Ok(Self::with_args(program, parts))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = DownloaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(DownloaderError::invalid_config(format!("Invalid {ENV_LOG_FORMAT}: {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Chat platform token. Only the bot front-end needs it.
    pub bot_token: Option<String>,
    pub download_dir: PathBuf,
    pub ytdlp: ToolCommand,
    pub cookies_file: Option<PathBuf>,
    pub download_timeout: Duration,
    pub resolve_timeout: Duration,
    pub log_level: String,
    pub log_format: LogFormat,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: None,
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            ytdlp: ToolCommand::new(DEFAULT_YTDLP),
            cookies_file: None,
            download_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
            resolve_timeout: Duration::from_secs(DEFAULT_RESOLVE_TIMEOUT_SECS),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: LogFormat::Pretty,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, DownloaderError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DownloaderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let ytdlp = match get(ENV_YTDLP) {
            Some(line) => ToolCommand::parse(&line)?,
            None => defaults.ytdlp,
        };

        Ok(Self {
            bot_token: get(ENV_TOKEN),
            download_dir: get(ENV_DOWNLOAD_DIR).map(PathBuf::from).unwrap_or(defaults.download_dir),
            ytdlp,
            cookies_file: get(ENV_COOKIES).map(PathBuf::from),
            download_timeout: parse_timeout(ENV_DOWNLOAD_TIMEOUT, get(ENV_DOWNLOAD_TIMEOUT))?
                .unwrap_or(defaults.download_timeout),
            resolve_timeout: parse_timeout(ENV_RESOLVE_TIMEOUT, get(ENV_RESOLVE_TIMEOUT))?
                .unwrap_or(defaults.resolve_timeout),
            log_level: get(ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
            log_format: get(ENV_LOG_FORMAT).map(|v| v.parse()).transpose()?.unwrap_or_default(),
            log_dir: get(ENV_LOG_DIR).map(PathBuf::from).unwrap_or(defaults.log_dir),
        })
    }

    /// The bot token, required by the chat front-end.
    pub fn require_token(&self) -> Result<&str, DownloaderError> {
        self.bot_token
            .as_deref()
            .ok_or_else(|| DownloaderError::invalid_config(format!("{ENV_TOKEN} must be set")))
    }
}

fn parse_timeout(key: &str, value: Option<String>) -> Result<Option<Duration>, DownloaderError> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Some(Duration::from_secs(secs))),
        _ => Err(DownloaderError::invalid_config(format!("Invalid {key}: {value} (expected seconds > 0)"))),
    }
}
