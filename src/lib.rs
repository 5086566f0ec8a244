//! Tubequeue: a chat bot that downloads web media through a single-worker queue.

pub mod config;
pub mod download_queue;
pub mod downloader;
pub mod error;
pub mod job;
pub mod logging;
pub mod messages;
pub mod notifier;
pub mod storage;
pub mod telegram;
pub mod thumbnail;

pub use config::Config;
pub use downloader::{DownloadService, MediaReference, MediaSummary};
pub use error::{DownloaderError, ErrorCode};
pub use notifier::{AudioMetadata, Messenger};

/// Load configuration, install logging, and run the bot until Ctrl-C.
pub async fn run() -> Result<(), DownloaderError> {
    let config = Config::from_env()?;
    logging::init(&config);
    telegram::run(config).await
}
