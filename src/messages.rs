//! Centralized user-facing texts.
//!
//! Nothing here interpolates raw process output.

use crate::job::Outcome;

pub const START: &str = "🤖 Hi! I'm the YouTube download bot!\n\n\
    Use /ytdl followed by a YouTube URL or some text to search, and I'll walk you through \
    downloading the video or audio you want. 📥\n\n\
    Type /help for more information.";

pub const HELP: &str = "ℹ️ Available commands:\n\n\
    🔹 /start - Starts the bot and shows the welcome message.\n\
    🔹 /ytdl <URL or text> - Downloads a YouTube video or audio in the format you choose.\n\n\
    After you pick a format the download joins the queue. You'll be notified when the file is ready!";

pub const YTDL_USAGE: &str = "Please send a YouTube URL or a text query after the /ytdl command.";

pub const RESOLUTION_FAILED: &str = "I couldn't find that media. Please try another link or search.";

pub const BUTTON_VIDEO: &str = "Video (MP4) 📹";
pub const BUTTON_AUDIO: &str = "Audio (MP3) 🎵";

pub const CHOICE_EXPIRED: &str = "This choice is no longer valid. Please send /ytdl again.";
pub const ALREADY_QUEUED: &str = "This download is already in the queue.";

/// Shown instead of queueing when the size estimate is over the admission threshold.
pub const ADMISSION_REJECTED: &str = "I can't download this file.";

pub const STARTING: &str = "Starting download…";
pub const UPLOADING: &str = "Download finished! Sending file...";

pub const ERR_TOO_LARGE: &str = "The content exceeds 50MB.";
pub const ERR_NOT_FOUND: &str = "File not found.";
pub const ERR_DOWNLOAD_FAILED: &str = "Error while downloading the content.";
pub const ERR_TIMED_OUT: &str = "The download took too long and was stopped.";
pub const ERR_UNEXPECTED: &str = "Unexpected error.";
pub const ERR_DELIVERY: &str = "Error while trying to download!";

pub fn choose_format(title: &str) -> String {
    format!("Choose the format for {title}:")
}

pub fn queued(position: usize) -> String {
    if position > 1 {
        format!("Download added to the queue (position {position}). Please wait...")
    } else {
        "Download added to the queue. Please wait...".to_string()
    }
}

pub fn downloading(percent: u8) -> String {
    format!("Downloading… {percent}%")
}

/// Failure text for a terminal outcome; `None` for success.
pub fn failure_text(outcome: &Outcome) -> Option<&'static str> {
    match outcome {
        Outcome::Succeeded(_) => None,
        Outcome::TooLarge => Some(ERR_TOO_LARGE),
        Outcome::NotFound => Some(ERR_NOT_FOUND),
        Outcome::DownloadFailed { .. } => Some(ERR_DOWNLOAD_FAILED),
        Outcome::TimedOut => Some(ERR_TIMED_OUT),
        Outcome::UnexpectedError { .. } => Some(ERR_UNEXPECTED),
    }
}
