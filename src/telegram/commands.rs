//! Bot commands and reference classification.

use once_cell::sync::Lazy;
use regex::Regex;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::command::BotCommands;

use crate::downloader::{MediaReference, MediaSummary};
use crate::error::DownloaderError;
use crate::job::{FormatChoice, FormatKind};
use crate::messages;

use super::payload;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "start the bot and show the welcome message.")]
    Start,
    #[command(description = "show this help text.")]
    Help,
    #[command(description = "download a YouTube video or audio: /ytdl <URL or text>.")]
    Ytdl(String),
}

static MEDIA_URL: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| {
    Regex::new(r"^https?://(?:www\.|m\.)?(?:music\.)?youtu(?:be\.com/(?:watch\?v=|shorts/)|\.be/)[\w-]*(?:&(?:amp;)?[\w?=]*)?")
});

/// Classify a `/ytdl` argument. `None` for a blank argument.
///
/// A recognized media link becomes a URL reference (just the matched part,
/// trailing text is dropped); anything else is searched for.
pub fn classify_reference(text: &str) -> Option<MediaReference> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let matched = (*MEDIA_URL)
        .as_ref()
        .ok()
        .and_then(|re| re.find(text))
        .map(|m| m.as_str().to_string());

    Some(match matched {
        Some(url) => MediaReference::Url(url),
        None => MediaReference::Search(text.to_string()),
    })
}

/// The two format buttons for a resolved media item.
pub fn format_keyboard(summary: &MediaSummary) -> Result<InlineKeyboardMarkup, DownloaderError> {
    let video = FormatChoice::new(FormatKind::Video, &summary.canonical_id, summary.video_size_bytes);
    let audio = FormatChoice::new(FormatKind::Audio, &summary.canonical_id, summary.audio_size_bytes);

    Ok(InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(messages::BUTTON_VIDEO, payload::encode(&video)?),
        InlineKeyboardButton::callback(messages::BUTTON_AUDIO, payload::encode(&audio)?),
    ]]))
}

/// Reply text and buttons for a resolved media item.
///
/// Falls back to the plain resolution failure text when the buttons cannot
/// carry this item, e.g. an id too long for callback data.
pub fn format_prompt(summary: &MediaSummary) -> (String, Option<InlineKeyboardMarkup>) {
    match format_keyboard(summary) {
        Ok(keyboard) => (messages::choose_format(&summary.title), Some(keyboard)),
        Err(e) => {
            tracing::warn!(media_id = %summary.canonical_id, code = %e.code(), error = %e, "format buttons unavailable");
            (messages::RESOLUTION_FAILED.to_string(), None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn recognizes_media_links() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "http://youtube.com/watch?v=dQw4w9WgXcQ",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://music.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/abc_DEF-123",
        ] {
            assert_eq!(classify_reference(url), Some(MediaReference::Url(url.into())), "{url}");
        }
    }

    #[test]
    fn keeps_only_the_matched_link() {
        assert_eq!(
            classify_reference("  https://youtu.be/dQw4w9WgXcQ please  "),
            Some(MediaReference::Url("https://youtu.be/dQw4w9WgXcQ".into()))
        );
        assert_eq!(
            classify_reference("https://www.youtube.com/watch?v=abc&t=42"),
            Some(MediaReference::Url("https://www.youtube.com/watch?v=abc&t=42".into()))
        );
    }

    #[test]
    fn anything_else_is_a_search() {
        assert_eq!(
            classify_reference("never gonna give you up"),
            Some(MediaReference::Search("never gonna give you up".into()))
        );
        assert_eq!(
            classify_reference("https://vimeo.com/123"),
            Some(MediaReference::Search("https://vimeo.com/123".into()))
        );
        assert_eq!(classify_reference("   "), None);
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("/start", "bot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/ytdl some song", "bot").unwrap(), Command::Ytdl("some song".into()));
    }

    fn summary(id: &str) -> MediaSummary {
        MediaSummary {
            canonical_id: id.into(),
            title: "T".into(),
            thumbnail: None,
            performer: None,
            audio_size_bytes: 3,
            video_size_bytes: 9,
        }
    }

    #[test]
    fn keyboard_carries_both_choices() {
        let summary = summary("abc");
        let keyboard = format_keyboard(&summary).unwrap();
        let row = &keyboard.inline_keyboard[0];
        assert_eq!(row.len(), 2);

        let InlineKeyboardButtonKind::CallbackData(data) = &row[0].kind else {
            panic!("expected callback button");
        };
        let choice = payload::decode(data).unwrap();
        assert_eq!(choice.kind, FormatKind::Video);
        assert_eq!(choice.estimated_size_bytes, 9);
    }

    #[test]
    fn prompt_offers_buttons() {
        let (text, keyboard) = format_prompt(&summary("abc"));
        assert_eq!(text, messages::choose_format("T"));
        assert!(keyboard.is_some());
    }

    #[test]
    fn oversized_id_gets_a_plain_failure_reply() {
        let (text, keyboard) = format_prompt(&summary(&"x".repeat(80)));
        assert_eq!(text, messages::RESOLUTION_FAILED);
        assert!(keyboard.is_none());
    }
}
