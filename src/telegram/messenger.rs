use std::path::Path;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId};
use teloxide::{ApiError, RequestError};

use crate::error::DownloaderError;
use crate::job::MessageRef;
use crate::notifier::{AudioMetadata, Messenger};

const THUMBNAIL_FILE_NAME: &str = "thumbnail.png";

/// [`Messenger`] backed by the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn is_message_not_modified(err: &RequestError) -> bool {
    matches!(err, RequestError::Api(ApiError::MessageNotModified))
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<MessageRef, DownloaderError> {
        let message = self.bot.send_message(ChatId(chat_id), text).await?;
        Ok(MessageRef {
            chat_id,
            message_id: message.id.0,
        })
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), DownloaderError> {
        match self
            .bot
            .edit_message_text(ChatId(message.chat_id), MessageId(message.message_id), text)
            .await
        {
            Ok(_) => Ok(()),
            // Same text again, e.g. an unchanged progress percentage.
            Err(e) if is_message_not_modified(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, message: MessageRef) -> Result<(), DownloaderError> {
        self.bot
            .delete_message(ChatId(message.chat_id), MessageId(message.message_id))
            .await?;
        Ok(())
    }

    async fn send_video(&self, chat_id: i64, file: &Path) -> Result<(), DownloaderError> {
        self.bot
            .send_video(ChatId(chat_id), InputFile::file(file.to_path_buf()))
            .supports_streaming(true)
            .await?;
        Ok(())
    }

    async fn send_audio(&self, chat_id: i64, file: &Path, metadata: AudioMetadata) -> Result<(), DownloaderError> {
        let mut request = self
            .bot
            .send_audio(ChatId(chat_id), InputFile::file(file.to_path_buf()))
            .title(metadata.title);

        if let Some(performer) = metadata.performer {
            request = request.performer(performer);
        }
        if let Some(bytes) = metadata.thumbnail {
            request = request.thumbnail(InputFile::memory(bytes).file_name(THUMBNAIL_FILE_NAME));
        }

        request.await?;
        Ok(())
    }
}
