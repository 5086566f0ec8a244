//! Telegram front-end.
//!
//! Parses commands and button presses into `DownloadService` calls. Every
//! message the worker sends afterwards goes through [`TelegramMessenger`].

pub mod commands;
mod messenger;
pub mod payload;

pub use messenger::TelegramMessenger;

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::config::Config;
use crate::downloader::DownloadService;
use crate::error::DownloaderError;
use crate::job::MessageRef;
use crate::logging::ErrorCategory;
use crate::messages;

use commands::{Command, classify_reference, format_prompt};

type HandlerResult = Result<(), DownloaderError>;

/// Run the bot until Ctrl-C.
pub async fn run(config: Config) -> Result<(), DownloaderError> {
    let bot = Bot::new(config.require_token()?);
    let service = DownloadService::new(&config, Arc::new(TelegramMessenger::new(bot.clone())));

    match service.sweep_stale().await {
        Ok(0) => {}
        Ok(removed) => tracing::info!(removed, "removed stale working directories"),
        Err(e) => tracing::warn!(category = %ErrorCategory::System, error = %e, "stale directory sweep failed"),
    }

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        tracing::warn!(category = %ErrorCategory::Network, error = %e, "failed to register bot commands");
    }

    let handler = dptree::entry()
        .branch(Update::filter_message().filter_command::<Command>().endpoint(handle_command))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    tracing::info!(download_dir = %config.download_dir.display(), "bot started");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![Arc::clone(&service)])
        .default_handler(|_| async {})
        .error_handler(LoggingErrorHandler::with_custom_text("update handler failed"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    let status = service.status();
    let dropped = service.shutdown();
    tracing::info!(dropped, interrupted = status.active.is_some(), "bot stopped");
    Ok(())
}

async fn handle_command(bot: Bot, msg: Message, cmd: Command, service: Arc<DownloadService>) -> HandlerResult {
    let chat_id = msg.chat.id;

    match cmd {
        Command::Start => {
            bot.send_message(chat_id, messages::START).await?;
        }
        Command::Help => {
            bot.send_message(chat_id, messages::HELP).await?;
        }
        Command::Ytdl(arg) => {
            let Some(reference) = classify_reference(&arg) else {
                bot.send_message(chat_id, messages::YTDL_USAGE).await?;
                return Ok(());
            };

            let (text, keyboard) = match service.start_download(&reference).await {
                Ok(summary) => format_prompt(&summary),
                Err(_) => (messages::RESOLUTION_FAILED.to_string(), None),
            };

            let mut request = bot.send_message(chat_id, text);
            if let Some(keyboard) = keyboard {
                request = request.reply_markup(keyboard);
            }
            request.await?;
        }
    }
    Ok(())
}

async fn handle_callback(bot: Bot, q: CallbackQuery, service: Arc<DownloadService>) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(message) = q.regular_message() else {
        return Ok(());
    };
    let origin = MessageRef {
        chat_id: message.chat.id.0,
        message_id: message.id.0,
    };

    let choice = match q.data.as_deref().map(payload::decode) {
        Some(Ok(choice)) => choice,
        Some(Err(e)) => {
            tracing::debug!(chat_id = origin.chat_id, error = %e, "ignoring malformed button payload");
            bot.edit_message_text(message.chat.id, message.id, messages::CHOICE_EXPIRED).await?;
            return Ok(());
        }
        None => return Ok(()),
    };

    // Rejections are already shown to the user by the service.
    if let Err(e) = service.confirm_format(choice, origin).await {
        tracing::debug!(chat_id = origin.chat_id, code = %e.code(), "format choice not queued");
    }
    Ok(())
}
