//! Telegram implementation of [`Messenger`]
//!
//! Files are uploaded once to the archive chat; users then receive the media
//! by `file_id`, which Telegram serves without another upload.

use crate::bot::resilient::{
    delete_message_resilient, edit_message_resilient, reply_to, send_message_resilient,
};
use crate::bot::views::download_more_keyboard;
use crate::downloader::{ArchivedMedia, CachedMedia, MediaKind, MessageRef, Messenger, RelayError};
use crate::utils::retry_telegram_operation;
use async_trait::async_trait;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{ChatId, FileId, InputFile, Message, MessageId, ParseMode};
use tracing::debug;

/// Sends through a teloxide [`Bot`], archiving into a fixed chat
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    archive_chat: ChatId,
}

impl TelegramMessenger {
    /// Create a messenger archiving into `archive_chat_id`
    #[must_use]
    pub const fn new(bot: Bot, archive_chat_id: i64) -> Self {
        Self {
            bot,
            archive_chat: ChatId(archive_chat_id),
        }
    }
}

fn api_error(e: &anyhow::Error) -> RelayError {
    RelayError::Api(e.to_string())
}

/// Pull the durable handle out of the archive message.
fn archived_from_message(message: &Message, kind: MediaKind) -> Result<ArchivedMedia, RelayError> {
    match kind {
        MediaKind::Video => {
            let video = message.video().ok_or(RelayError::MissingMedia("video"))?;
            Ok(ArchivedMedia {
                handle: video.file.id.to_string(),
                thumbnail: video.thumbnail.as_ref().map(|t| t.file.id.to_string()),
                duration: Some(video.duration.seconds()),
            })
        }
        MediaKind::Photo => {
            let photo = message
                .photo()
                .and_then(|sizes| sizes.last())
                .ok_or(RelayError::MissingMedia("photo"))?;
            Ok(ArchivedMedia {
                handle: photo.file.id.to_string(),
                thumbnail: None,
                duration: None,
            })
        }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_status(
        &self,
        chat_id: i64,
        reply_to_id: Option<i32>,
        text: &str,
    ) -> Result<MessageRef, RelayError> {
        let message = send_message_resilient(&self.bot, ChatId(chat_id), text, reply_to_id)
            .await
            .map_err(|e| api_error(&e))?;
        Ok(MessageRef::new(chat_id, message.id.0))
    }

    async fn edit_status(&self, status: MessageRef, text: &str) -> Result<(), RelayError> {
        edit_message_resilient(
            &self.bot,
            ChatId(status.chat_id),
            MessageId(status.message_id),
            text,
        )
        .await
        .map_err(|e| api_error(&e))
    }

    async fn delete_message(&self, message: MessageRef) -> Result<(), RelayError> {
        delete_message_resilient(
            &self.bot,
            ChatId(message.chat_id),
            MessageId(message.message_id),
        )
        .await
        .map_err(|e| api_error(&e))
    }

    async fn archive(&self, path: &Path, kind: MediaKind) -> Result<ArchivedMedia, RelayError> {
        let message = retry_telegram_operation(|| async {
            let file = InputFile::file(path.to_path_buf());
            let sent = match kind {
                MediaKind::Video => {
                    self.bot
                        .send_video(self.archive_chat, file)
                        .supports_streaming(true)
                        .await?
                }
                MediaKind::Photo => self.bot.send_photo(self.archive_chat, file).await?,
            };
            Ok(sent)
        })
        .await
        .map_err(|e| api_error(&e))?;

        let archived = archived_from_message(&message, kind)?;
        debug!(
            handle = %archived.handle,
            thumbnail = ?archived.thumbnail,
            duration = ?archived.duration,
            "Media archived"
        );
        Ok(archived)
    }

    async fn deliver(
        &self,
        chat_id: i64,
        reply_to_id: Option<i32>,
        media: &CachedMedia,
    ) -> Result<MessageRef, RelayError> {
        let chat = ChatId(chat_id);
        let message = retry_telegram_operation(|| async {
            let file = InputFile::file_id(FileId(media.handle.clone()));
            let sent = match media.kind {
                MediaKind::Video => {
                    let mut req = self
                        .bot
                        .send_video(chat, file)
                        .caption(media.caption.clone())
                        .parse_mode(ParseMode::Html)
                        .reply_markup(download_more_keyboard());
                    if let Some(secs) = media.duration {
                        req = req.duration(secs);
                    }
                    if let Some(id) = reply_to_id {
                        req = req.reply_parameters(reply_to(id));
                    }
                    req.await?
                }
                MediaKind::Photo => {
                    let mut req = self
                        .bot
                        .send_photo(chat, file)
                        .caption(media.caption.clone())
                        .parse_mode(ParseMode::Html)
                        .reply_markup(download_more_keyboard());
                    if let Some(id) = reply_to_id {
                        req = req.reply_parameters(reply_to(id));
                    }
                    req.await?
                }
            };
            Ok(sent)
        })
        .await
        .map_err(|e| api_error(&e))?;

        Ok(MessageRef::new(chat_id, message.id.0))
    }
}
