//! Resilient messaging utilities with automatic retry for Telegram API operations.
//!
//! These wrappers retry transient network failures using exponential backoff
//! with jitter. Errors that only mean "nothing to do" (the message is already
//! gone or unchanged) are treated as success and never retried.
//!
//! # Usage
//!
//! ```ignore
//! use media_relay_bot::bot::resilient::{send_message_resilient, edit_message_resilient};
//!
//! let msg = send_message_resilient(&bot, chat_id, "🔎 Processing link...", None).await?;
//! edit_message_resilient(&bot, chat_id, msg.id, "📥 Downloading...").await?;
//! ```

use anyhow::{anyhow, Result};
use teloxide::prelude::*;
use teloxide::types::{ChatId, Message, MessageId, ParseMode, ReplyParameters};
use tracing::debug;

/// Telegram rejects longer message texts (4096); keep a margin
const MAX_TEXT_CHARS: usize = 4000;

const ERROR_NOT_MODIFIED: &str = "message is not modified";
const ERROR_EDIT_NOT_FOUND: &str = "message to edit not found";
const ERROR_DELETE_NOT_FOUND: &str = "message to delete not found";
const ERROR_CANT_DELETE: &str = "message can't be deleted";

/// Whether a Telegram error only says the operation has nothing left to do.
///
/// # Examples
///
/// ```
/// use media_relay_bot::bot::resilient::is_benign_error;
/// assert!(is_benign_error("Bad Request: message is not modified"));
/// assert!(!is_benign_error("Too Many Requests: retry after 5"));
/// ```
#[must_use]
pub fn is_benign_error(message: &str) -> bool {
    [
        ERROR_NOT_MODIFIED,
        ERROR_EDIT_NOT_FOUND,
        ERROR_DELETE_NOT_FOUND,
        ERROR_CANT_DELETE,
    ]
    .iter()
    .any(|pattern| message.contains(pattern))
}

/// Reply parameters that still deliver when the original message is gone
#[must_use]
pub fn reply_to(message_id: i32) -> ReplyParameters {
    ReplyParameters::new(MessageId(message_id)).allow_sending_without_reply()
}

fn clamp_text(text: &str) -> String {
    if text.chars().count() > MAX_TEXT_CHARS {
        format!("{}...", crate::utils::truncate_str(text, MAX_TEXT_CHARS))
    } else {
        text.to_string()
    }
}

/// Send an HTML message with automatic retry on network failures.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    reply_to_id: Option<i32>,
) -> Result<Message> {
    let text = clamp_text(text);
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot
            .send_message(chat_id, text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(id) = reply_to_id {
            req = req.reply_parameters(reply_to(id));
        }
        req.await.map_err(|e| anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Edit an HTML message with automatic retry on network failures.
///
/// An unchanged or vanished message counts as success.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn edit_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: &str,
) -> Result<()> {
    let text = clamp_text(text);
    crate::utils::retry_telegram_operation(|| async {
        match bot
            .edit_message_text(chat_id, msg_id, text.clone())
            .parse_mode(ParseMode::Html)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_benign_error(&e.to_string()) => {
                debug!("Message update skipped: {e}");
                Ok(())
            }
            Err(e) => Err(anyhow!("Telegram edit error: {e}")),
        }
    })
    .await
}

/// Delete a message with automatic retry on network failures.
///
/// A message that is already gone counts as success.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn delete_message_resilient(bot: &Bot, chat_id: ChatId, msg_id: MessageId) -> Result<()> {
    crate::utils::retry_telegram_operation(|| async {
        match bot.delete_message(chat_id, msg_id).await {
            Ok(_) => Ok(()),
            Err(e) if is_benign_error(&e.to_string()) => {
                debug!("Message deletion skipped: {e}");
                Ok(())
            }
            Err(e) => Err(anyhow!("Telegram delete error: {e}")),
        }
    })
    .await
}
