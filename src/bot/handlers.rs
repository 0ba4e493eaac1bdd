use crate::bot::resilient::{delete_message_resilient, reply_to};
use crate::bot::views::{
    help_text, stats_text, DELETE_UNKNOWN_TEXT, DELETE_USAGE_TEXT, START_AGAIN_CALLBACK,
    WELCOME_TEXT,
};
use crate::downloader::{LinkRequest, MessageRef, Outcome, RelayService};
use crate::utils::truncate_str;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use teloxide::{
    prelude::*,
    types::{CallbackQuery, ParseMode},
    utils::command::BotCommands,
};
use tracing::{debug, info, warn};

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Whether a text message should go to the link pipeline.
///
/// Anything shaped like a command (known or not) is kept away from the
/// downloader API.
///
/// # Examples
///
/// ```
/// use media_relay_bot::bot::handlers::is_link_message;
/// assert!(is_link_message("https://vm.tiktok.com/ZM1/"));
/// assert!(!is_link_message("/foo"));
/// ```
#[must_use]
pub fn is_link_message(text: &str) -> bool {
    let text = text.trim_start();
    !text.is_empty() && !text.starts_with('/')
}

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome screen
    #[command(description = "Start the bot.")]
    Start,
    /// Show usage
    #[command(description = "Show usage.")]
    Help,
    /// Show cache statistics
    #[command(description = "Show bot statistics.")]
    Stats,
    /// Remove a delivered media message now
    #[command(description = "Reply to a downloaded message to delete it.")]
    Delete,
}

/// Start handler
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message) -> Result<()> {
    info!(
        user_id = get_user_id_safe(&msg),
        "User initiated /start command."
    );
    bot.send_message(msg.chat.id, WELCOME_TEXT)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Help handler
///
/// # Errors
///
/// Returns an error if the help message cannot be sent.
pub async fn help(bot: Bot, msg: Message, service: Arc<RelayService>) -> Result<()> {
    bot.send_message(msg.chat.id, help_text(service.policy().is_restricted()))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Stats handler - cache and scheduler figures
///
/// # Errors
///
/// Returns an error if the stats response cannot be sent.
pub async fn stats(bot: Bot, msg: Message, service: Arc<RelayService>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    info!(user_id, "Stats command received.");

    let cache = service.cache();
    cache.sync().await;
    let text = stats_text(
        cache.entry_count(),
        cache.capacity(),
        cache.hit_count(),
        service.scheduler().pending_count().await,
    );

    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Delete handler
///
/// Used as a reply to a delivered media message: deletes it immediately and
/// cancels its scheduled deletion.
///
/// # Errors
///
/// Returns an error if Telegram API calls fail.
pub async fn delete(bot: Bot, msg: Message, service: Arc<RelayService>) -> Result<()> {
    let Some(target) = msg.reply_to_message() else {
        bot.send_message(msg.chat.id, DELETE_USAGE_TEXT)
            .reply_parameters(reply_to(msg.id.0))
            .await?;
        return Ok(());
    };

    let target_ref = MessageRef::new(msg.chat.id.0, target.id.0);
    if !service.scheduler().cancel(target_ref).await {
        bot.send_message(msg.chat.id, DELETE_UNKNOWN_TEXT)
            .reply_parameters(reply_to(msg.id.0))
            .await?;
        return Ok(());
    }

    info!(chat_id = target_ref.chat_id, message_id = target_ref.message_id, "Deleting media on request");
    delete_message_resilient(&bot, msg.chat.id, target.id).await?;
    if let Err(e) = delete_message_resilient(&bot, msg.chat.id, msg.id).await {
        debug!(error = %e, "Failed to remove /delete command message");
    }
    Ok(())
}

/// Link handler
///
/// The request runs in its own task so a slow download never holds up
/// further updates from the same chat.
///
/// # Errors
///
/// Returns an error if the message carries no text.
pub async fn handle_link(msg: Message, service: Arc<RelayService>) -> Result<()> {
    let text = msg
        .text()
        .ok_or_else(|| anyhow!("Message has no text"))?
        .to_string();
    let user_id = get_user_id_safe(&msg);
    info!(user_id, text = %truncate_str(&text, 100), "Handling link message");

    let request = LinkRequest {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        text,
    };

    tokio::spawn(async move {
        match service.handle(request).await {
            Outcome::Delivered {
                message,
                from_cache,
            } => info!(
                chat_id = message.chat_id,
                message_id = message.message_id,
                from_cache,
                "Media delivered"
            ),
            Outcome::Failed(e) => debug!(user_id, error = %e, "Link request ended without media"),
        }
    });

    Ok(())
}

/// Callback handler for the "Download More" button
///
/// # Errors
///
/// Returns an error if Telegram API calls fail.
pub async fn handle_callback(bot: Bot, q: CallbackQuery) -> Result<()> {
    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };

    let _ = bot.answer_callback_query(q.id.clone()).await;

    if data != START_AGAIN_CALLBACK {
        warn!(data, "Unknown callback data");
        return Ok(());
    }

    let chat_id = q
        .message
        .as_ref()
        .map(|msg| msg.chat().id)
        .ok_or_else(|| anyhow!("Callback message missing chat id"))?;

    bot.send_message(chat_id, WELCOME_TEXT)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}
