//! Downloader UI components
//!
//! Texts, keyboards and formatters shown around link requests.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

// ─────────────────────────────────────────────────────────────────────────────
// Callback constants
// ─────────────────────────────────────────────────────────────────────────────

/// Callback data of the "Download More" button
pub const START_AGAIN_CALLBACK: &str = "start_again";

// ─────────────────────────────────────────────────────────────────────────────
// Texts
// ─────────────────────────────────────────────────────────────────────────────

/// Welcome screen for `/start` and the "Download More" button
pub const WELCOME_TEXT: &str = "✨ <b>Social Media Downloader</b> ✨\n\n\
    Send a link from TikTok, Instagram, or YouTube to download!";

const HELP_TEXT: &str = "<b>How to use</b>\n\n\
    Send a link to a TikTok, Instagram or YouTube post and I will reply with the media.\n\n\
    /start - show the welcome screen\n\
    /help - show this message\n\
    /stats - cache statistics\n\
    /delete - reply to a downloaded media message to remove it now";

const RESTRICTED_NOTE: &str = "\n\n🔒 Only links from approved sites are accepted.";

/// Usage text for `/help`, noting when a domain allow-list is active.
#[must_use]
pub fn help_text(restricted: bool) -> String {
    if restricted {
        format!("{HELP_TEXT}{RESTRICTED_NOTE}")
    } else {
        HELP_TEXT.to_string()
    }
}

/// Shown when `/delete` is not a reply
pub const DELETE_USAGE_TEXT: &str =
    "↩️ Reply to a downloaded media message with /delete to remove it.";

/// Shown when `/delete` targets a message that is not awaiting deletion
pub const DELETE_UNKNOWN_TEXT: &str = "🤷 That message is not a pending download.";

/// Formats the `/stats` report.
///
/// # Examples
///
/// ```
/// use media_relay_bot::bot::views::stats_text;
/// let text = stats_text(3, 1000, 5, 2);
/// assert!(text.contains("3 / 1000"));
/// ```
#[must_use]
pub fn stats_text(cached: u64, capacity: u64, hits: u64, pending: usize) -> String {
    format!(
        "<b>📊 Bot Statistics</b>\n\n\
        • Cached media: {cached} / {capacity}\n\
        • Cache hits: {hits}\n\
        • Pending deletions: {pending}"
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Keyboards
// ─────────────────────────────────────────────────────────────────────────────

/// The single "Download More" button attached to delivered media
#[must_use]
pub fn download_more_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "Download More 📥",
        START_AGAIN_CALLBACK,
    )]])
}
