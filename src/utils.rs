//! Small text helpers and the retry wrapper for Telegram API calls.

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;

/// Truncates a string to at most `max_chars` characters (not bytes).
///
/// # Examples
///
/// ```
/// use media_relay_bot::utils::truncate_str;
/// assert_eq!(truncate_str("Привет, мир!", 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Truncates a string to at most `max` grapheme clusters.
///
/// Unlike [`truncate_str`] this never splits an emoji sequence or a letter
/// with combining marks, which matters for captions built from post titles.
///
/// # Examples
///
/// ```
/// use media_relay_bot::utils::truncate_graphemes;
/// assert_eq!(truncate_graphemes("👨‍👩‍👧 family", 1), "👨‍👩‍👧");
/// ```
pub fn truncate_graphemes(s: &str, max: usize) -> String {
    s.graphemes(true).take(max).collect()
}

/// Retry a Telegram API operation with exponential backoff.
///
/// The retry strategy uses exponential backoff with jitter:
/// - Initial delay: 500ms
/// - Max delay: 4s
/// - Max attempts: 3 (see constants in `config.rs`)
///
/// # Errors
///
/// Returns the last error if every attempt fails.
///
/// # Examples
///
/// ```no_run
/// use media_relay_bot::utils::retry_telegram_operation;
/// use anyhow::Result;
///
/// async fn send() -> Result<i32> {
///     Ok(1)
/// }
///
/// # async fn example() -> Result<()> {
/// let id = retry_telegram_operation(|| async { send().await }).await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    };

    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter) // Add jitter to prevent thundering herd
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Telegram API operation failed after {} attempts: {}",
            TELEGRAM_API_MAX_RETRIES, e
        );
        e
    })
}
