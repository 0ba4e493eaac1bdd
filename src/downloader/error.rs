//! Error types for the link-to-media pipeline.
//!
//! Each stage has its own enum; [`DownloadError`] is what a request ends with
//! and knows how to present itself to the user.

use thiserror::Error;

/// Static text shown when the downloader API yields nothing usable
pub const NOT_FOUND_TEXT: &str = "Media not found or private.";

/// Failures of the downloader API call
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The provider declared an error; the message is shown verbatim
    #[error("Provider error: {0}")]
    Provider(String),
    /// The response parsed but matched none of the known shapes
    #[error("Unrecognized resolver response: {0}")]
    Unrecognized(String),
    /// The response body was not JSON
    #[error("Invalid resolver body: {0}")]
    InvalidBody(String),
    /// Transport error, timeout or a non-success status without error body
    #[error("Network error: {0}")]
    Network(String),
}

/// Failures of the media transfer
#[derive(Debug, Error)]
pub enum FetchError {
    /// The media source answered with something other than 200
    #[error("Media source returned status {0}")]
    Status(u16),
    /// The transfer exceeded its time budget
    #[error("Media transfer timed out")]
    Timeout,
    /// The media is larger than the configured ceiling
    #[error("Media exceeds {limit} bytes")]
    TooLarge {
        /// Configured ceiling in bytes
        limit: u64,
    },
    /// Connection or body read failure
    #[error("Transfer error: {0}")]
    Transport(String),
    /// Writing the local file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Failures of chat-side operations (status messages, archive, delivery)
#[derive(Debug, Error)]
pub enum RelayError {
    /// The Telegram API call failed
    #[error("Telegram API error: {0}")]
    Api(String),
    /// The archive message did not carry the expected media
    #[error("Archive message has no {0} attached")]
    MissingMedia(&'static str),
}

/// Terminal failure of one link request
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The link's domain is not in the allow-list
    #[error("Unsupported link: {0}")]
    UnsupportedLink(String),
    /// The downloader API yielded no media
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// The media could not be transferred
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Archive upload or delivery failed
    #[error(transparent)]
    Relay(#[from] RelayError),
    /// Local file system failure outside the transfer itself
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Text that replaces the progress message when the request fails (HTML).
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::UnsupportedLink(_) => "⚠️ This link is not supported.".to_string(),
            Self::Resolve(ResolveError::Provider(message)) => format!(
                "❌ <b>Error:</b> {}",
                html_escape::encode_text(message)
            ),
            Self::Resolve(_) => format!("❌ <b>Error:</b> {NOT_FOUND_TEXT}"),
            Self::Fetch(_) => "❌ Download failed. Could not reach the media source.".to_string(),
            Self::Relay(_) | Self::Io(_) => {
                "❌ <b>System Error.</b> Please try again with a different link.".to_string()
            }
        }
    }

    /// Whether the failure is an expected outcome rather than a fault of the bot
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedLink(_) | Self::Resolve(ResolveError::Provider(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_message_is_verbatim() {
        let err = DownloadError::from(ResolveError::Provider("private".to_string()));
        assert!(err.user_message().contains("private"));
        assert!(err.is_expected());
    }

    #[test]
    fn test_provider_message_is_escaped() {
        let err = DownloadError::from(ResolveError::Provider("<b>x</b>".to_string()));
        assert!(err.user_message().contains("&lt;b&gt;x&lt;/b&gt;"));
    }

    #[test]
    fn test_resolution_failures_share_static_text() {
        for err in [
            ResolveError::Unrecognized("{}".to_string()),
            ResolveError::InvalidBody("<html>".to_string()),
            ResolveError::Network("timeout".to_string()),
        ] {
            assert!(DownloadError::from(err).user_message().contains(NOT_FOUND_TEXT));
        }
    }

    #[test]
    fn test_fetch_failures_collapse() {
        let a = DownloadError::from(FetchError::Status(404)).user_message();
        let b = DownloadError::from(FetchError::TooLarge { limit: 1 }).user_message();
        assert_eq!(a, b);
        assert!(a.contains("Download failed"));
    }
}
