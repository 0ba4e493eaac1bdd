//! Link-to-media pipeline
//!
//! Resolves a social-platform link through the downloader API, transfers the
//! media to local disk, archives it on Telegram and caches the resulting handle.

/// Bounded media handle cache with single-flight loading
pub mod cache;
/// Error types of the pipeline stages
pub mod error;
/// Streaming media transfer to local files
pub mod fetcher;
/// Link extraction, normalization and domain policy
pub mod link;
/// Chat-side operations the pipeline depends on
pub mod messenger;
/// Downloader API client
pub mod resolver;
/// Tagged parser for downloader API responses
pub mod response;
/// Request orchestration
pub mod service;
/// Temporary download files
pub mod temp;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use cache::{CachedMedia, MediaCache};
pub use error::{DownloadError, FetchError, RelayError, ResolveError};
pub use fetcher::HttpFetcher;
pub use link::{extract_link, normalize_link, LinkPolicy};
pub use messenger::{ArchivedMedia, MessageRef, Messenger};
pub use resolver::{LinkResolver, RapidApiResolver, ResolvedMedia};
pub use service::{LinkRequest, Outcome, RelayService};

/// Kind of media delivered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Video clip, sent with `send_video`
    #[default]
    Video,
    /// Still image, sent with `send_photo`
    Photo,
}

impl MediaKind {
    /// File extension used for the temporary download
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Video => "mp4",
            Self::Photo => "jpg",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => f.write_str("video"),
            Self::Photo => f.write_str("photo"),
        }
    }
}
