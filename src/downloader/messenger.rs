//! Chat-side operations used by the pipeline
//!
//! The pipeline only talks to Telegram through [`Messenger`], so it can be
//! exercised with a mock in tests.

use super::cache::CachedMedia;
use super::error::RelayError;
use super::MediaKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Identifies one message in one chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    /// Chat identifier
    pub chat_id: i64,
    /// Message identifier within the chat
    pub message_id: i32,
}

impl MessageRef {
    /// Create a message reference
    #[must_use]
    pub const fn new(chat_id: i64, message_id: i32) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }
}

/// Result of uploading a file to the archive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedMedia {
    /// Durable `file_id` usable for re-delivery
    pub handle: String,
    /// Thumbnail `file_id` (video only). Telegram does not accept it back
    /// on delivery, so it is logged and not cached.
    pub thumbnail: Option<String>,
    /// Duration in seconds (video only)
    pub duration: Option<u32>,
}

/// Operations on the messaging platform
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a progress message, optionally as a reply.
    async fn send_status(
        &self,
        chat_id: i64,
        reply_to: Option<i32>,
        text: &str,
    ) -> Result<MessageRef, RelayError>;

    /// Replace the text of a progress message.
    async fn edit_status(&self, status: MessageRef, text: &str) -> Result<(), RelayError>;

    /// Delete any message.
    async fn delete_message(&self, message: MessageRef) -> Result<(), RelayError>;

    /// Upload a local file to the archive chat and return its durable handle.
    async fn archive(&self, path: &Path, kind: MediaKind) -> Result<ArchivedMedia, RelayError>;

    /// Send cached media to a chat by handle, with caption and the "again" button.
    async fn deliver(
        &self,
        chat_id: i64,
        reply_to: Option<i32>,
        media: &CachedMedia,
    ) -> Result<MessageRef, RelayError>;
}
