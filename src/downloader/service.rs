//! Request orchestration
//!
//! One [`RelayService::handle`] call serves one incoming link: cache lookup,
//! then resolve, transfer, archive, deliver and schedule the deletion.
//! Every failure ends here; nothing propagates to the dispatcher.

use super::cache::{CachedMedia, MediaCache};
use super::error::{DownloadError, RelayError};
use super::fetcher::HttpFetcher;
use super::link::{extract_link, normalize_link, LinkPolicy};
use super::messenger::{ArchivedMedia, MessageRef, Messenger};
use super::resolver::{LinkResolver, ResolvedMedia};
use super::temp::TempMedia;
use super::MediaKind;
use crate::config::Settings;
use crate::scheduler::DeletionScheduler;
use crate::utils::truncate_graphemes;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Progress text while the downloader API is queried
pub const PROCESSING_TEXT: &str = "🔎 <b>Processing link...</b>";
/// Progress text during the media transfer
pub const DOWNLOADING_TEXT: &str = "📥 <b>Downloading to server...</b>";
/// Progress text during the archive upload
pub const UPLOADING_TEXT: &str = "📤 <b>Uploading to you...</b>";

/// An incoming link message
#[derive(Debug, Clone)]
pub struct LinkRequest {
    /// Chat the message came from
    pub chat_id: i64,
    /// Id of the incoming message (replies are attached to it)
    pub message_id: i32,
    /// Raw message text
    pub text: String,
}

/// How a request ended
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Media was delivered
    Delivered {
        /// The delivered message
        message: MessageRef,
        /// Whether the handle came from the cache
        from_cache: bool,
    },
    /// The request failed; the user has been told
    Failed(Arc<DownloadError>),
}

/// Builds the HTML caption shown under delivered media.
///
/// # Examples
///
/// ```
/// use media_relay_bot::downloader::service::build_caption;
/// use media_relay_bot::downloader::MediaKind;
///
/// let caption = build_caption("Cat & Dog", MediaKind::Video, 50);
/// assert_eq!(caption, "✅ <b>Success!</b>\n🎬 Cat &amp; Dog");
/// ```
#[must_use]
pub fn build_caption(title: &str, kind: MediaKind, limit: usize) -> String {
    let icon = match kind {
        MediaKind::Video => "🎬",
        MediaKind::Photo => "🖼",
    };
    let title = truncate_graphemes(title.trim(), limit);
    format!(
        "✅ <b>Success!</b>\n{icon} {}",
        html_escape::encode_text(&title)
    )
}

/// The link-to-media pipeline
pub struct RelayService {
    resolver: Arc<dyn LinkResolver>,
    fetcher: HttpFetcher,
    messenger: Arc<dyn Messenger>,
    cache: MediaCache,
    scheduler: DeletionScheduler,
    policy: LinkPolicy,
    download_dir: PathBuf,
    caption_limit: usize,
}

impl RelayService {
    /// Assemble the pipeline from settings and its collaborators.
    #[must_use]
    pub fn new(
        settings: &Settings,
        resolver: Arc<dyn LinkResolver>,
        messenger: Arc<dyn Messenger>,
        scheduler: DeletionScheduler,
    ) -> Self {
        Self {
            resolver,
            fetcher: HttpFetcher::from_settings(settings),
            messenger,
            cache: MediaCache::new(settings.cache_capacity),
            scheduler,
            policy: LinkPolicy::new(settings.allowed_domains()),
            download_dir: settings.download_dir.clone(),
            caption_limit: settings.caption_limit,
        }
    }

    /// The media cache
    #[must_use]
    pub const fn cache(&self) -> &MediaCache {
        &self.cache
    }

    /// The deferred deletion scheduler
    #[must_use]
    pub const fn scheduler(&self) -> &DeletionScheduler {
        &self.scheduler
    }

    /// The accepted-domain policy
    #[must_use]
    pub const fn policy(&self) -> &LinkPolicy {
        &self.policy
    }

    /// Serve one link request. Never fails; the user sees the outcome.
    pub async fn handle(&self, request: LinkRequest) -> Outcome {
        let link = normalize_link(extract_link(&request.text));
        info!(url = %link, chat_id = request.chat_id, "Link request");

        if !self.policy.permits(&link) {
            return self.reject(&request, link).await;
        }

        if let Some(media) = self.cache.get(&link).await {
            return match self.deliver(&request, &media).await {
                Ok(message) => Outcome::Delivered {
                    message,
                    from_cache: true,
                },
                Err(e) => {
                    error!(url = %link, error = %e, "Cached delivery failed");
                    let err = DownloadError::from(e);
                    self.notify(&request, &err.user_message()).await;
                    Outcome::Failed(Arc::new(err))
                }
            };
        }

        let status = match self
            .messenger
            .send_status(request.chat_id, Some(request.message_id), PROCESSING_TEXT)
            .await
        {
            Ok(status) => status,
            Err(e) => {
                error!(chat_id = request.chat_id, error = %e, "Failed to send status message");
                return Outcome::Failed(Arc::new(e.into()));
            }
        };

        let result = match self
            .cache
            .get_or_load(link.clone(), self.acquire(&link, status))
            .await
        {
            Ok(media) => self
                .deliver(&request, &media)
                .await
                .map_err(|e| Arc::new(DownloadError::from(e))),
            Err(e) => Err(e),
        };

        match result {
            Ok(message) => {
                if let Err(e) = self.messenger.delete_message(status).await {
                    debug!(error = %e, "Failed to remove status message");
                }
                Outcome::Delivered {
                    message,
                    from_cache: false,
                }
            }
            Err(err) => {
                if err.is_expected() {
                    warn!(url = %link, error = %err, "Link request failed");
                } else {
                    error!(url = %link, error = %err, "Link request failed");
                }
                if let Err(e) = self.messenger.edit_status(status, &err.user_message()).await {
                    warn!(error = %e, "Failed to report failure to user");
                }
                Outcome::Failed(err)
            }
        }
    }

    /// Resolve, transfer and archive a link that is not cached yet.
    async fn acquire(&self, link: &str, status: MessageRef) -> Result<CachedMedia, DownloadError> {
        let resolved = self.resolver.resolve(link).await?;
        debug!(url = %link, media_url = %resolved.media_url, kind = %resolved.kind, "Link resolved");

        self.progress(status, DOWNLOADING_TEXT).await;

        let temp = TempMedia::reserve(&self.download_dir, resolved.kind).await?;
        let archived = self.transfer_and_archive(&resolved, &temp, status).await;
        temp.remove().await;

        let caption = build_caption(&resolved.title, resolved.kind, self.caption_limit);
        Ok(CachedMedia::from_archive(resolved.kind, archived?, caption))
    }

    async fn transfer_and_archive(
        &self,
        resolved: &ResolvedMedia,
        temp: &TempMedia,
        status: MessageRef,
    ) -> Result<ArchivedMedia, DownloadError> {
        self.fetcher
            .fetch_to(&resolved.media_url, temp.path())
            .await?;

        self.progress(status, UPLOADING_TEXT).await;

        Ok(self.messenger.archive(temp.path(), resolved.kind).await?)
    }

    async fn deliver(
        &self,
        request: &LinkRequest,
        media: &CachedMedia,
    ) -> Result<MessageRef, RelayError> {
        let message = self
            .messenger
            .deliver(request.chat_id, Some(request.message_id), media)
            .await?;
        self.scheduler.schedule(message).await;
        Ok(message)
    }

    async fn reject(&self, request: &LinkRequest, link: String) -> Outcome {
        let err = DownloadError::UnsupportedLink(link);
        warn!(error = %err, "Rejected link");
        self.notify(request, &err.user_message()).await;
        Outcome::Failed(Arc::new(err))
    }

    async fn notify(&self, request: &LinkRequest, text: &str) {
        if let Err(e) = self
            .messenger
            .send_status(request.chat_id, Some(request.message_id), text)
            .await
        {
            warn!(chat_id = request.chat_id, error = %e, "Failed to notify user");
        }
    }

    async fn progress(&self, status: MessageRef, text: &str) {
        if let Err(e) = self.messenger.edit_status(status, text).await {
            debug!(error = %e, "Progress update skipped");
        }
    }
}
