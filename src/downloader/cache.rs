//! Bounded cache of archived media handles
//!
//! Keys are normalized links. Capacity is bounded with a least-recently-used
//! policy, and concurrent loads of the same missing key are coalesced so only
//! one request talks to the downloader API.

use super::error::DownloadError;
use super::messenger::ArchivedMedia;
use super::MediaKind;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Everything needed to deliver media again without re-uploading it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedMedia {
    /// Photo or video
    pub kind: MediaKind,
    /// Durable `file_id`
    pub handle: String,
    /// Precomputed HTML caption
    pub caption: String,
    /// Duration in seconds, sent along on video delivery
    pub duration: Option<u32>,
}

impl CachedMedia {
    /// Build a cache entry from an archive result.
    #[must_use]
    pub fn from_archive(kind: MediaKind, archived: ArchivedMedia, caption: String) -> Self {
        Self {
            kind,
            handle: archived.handle,
            caption,
            duration: archived.duration,
        }
    }
}

/// LRU-bounded map from normalized link to [`CachedMedia`]
#[derive(Clone)]
pub struct MediaCache {
    inner: Cache<String, CachedMedia>,
    capacity: u64,
    hits: Arc<AtomicU64>,
}

impl MediaCache {
    /// Creates a cache holding at most `capacity` entries.
    ///
    /// # Examples
    ///
    /// ```
    /// use media_relay_bot::downloader::MediaCache;
    ///
    /// let cache = MediaCache::new(1000);
    /// assert_eq!(cache.capacity(), 1000);
    /// ```
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(capacity)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        Self {
            inner,
            capacity,
            hits: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Look up a key, counting the hit.
    pub async fn get(&self, key: &str) -> Option<CachedMedia> {
        let found = self.inner.get(key).await;
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(url = %key, "Media cache hit");
        }
        found
    }

    /// Insert or replace an entry (last write wins).
    #[cfg(test)]
    pub async fn insert(&self, key: String, media: CachedMedia) {
        self.inner.insert(key, media).await;
    }

    /// Return the cached entry or run `load` to produce it.
    ///
    /// Concurrent callers with the same key share one `load`; the others wait
    /// for its outcome. Failures are shared but not cached.
    ///
    /// # Errors
    ///
    /// Returns the loader's error, shared between all waiting callers.
    pub async fn get_or_load<F>(&self, key: String, load: F) -> Result<CachedMedia, Arc<DownloadError>>
    where
        F: Future<Output = Result<CachedMedia, DownloadError>>,
    {
        self.inner.try_get_with(key, load).await
    }

    /// Returns the approximate number of cached entries
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Returns the number of cache hits since startup
    #[must_use]
    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Returns the configured capacity
    #[must_use]
    pub const fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Apply pending maintenance (eviction, counters) immediately
    pub async fn sync(&self) {
        self.inner.run_pending_tasks().await;
    }
}
