//! Deferred removal of delivered messages
//!
//! Every delivered media message is deleted after a dwell time. Pending
//! deletions are written to a JSON file so they survive a restart, and each
//! one can be cancelled while it is still waiting.

use crate::downloader::{MessageRef, Messenger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors of the pending-deletion store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the store file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The store file is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One scheduled deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDeletion {
    /// Message to delete
    pub message: MessageRef,
    /// When to delete it
    pub due_at: DateTime<Utc>,
}

impl PendingDeletion {
    /// Time left until the deletion is due (zero if overdue)
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.due_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// JSON file holding pending deletions
///
/// Without a path the store keeps nothing across restarts.
#[derive(Debug)]
pub struct DeletionStore {
    path: Option<PathBuf>,
    entries: Mutex<Vec<PendingDeletion>>,
}

impl DeletionStore {
    /// Store backed by a JSON file
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Store that lives in memory only
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Read the file into memory and return its entries.
    ///
    /// A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the file exists but cannot be read or parsed.
    pub async fn load(&self) -> Result<Vec<PendingDeletion>, StoreError> {
        let Some(path) = &self.path else {
            return Ok(self.entries.lock().await.clone());
        };

        let loaded: Vec<PendingDeletion> = match tokio::fs::read(path).await {
            Ok(bytes) if bytes.is_empty() => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut entries = self.entries.lock().await;
        entries.clone_from(&loaded);
        Ok(loaded)
    }

    /// Add or replace the entry for a message.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if persisting fails.
    pub async fn upsert(&self, pending: PendingDeletion) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.retain(|p| p.message != pending.message);
        entries.push(pending);
        self.persist(&entries).await
    }

    /// Drop the entry for a message, if any.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if persisting fails.
    pub async fn remove(&self, message: MessageRef) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|p| p.message != message);
        if entries.len() == before {
            return Ok(());
        }
        self.persist(&entries).await
    }

    /// Snapshot of the entries currently held
    pub async fn entries(&self) -> Vec<PendingDeletion> {
        self.entries.lock().await.clone()
    }

    async fn persist(&self, entries: &[PendingDeletion]) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write-then-rename keeps the previous file intact if we crash mid-write
        let tmp = tmp_path(path);
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(entries)?).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

struct Inner {
    messenger: Arc<dyn Messenger>,
    store: DeletionStore,
    tasks: Mutex<HashMap<MessageRef, CancellationToken>>,
    delay: Duration,
}

/// Schedules, persists and cancels deferred message deletions
#[derive(Clone)]
pub struct DeletionScheduler {
    inner: Arc<Inner>,
}

impl DeletionScheduler {
    /// Create a scheduler deleting messages `delay` after they are scheduled.
    #[must_use]
    pub fn new(messenger: Arc<dyn Messenger>, store: DeletionStore, delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                messenger,
                store,
                tasks: Mutex::new(HashMap::new()),
                delay,
            }),
        }
    }

    /// The fixed dwell time
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Schedule deletion of `message` after the dwell time.
    ///
    /// A store failure is logged; the deletion still runs in this process.
    pub async fn schedule(&self, message: MessageRef) {
        let due_at = Utc::now()
            + chrono::Duration::from_std(self.inner.delay).unwrap_or(chrono::Duration::zero());
        let pending = PendingDeletion { message, due_at };

        if let Err(e) = self.inner.store.upsert(pending).await {
            warn!(chat_id = message.chat_id, error = %e, "Failed to persist pending deletion");
        }

        self.spawn(message, self.inner.delay).await;
        debug!(
            chat_id = message.chat_id,
            message_id = message.message_id,
            delay_secs = self.inner.delay.as_secs(),
            "Scheduled message deletion"
        );
    }

    /// Cancel a waiting deletion. Returns `true` if one was pending.
    pub async fn cancel(&self, message: MessageRef) -> bool {
        let token = self.inner.tasks.lock().await.remove(&message);
        if let Err(e) = self.inner.store.remove(message).await {
            warn!(chat_id = message.chat_id, error = %e, "Failed to update deletion store");
        }

        match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Re-arm deletions persisted by a previous run. Overdue ones fire at once.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be read.
    pub async fn restore(&self) -> Result<usize, StoreError> {
        let pending = self.inner.store.load().await?;
        let now = Utc::now();

        for entry in &pending {
            self.spawn(entry.message, entry.remaining(now)).await;
        }

        if !pending.is_empty() {
            info!(count = pending.len(), "Restored pending message deletions");
        }
        Ok(pending.len())
    }

    /// Number of deletions still waiting
    pub async fn pending_count(&self) -> usize {
        self.inner.tasks.lock().await.len()
    }

    /// Whether a deletion is waiting for `message`
    #[cfg(test)]
    pub async fn is_pending(&self, message: MessageRef) -> bool {
        self.inner.tasks.lock().await.contains_key(&message)
    }

    async fn spawn(&self, message: MessageRef, after: Duration) {
        let token = CancellationToken::new();
        if let Some(previous) = self
            .inner
            .tasks
            .lock()
            .await
            .insert(message, token.clone())
        {
            previous.cancel();
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => return,
                () = tokio::time::sleep(after) => {}
            }

            if let Err(e) = inner.messenger.delete_message(message).await {
                // Already deleted by the user, or we lost permissions
                debug!(chat_id = message.chat_id, message_id = message.message_id, error = %e, "Deferred deletion failed");
            }

            if let Err(e) = inner.store.remove(message).await {
                warn!(chat_id = message.chat_id, error = %e, "Failed to update deletion store");
            }
            inner.tasks.lock().await.remove(&message);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::messenger::MockMessenger;
    use crate::downloader::RelayError;
    use tokio::sync::mpsc;

    const DELAY: Duration = Duration::from_secs(20 * 60);

    fn recording_messenger(fail: bool) -> (MockMessenger, mpsc::UnboundedReceiver<MessageRef>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut mock = MockMessenger::new();
        mock.expect_delete_message().returning(move |message| {
            let _ = tx.send(message);
            if fail {
                Err(RelayError::Api("message to delete not found".to_string()))
            } else {
                Ok(())
            }
        });
        (mock, rx)
    }

    async fn wait_until_idle(scheduler: &DeletionScheduler) {
        for _ in 0..100 {
            if scheduler.pending_count().await == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deletes_after_delay() {
        let (mock, mut rx) = recording_messenger(false);
        let scheduler = DeletionScheduler::new(Arc::new(mock), DeletionStore::in_memory(), DELAY);
        let message = MessageRef::new(1, 10);

        scheduler.schedule(message).await;
        assert_eq!(scheduler.pending_count().await, 1);

        tokio::time::advance(DELAY - Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err(), "deleted before the dwell time");

        assert_eq!(rx.recv().await, Some(message));
        wait_until_idle(&scheduler).await;
        assert_eq!(scheduler.pending_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_failure_is_swallowed() {
        let (mock, mut rx) = recording_messenger(true);
        let scheduler = DeletionScheduler::new(Arc::new(mock), DeletionStore::in_memory(), DELAY);
        let message = MessageRef::new(1, 11);

        scheduler.schedule(message).await;
        assert_eq!(rx.recv().await, Some(message));

        wait_until_idle(&scheduler).await;
        assert!(!scheduler.is_pending(message).await);
        assert!(scheduler.inner.store.entries().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_deletion() {
        let mut mock = MockMessenger::new();
        mock.expect_delete_message().never();
        let scheduler = DeletionScheduler::new(Arc::new(mock), DeletionStore::in_memory(), DELAY);
        let message = MessageRef::new(2, 20);

        scheduler.schedule(message).await;
        assert!(scheduler.cancel(message).await);
        assert!(!scheduler.cancel(message).await);

        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(scheduler.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_store_survives_reload() -> Result<(), StoreError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state/pending.json");
        let pending = PendingDeletion {
            message: MessageRef::new(3, 30),
            due_at: Utc::now(),
        };

        DeletionStore::file(&path).upsert(pending).await?;

        let reopened = DeletionStore::file(&path);
        assert_eq!(reopened.load().await?, vec![pending]);

        reopened.remove(pending.message).await?;
        assert!(DeletionStore::file(&path).load().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_restore_fires_overdue_deletions() -> Result<(), StoreError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("pending.json");
        let overdue = PendingDeletion {
            message: MessageRef::new(4, 40),
            due_at: Utc::now() - chrono::Duration::minutes(5),
        };
        DeletionStore::file(&path).upsert(overdue).await?;

        let (mock, mut rx) = recording_messenger(false);
        let scheduler = DeletionScheduler::new(Arc::new(mock), DeletionStore::file(&path), DELAY);

        assert_eq!(scheduler.restore().await?, 1);
        assert_eq!(rx.recv().await, Some(overdue.message));

        wait_until_idle(&scheduler).await;
        assert!(DeletionStore::file(&path).load().await?.is_empty());
        Ok(())
    }

    #[test]
    fn test_remaining_saturates() {
        let now = Utc::now();
        let past = PendingDeletion {
            message: MessageRef::new(1, 1),
            due_at: now - chrono::Duration::seconds(10),
        };
        assert_eq!(past.remaining(now), Duration::ZERO);

        let future = PendingDeletion {
            message: MessageRef::new(1, 1),
            due_at: now + chrono::Duration::seconds(10),
        };
        assert_eq!(future.remaining(now), Duration::from_secs(10));
    }
}
