//! Temporary download files
//!
//! A [`TempMedia`] owns one path in the download directory. The file is
//! removed by [`TempMedia::remove`] at the end of a request and, as a
//! fallback, when the guard is dropped on an early return, panic or
//! cancelled future.

use super::MediaKind;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Exclusive owner of a temporary media file
#[derive(Debug)]
pub struct TempMedia {
    path: PathBuf,
    removed: bool,
}

impl TempMedia {
    /// Reserve a unique path in `dir` (creating the directory if needed).
    ///
    /// No file is created until something writes to [`TempMedia::path`].
    ///
    /// # Errors
    ///
    /// Returns an IO error if the directory cannot be created.
    pub async fn reserve(dir: &Path, kind: MediaKind) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let name = format!("dl_{}.{}", Uuid::new_v4().as_simple(), kind.extension());
        Ok(Self {
            path: dir.join(name),
            removed: false,
        })
    }

    /// Path of the temporary file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file. A missing file is not an error; other failures are logged.
    pub async fn remove(mut self) {
        self.removed = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "Removed temporary file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove temporary file"),
        }
    }
}

/// Remove download leftovers of a previous run (files named `dl_*`).
///
/// Returns the number of files removed. A missing directory is created.
///
/// # Errors
///
/// Returns an IO error if the directory cannot be created or listed.
pub async fn sweep_stale(dir: &Path) -> std::io::Result<usize> {
    tokio::fs::create_dir_all(dir).await?;
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let is_download = entry.file_name().to_string_lossy().starts_with("dl_");
        if is_download && entry.file_type().await?.is_file() {
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %entry.path().display(), error = %e, "Failed to remove stale download"),
            }
        }
    }
    Ok(removed)
}

impl Drop for TempMedia {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed temporary file on drop"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove temporary file"),
        }
    }
}
