//! Streaming media transfer
//!
//! Downloads a resolved media URL into a local file. Success means HTTP 200
//! and a fully read body; everything else is a [`FetchError`].

use super::error::FetchError;
use crate::config::Settings;
use futures_util::StreamExt;
use reqwest::{Client as HttpClient, StatusCode};
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// HTTP media downloader with a per-transfer timeout and a size ceiling
#[derive(Clone)]
pub struct HttpFetcher {
    http: HttpClient,
    max_bytes: u64,
}

impl HttpFetcher {
    /// Create a fetcher.
    #[must_use]
    pub fn new(timeout: Duration, max_bytes: u64) -> Self {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| HttpClient::new());
        Self { http, max_bytes }
    }

    /// Create a fetcher from application settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.download_timeout(), settings.max_download_bytes)
    }

    /// Transfer `url` into `dest`, returning the number of bytes written.
    ///
    /// `dest` is created (or truncated) before the first byte arrives, so the
    /// caller must clean it up whatever the result.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` on a non-200 status, timeout, oversize body,
    /// transport failure or local write failure.
    pub async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }

        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes)
        {
            return Err(FetchError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let mut file = File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        debug!(path = %dest.display(), bytes = written, "Media transfer finished");
        info!(bytes = written, "Downloaded media");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_writes_body() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 1024]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir()?;
        let dest = dir.path().join("out.mp4");
        let fetcher = HttpFetcher::new(Duration::from_secs(5), 10_000);

        let written = fetcher
            .fetch_to(&format!("{}/v.mp4", server.uri()), &dest)
            .await?;

        assert_eq!(written, 1024);
        assert_eq!(tokio::fs::read(&dest).await?.len(), 1024);
        Ok(())
    }

    #[tokio::test]
    async fn test_non_200_is_status_error() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir()?;
        let dest = dir.path().join("out.mp4");
        let fetcher = HttpFetcher::new(Duration::from_secs(5), 10_000);

        let err = fetcher.fetch_to(&server.uri(), &dest).await.err();
        assert!(matches!(err, Some(FetchError::Status(403))));
        assert!(!dest.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_oversize_body_rejected() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4096]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir()?;
        let dest = dir.path().join("out.mp4");
        let fetcher = HttpFetcher::new(Duration::from_secs(5), 1000);

        let err = fetcher.fetch_to(&server.uri(), &dest).await.err();
        assert!(matches!(err, Some(FetchError::TooLarge { limit: 1000 })));
        Ok(())
    }

    #[tokio::test]
    async fn test_slow_source_times_out() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir()?;
        let fetcher = HttpFetcher::new(Duration::from_millis(200), 1000);

        let err = fetcher
            .fetch_to(&server.uri(), &dir.path().join("out.mp4"))
            .await
            .err();
        assert!(matches!(err, Some(FetchError::Timeout)));
        Ok(())
    }
}
