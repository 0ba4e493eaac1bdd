//! Keep-alive HTTP endpoint
//!
//! Free hosting tiers stop processes that do not answer HTTP. When a port is
//! configured the bot serves `GET /` and `GET /health` next to the poller.

use crate::downloader::RelayService;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Body of `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process answers
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Entries in the media cache
    pub cached_media: u64,
    /// Messages awaiting deferred deletion
    pub pending_deletions: usize,
}

/// Build the keep-alive router.
pub fn router(service: Arc<RelayService>) -> Router {
    Router::new()
        .route("/", get(alive))
        .route("/health", get(health))
        .with_state(service)
}

async fn alive() -> &'static str {
    "alive"
}

async fn health(State(service): State<Arc<RelayService>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        cached_media: service.cache().entry_count(),
        pending_deletions: service.scheduler().pending_count().await,
    })
}

/// Serve the router on `0.0.0.0:port` until `shutdown` fires.
///
/// # Errors
///
/// Returns an IO error if the port cannot be bound.
pub async fn serve(
    port: u16,
    service: Arc<RelayService>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Keep-alive server listening on http://{addr}");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::downloader::messenger::MockMessenger;
    use crate::downloader::{Messenger, RapidApiResolver};
    use crate::scheduler::{DeletionScheduler, DeletionStore};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    fn service() -> Arc<RelayService> {
        let settings = Settings {
            telegram_token: "dummy".to_string(),
            rapid_api_key: "key".to_string(),
            channel_id: -100,
            resolver_endpoint: "http://127.0.0.1:9/autolink".to_string(),
            resolver_host: "host".to_string(),
            resolver_timeout_secs: 1,
            download_timeout_secs: 1,
            max_download_bytes: 1024,
            download_dir: std::env::temp_dir().join("media-relay-keep-alive-test"),
            cache_capacity: 10,
            auto_delete_secs: 60,
            deletion_store_path: std::env::temp_dir().join("unused.json"),
            caption_limit: 50,
            allowed_domains_str: None,
            port: None,
        };
        let messenger: Arc<dyn Messenger> = Arc::new(MockMessenger::new());
        let scheduler = DeletionScheduler::new(
            Arc::clone(&messenger),
            DeletionStore::in_memory(),
            Duration::from_secs(60),
        );
        let resolver = Arc::new(RapidApiResolver::from_settings(&settings));
        Arc::new(RelayService::new(&settings, resolver, messenger, scheduler))
    }

    #[tokio::test]
    async fn test_root_says_alive() -> anyhow::Result<()> {
        let response = router(service())
            .oneshot(Request::builder().uri("/").body(Body::empty())?)
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024).await?;
        assert_eq!(&body[..], b"alive");
        Ok(())
    }

    #[tokio::test]
    async fn test_health_reports_counters() -> anyhow::Result<()> {
        let response = router(service())
            .oneshot(Request::builder().uri("/health").body(Body::empty())?)
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 4096).await?;
        let json: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["cached_media"], 0);
        assert_eq!(json["pending_deletions"], 0);
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() -> anyhow::Result<()> {
        let response = router(service())
            .oneshot(Request::builder().uri("/nope").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }
}
