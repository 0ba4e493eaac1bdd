//! Downloader API client
//!
//! Sends the user's link to the "all in one" downloader API and turns its
//! answer into a direct media URL. One attempt per request, no retry.

use super::error::ResolveError;
use super::response::ResponseShape;
use super::MediaKind;
use crate::config::Settings;
use crate::utils::truncate_str;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// A link translated into something the fetcher can download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    /// Direct media URL
    pub media_url: String,
    /// Title shown in the caption
    pub title: String,
    /// Photo or video
    pub kind: MediaKind,
}

/// Translates user links into direct media URLs
#[async_trait]
pub trait LinkResolver: Send + Sync {
    /// Resolve a (normalized) link.
    async fn resolve(&self, link: &str) -> Result<ResolvedMedia, ResolveError>;
}

/// [`LinkResolver`] backed by the RapidAPI "social download all in one" service
pub struct RapidApiResolver {
    http: HttpClient,
    endpoint: String,
    host: String,
    api_key: String,
}

impl RapidApiResolver {
    /// Create a resolver for an explicit endpoint.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        host: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| HttpClient::new());

        Self {
            http,
            endpoint: endpoint.into(),
            host: host.into(),
            api_key: api_key.into(),
        }
    }

    /// Create a resolver from application settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.resolver_endpoint.clone(),
            settings.resolver_host.clone(),
            settings.rapid_api_key.clone(),
            settings.resolver_timeout(),
        )
    }

    async fn request(&self, link: &str) -> Result<Value, ResolveError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("X-RapidAPI-Host", &self.host)
            .header("X-RapidAPI-Key", &self.api_key)
            .json(&json!({ "url": link }))
            .send()
            .await
            .map_err(|e| ResolveError::Network(e.without_url().to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ResolveError::Network(e.without_url().to_string()))?;

        match serde_json::from_str::<Value>(&text) {
            // Error statuses often still carry {"error": ..., "message": ...}
            Ok(body) if status.is_success() || carries_provider_text(&body) => Ok(body),
            Ok(_) => Err(ResolveError::Network(format!("API error: {status}"))),
            Err(_) if !status.is_success() => {
                Err(ResolveError::Network(format!("API error: {status}")))
            }
            Err(e) => {
                warn!(error = %e, body = %truncate_str(&text, 200), "Resolver returned non-JSON body");
                Err(ResolveError::InvalidBody(e.to_string()))
            }
        }
    }
}

fn carries_provider_text(body: &Value) -> bool {
    body.get("message").is_some() || body.get("error").is_some()
}

#[async_trait]
impl LinkResolver for RapidApiResolver {
    async fn resolve(&self, link: &str) -> Result<ResolvedMedia, ResolveError> {
        let body = self.request(link).await?;
        debug!(url = %link, response = %truncate_str(body.to_string(), 500), "Resolver response");

        let shape = ResponseShape::parse(&body).inspect_err(|e| {
            warn!(url = %link, error = %e, "Resolver response matched no known shape");
        })?;

        shape.into_resolved()
    }
}
