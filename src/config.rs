//! Configuration and settings management
//!
//! Loads settings from optional config files and environment variables once at
//! startup. The resulting [`Settings`] are immutable and shared through `Arc`.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default downloader API endpoint (RapidAPI "social download all in one")
pub const DEFAULT_RESOLVER_ENDPOINT: &str =
    "https://social-download-all-in-one.p.rapidapi.com/v1/social/autolink";
/// Default value of the `X-RapidAPI-Host` header
pub const DEFAULT_RESOLVER_HOST: &str = "social-download-all-in-one.p.rapidapi.com";
/// Timeout for the resolver call in seconds
pub const DEFAULT_RESOLVER_TIMEOUT_SECS: u64 = 30;
/// Timeout for the media transfer in seconds
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;
/// Bot API upload ceiling (50 MiB)
pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 50 * 1024 * 1024;
/// Number of cached media handles kept in memory
pub const DEFAULT_CACHE_CAPACITY: u64 = 1000;
/// Dwell time before a delivered message is removed (20 minutes)
pub const DEFAULT_AUTO_DELETE_SECS: u64 = 1200;
/// Maximum number of grapheme clusters of the title shown in a caption
pub const DEFAULT_CAPTION_LIMIT: usize = 50;

// Telegram API retry configuration
/// Maximum attempts for a Telegram API operation
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Initial backoff between Telegram API attempts
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound for the backoff between Telegram API attempts
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;

/// Errors raised while building [`Settings`]
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The configuration sources could not be read or deserialized
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    /// A required value is absent or empty
    #[error("Missing required setting `{0}`")]
    Missing(&'static str),
    /// A value is present but unusable
    #[error("Invalid setting `{name}`: {reason}")]
    Invalid {
        /// Setting name
        name: &'static str,
        /// Human-readable reason
        reason: String,
    },
}

/// Values as they come out of the configuration sources, before validation.
#[derive(Debug, Deserialize)]
struct RawSettings {
    telegram_token: Option<String>,
    /// Older name of the token variable, used when `telegram_token` is unset
    bot_token: Option<String>,
    rapid_api_key: Option<String>,
    channel_id: Option<i64>,
    resolver_endpoint: Option<String>,
    resolver_host: Option<String>,
    resolver_timeout_secs: Option<u64>,
    download_timeout_secs: Option<u64>,
    max_download_bytes: Option<u64>,
    download_dir: Option<PathBuf>,
    cache_capacity: Option<u64>,
    auto_delete_secs: Option<u64>,
    deletion_store_path: Option<PathBuf>,
    caption_limit: Option<usize>,
    allowed_domains: Option<String>,
    port: Option<u16>,
}

/// Application settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,
    /// Key forwarded to the downloader API
    pub rapid_api_key: String,
    /// Archive chat used to obtain durable file handles
    pub channel_id: i64,

    /// Downloader API endpoint
    pub resolver_endpoint: String,
    /// Value of the `X-RapidAPI-Host` header
    pub resolver_host: String,
    /// Resolver call timeout in seconds
    pub resolver_timeout_secs: u64,
    /// Media transfer timeout in seconds
    pub download_timeout_secs: u64,
    /// Largest media file accepted, in bytes
    pub max_download_bytes: u64,
    /// Directory for temporary downloads
    pub download_dir: PathBuf,

    /// Maximum number of cached media handles
    pub cache_capacity: u64,
    /// Dwell time before delivered messages are removed, in seconds
    pub auto_delete_secs: u64,
    /// JSON file holding pending deletions across restarts
    pub deletion_store_path: PathBuf,
    /// Maximum title length shown in captions
    pub caption_limit: usize,

    /// Comma-separated list of accepted link domains (empty means any)
    #[serde(rename = "allowed_domains")]
    pub allowed_domains_str: Option<String>,
    /// Port of the keep-alive HTTP endpoint
    pub port: Option<u16>,
}

/// Assemble the layered configuration sources.
///
/// # Errors
///
/// Returns a `ConfigError` if a present config file cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // This file shouldn't be checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg.. `APP__CACHE_CAPACITY=10 ./target/app` sets `cache_capacity`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Plain variables (`CHANNEL_ID` -> `channel_id`); empty ones count as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Load settings from files and environment variables.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use media_relay_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `SettingsError` if loading fails or a required value is missing.
    pub fn new() -> Result<Self, SettingsError> {
        Self::from_config(build_config()?)
    }

    /// Build settings from an already assembled [`Config`].
    ///
    /// # Errors
    ///
    /// Returns a `SettingsError` if deserialization or validation fails.
    pub fn from_config(config: Config) -> Result<Self, SettingsError> {
        let raw: RawSettings = config.try_deserialize()?;

        let settings = Self {
            telegram_token: required(
                raw.telegram_token
                    .filter(|t| !t.trim().is_empty())
                    .or(raw.bot_token),
                "TELEGRAM_TOKEN",
            )?,
            rapid_api_key: required(raw.rapid_api_key, "RAPID_API_KEY")?,
            channel_id: raw.channel_id.ok_or(SettingsError::Missing("CHANNEL_ID"))?,
            resolver_endpoint: raw
                .resolver_endpoint
                .unwrap_or_else(|| DEFAULT_RESOLVER_ENDPOINT.to_string()),
            resolver_host: raw
                .resolver_host
                .unwrap_or_else(|| DEFAULT_RESOLVER_HOST.to_string()),
            resolver_timeout_secs: raw
                .resolver_timeout_secs
                .unwrap_or(DEFAULT_RESOLVER_TIMEOUT_SECS),
            download_timeout_secs: raw
                .download_timeout_secs
                .unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
            max_download_bytes: raw.max_download_bytes.unwrap_or(DEFAULT_MAX_DOWNLOAD_BYTES),
            download_dir: raw
                .download_dir
                .unwrap_or_else(|| PathBuf::from("downloads")),
            cache_capacity: raw.cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY),
            auto_delete_secs: raw.auto_delete_secs.unwrap_or(DEFAULT_AUTO_DELETE_SECS),
            deletion_store_path: raw
                .deletion_store_path
                .unwrap_or_else(|| PathBuf::from("data/pending_deletions.json")),
            caption_limit: raw.caption_limit.unwrap_or(DEFAULT_CAPTION_LIMIT),
            allowed_domains_str: raw.allowed_domains,
            port: raw.port,
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Invalid` for the first unusable value.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.channel_id == 0 {
            return Err(invalid("CHANNEL_ID", "must be a non-zero chat id"));
        }
        if self.cache_capacity == 0 {
            return Err(invalid("CACHE_CAPACITY", "must be greater than zero"));
        }
        if self.resolver_timeout_secs == 0 || self.download_timeout_secs == 0 {
            return Err(invalid("*_TIMEOUT_SECS", "timeouts must be greater than zero"));
        }
        if self.caption_limit == 0 {
            return Err(invalid("CAPTION_LIMIT", "must be greater than zero"));
        }
        if url::Url::parse(&self.resolver_endpoint).is_err() {
            return Err(invalid("RESOLVER_ENDPOINT", "not an absolute URL"));
        }
        Ok(())
    }

    /// Returns the set of accepted link domains, lowercased
    #[must_use]
    pub fn allowed_domains(&self) -> HashSet<String> {
        self.allowed_domains_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .map(|d| {
                        let d = d.to_ascii_lowercase();
                        d.strip_prefix("www.").map_or_else(|| d.clone(), ToString::to_string)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Resolver call timeout
    #[must_use]
    pub const fn resolver_timeout(&self) -> Duration {
        Duration::from_secs(self.resolver_timeout_secs)
    }

    /// Media transfer timeout
    #[must_use]
    pub const fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Dwell time of delivered messages
    #[must_use]
    pub const fn auto_delete_after(&self) -> Duration {
        Duration::from_secs(self.auto_delete_secs)
    }
}

fn required(value: Option<String>, name: &'static str) -> Result<String, SettingsError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(SettingsError::Missing(name)),
    }
}

fn invalid(name: &'static str, reason: &str) -> SettingsError {
    SettingsError::Invalid {
        name,
        reason: reason.to_string(),
    }
}
