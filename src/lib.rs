#![deny(missing_docs)]
//! Telegram bot that turns social media links into delivered media.

/// Telegram handlers, views and the messenger implementation
pub mod bot;
/// Configuration loading and validation
pub mod config;
/// Link-to-media pipeline
pub mod downloader;
/// Keep-alive HTTP endpoint
pub mod keep_alive;
/// Bot runtime entrypoint
pub mod runner;
/// Deferred deletion of delivered messages
pub mod scheduler;
/// Text helpers and Telegram retry
pub mod utils;
