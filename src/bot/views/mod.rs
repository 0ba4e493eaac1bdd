//! View layer for bot UI components
//!
//! Contains keyboards, messages, and formatting for Telegram UI.

pub mod relay;

pub use relay::*;
