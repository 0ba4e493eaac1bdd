/// Command, link and callback handlers
pub mod handlers;
/// Telegram implementation of the pipeline's messenger
pub mod messenger;
/// Telegram API calls with retry
pub mod resilient;
/// Texts and keyboards
pub mod views;

pub use messenger::TelegramMessenger;
