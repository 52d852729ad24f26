//! Notifier Adapters
//!
//! - `TelegramNotifier`: Telegram Bot API
//! - `LogNotifier`: writes alerts to the tracing log

mod log;
mod telegram;

pub use self::log::LogNotifier;
pub use telegram::TelegramNotifier;
