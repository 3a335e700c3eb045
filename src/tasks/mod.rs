pub mod feed_monitor;
pub mod telegram_sender;
pub mod types;
