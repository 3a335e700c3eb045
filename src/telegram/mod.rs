pub mod client;
pub mod types;

pub use crate::errors::DeliveryError;
pub use client::TelegramClient;
pub use types::{ParseMode, TelegramConfig, TextOptions};

use async_trait::async_trait;

/// Outbound messaging transport.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        options: &TextOptions,
    ) -> Result<(), DeliveryError>;

    async fn send_photo(
        &self,
        chat_id: i64,
        photo_url: &str,
        caption: &str,
    ) -> Result<(), DeliveryError>;
}
