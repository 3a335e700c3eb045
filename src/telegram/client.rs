use super::types::{
    TelegramConfig, TelegramEdit, TelegramMessage, TelegramPhoto, TelegramResponse, TextOptions,
};
use super::Messenger;
use crate::errors::DeliveryError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

/// Bot API client for `sendMessage`, `editMessageText` and `sendPhoto`.
pub struct TelegramClient {
    client: Client,
    config: TelegramConfig,
}

impl TelegramClient {
    pub fn new(client: Client, config: TelegramConfig) -> Self {
        Self { client, config }
    }

    async fn call<P: Serialize>(&self, method: &str, payload: &P) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(self.config.method_url(method))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed = serde_json::from_str::<TelegramResponse<serde_json::Value>>(&body).ok();

        match parsed {
            Some(reply) if reply.ok && status.is_success() => Ok(()),
            Some(reply) => Err(DeliveryError::Api {
                status: status.as_u16(),
                description: reply
                    .description
                    .unwrap_or_else(|| "Unknown Telegram API error".to_string()),
            }),
            None => Err(DeliveryError::Api {
                status: status.as_u16(),
                description: body,
            }),
        }
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        options: &TextOptions,
    ) -> Result<(), DeliveryError> {
        let disable_web_page_preview = options.disable_web_page_preview.then_some(true);
        match options.edit_message_id {
            Some(message_id) => {
                let edit = TelegramEdit {
                    chat_id,
                    message_id,
                    text: text.to_string(),
                    parse_mode: options.parse_mode,
                    disable_web_page_preview,
                };
                self.call("editMessageText", &edit).await
            }
            None => {
                let message = TelegramMessage {
                    chat_id,
                    text: text.to_string(),
                    parse_mode: options.parse_mode,
                    disable_web_page_preview,
                };
                self.call("sendMessage", &message).await
            }
        }
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        photo_url: &str,
        caption: &str,
    ) -> Result<(), DeliveryError> {
        let photo = TelegramPhoto {
            chat_id,
            photo: photo_url.to_string(),
            caption: caption.to_string(),
            parse_mode: super::types::ParseMode::Html,
        };
        self.call("sendPhoto", &photo).await
    }
}
