use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseMode {
    #[serde(rename = "HTML")]
    Html,
}

/// Options for a text message. With `edit_message_id` set the existing message
/// is edited instead of a new one being sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextOptions {
    pub parse_mode: Option<ParseMode>,
    pub disable_web_page_preview: bool,
    pub edit_message_id: Option<i64>,
}

impl TextOptions {
    pub fn html() -> Self {
        Self {
            parse_mode: Some(ParseMode::Html),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_web_page_preview: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TelegramEdit {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_web_page_preview: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TelegramPhoto {
    pub chat_id: i64,
    pub photo: String,
    pub caption: String,
    pub parse_mode: ParseMode,
}

#[derive(Debug, Deserialize)]
pub struct TelegramResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_base_url: String,
}

impl TelegramConfig {
    pub fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base_url.trim_end_matches('/'),
            self.bot_token,
            method
        )
    }
}
