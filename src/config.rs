use crate::tasks::types::DEFAULT_CYCLE_INTERVAL;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
const DEFAULT_DATABASE_URL: &str = "feedpush.db";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bot_token: String,
    pub telegram_api_url: String,
    pub database_url: String,
    pub cycle_interval: Duration,
    pub proxy_url: Option<String>,
    /// 0 when no admin is configured
    pub admin_id: i64,
    pub push_endpoint: Option<String>,
    pub max_concurrent_feeds: usize,
    pub suppress_first_burst: bool,
    pub http_timeout: Duration,
    pub port: u16,
    /// admin API is only served when this is set
    pub api_token: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = get("FP_BOT_TOKEN").ok_or(ConfigError::Missing("FP_BOT_TOKEN"))?;
        let cycle_minutes: u64 = parse(&get, "FP_CYCLE_MINUTES")?
            .unwrap_or(DEFAULT_CYCLE_INTERVAL.as_secs() / 60);
        if cycle_minutes == 0 {
            return Err(ConfigError::Invalid {
                key: "FP_CYCLE_MINUTES",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let timeout_secs: u64 = parse(&get, "FP_HTTP_TIMEOUT_SECS")?.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);

        Ok(Self {
            bot_token,
            telegram_api_url: get("FP_TELEGRAM_API_URL")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
            database_url: get("FP_DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            cycle_interval: Duration::from_secs(cycle_minutes * 60),
            proxy_url: get("FP_PROXY_URL"),
            admin_id: parse(&get, "FP_ADMIN_ID")?.unwrap_or(0),
            push_endpoint: get("FP_PUSH_ENDPOINT"),
            max_concurrent_feeds: parse(&get, "FP_MAX_CONCURRENT_FEEDS")?.unwrap_or(0),
            suppress_first_burst: parse_flag(&get, "FP_SUPPRESS_FIRST_BURST")?.unwrap_or(false),
            http_timeout: Duration::from_secs(timeout_secs.max(1)),
            port: parse(&get, "FP_PORT")?.unwrap_or(DEFAULT_PORT),
            api_token: get("FP_API_TOKEN"),
        })
    }

    pub fn log_summary(&self) {
        tracing::info!(
            database = %self.database_url,
            cycle_minutes = self.cycle_interval.as_secs() / 60,
            proxy = self.proxy_url.is_some(),
            admin = self.admin_id != 0,
            push_endpoint = self.push_endpoint.is_some(),
            max_concurrent_feeds = self.max_concurrent_feeds,
            suppress_first_burst = self.suppress_first_burst,
            api = self.api_token.is_some(),
            "configuration loaded"
        );
    }
}

fn parse<T, G>(get: &G, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|value| {
            value.parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

fn parse_flag<G>(get: &G, key: &'static str) -> Result<Option<bool>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|value| match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                value,
                reason: "expected true or false".to_string(),
            }),
        })
        .transpose()
}
