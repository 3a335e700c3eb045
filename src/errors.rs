use crate::db::StoreError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Failure while retrieving or parsing one feed. Only that feed is affected.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
    #[error("feed could not be parsed: {0}")]
    Parse(#[from] feed_rs::parser::ParseFeedError),
    #[error("invalid feed url: {0}")]
    InvalidUrl(String),
    #[error("response does not look like a feed")]
    NotAFeed,
}

/// Failure handing a notification to the messaging transport.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("telegram rejected the request ({status}): {description}")]
    Api { status: u16, description: String },
    #[error("push endpoint returned {0}")]
    Mirror(u16),
}

/// Errors surfaced by the admin API
#[derive(Debug)]
pub enum AppError {
    // Validation Errors
    InvalidInput { field: String, message: String },
    ResourceNotFound { resource: String },

    // Feed-related Errors
    FeedAlreadySubscribed,
    FeedUnreachable,
    FeedInvalid,

    // Database Errors
    DatabaseError,
    ConnectionPoolError,

    // System Errors
    InternalError,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidInput { field, message } => write!(f, "Invalid {}: {}", field, message),
            AppError::ResourceNotFound { resource } => write!(f, "{} not found", resource),

            AppError::FeedAlreadySubscribed => write!(f, "Already subscribed to this feed"),
            AppError::FeedUnreachable => write!(f, "Feed not found or inaccessible"),
            AppError::FeedInvalid => write!(f, "URL does not serve an RSS or Atom feed"),

            AppError::DatabaseError => write!(f, "A database error occurred - please try again"),
            AppError::ConnectionPoolError => write!(f, "Service temporarily unavailable - please try again"),

            AppError::InternalError => write!(f, "An unexpected error occurred - please try again"),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput { .. } | AppError::FeedAlreadySubscribed | AppError::FeedInvalid => {
                StatusCode::BAD_REQUEST
            }
            AppError::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::FeedUnreachable => StatusCode::BAD_GATEWAY,
            AppError::ConnectionPoolError => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DatabaseError | AppError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_code = match self {
            AppError::InvalidInput { .. } => "INVALID_INPUT",
            AppError::ResourceNotFound { .. } => "RESOURCE_NOT_FOUND",
            AppError::FeedAlreadySubscribed => "FEED_ALREADY_SUBSCRIBED",
            AppError::FeedUnreachable => "FEED_UNREACHABLE",
            AppError::FeedInvalid => "FEED_INVALID",
            AppError::DatabaseError => "DATABASE_ERROR",
            AppError::ConnectionPoolError => "CONNECTION_POOL_ERROR",
            AppError::InternalError => "INTERNAL_ERROR",
        };

        if self.status_code().is_server_error() {
            log::error!("Server error: {:?}", self);
        } else {
            log::info!("Client error: {:?}", self);
        }

        HttpResponse::build(self.status_code()).json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string()
            }
        }))
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn invalid_input(field: &str, message: &str) -> Self {
        AppError::InvalidInput {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn resource_not_found(resource: &str) -> Self {
        AppError::ResourceNotFound {
            resource: resource.to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Pool(_) | StoreError::Unavailable(_) => {
                log::error!("Database connection error: {}", err);
                AppError::ConnectionPoolError
            }
            StoreError::Query(diesel::result::Error::NotFound) => AppError::resource_not_found("Record"),
            StoreError::Query(_) | StoreError::Migration(_) | StoreError::Encoding(_) => {
                log::error!("Database error: {}", err);
                AppError::DatabaseError
            }
            StoreError::Task(_) => {
                log::error!("Storage task error: {}", err);
                AppError::InternalError
            }
        }
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(err: diesel::result::Error) -> Self {
        StoreError::from(err).into()
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        log::warn!("Feed validation failed: {}", err);
        match err {
            FetchError::InvalidUrl(_) => AppError::invalid_input("url", "Must be an http or https URL"),
            FetchError::NotAFeed | FetchError::Parse(_) => AppError::FeedInvalid,
            FetchError::Network(_) | FetchError::Status(_) => AppError::FeedUnreachable,
        }
    }
}
