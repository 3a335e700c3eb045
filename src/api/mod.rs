pub mod health;
pub mod keywords;
pub mod routes;
pub mod stats;
pub mod subscriptions;
pub mod users;

use crate::db::Store;
use crate::tasks::feed_monitor::stats::PushStatsTracker;
use actix_web::web;
use std::sync::Arc;

/// Shared by every handler.
pub struct AppState {
    pub store: Arc<Store>,
    pub stats: Arc<PushStatsTracker>,
    /// used to check that a URL serves a feed before subscribing
    pub client: reqwest::Client,
    pub suppress_first_burst: bool,
    pub api_token: String,
}

pub type RqState = web::Data<AppState>;
