use crate::models::subscription::Subscription;
use actix_web::web;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionCreate {
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub channel: bool,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    /// "created" or "joined"
    pub status: &'static str,
    pub subscription: Subscription,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionPath {
    pub user_id: i64,
    pub name: String,
}

pub type RqSubPath = web::Path<SubscriptionPath>;
