use actix_web::web;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct UserPath {
    pub user_id: i64,
}

pub type RqUserPath = web::Path<UserPath>;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UserStats {
    pub user_id: i64,
    pub subscriptions: usize,
    pub keywords: usize,
    /// today's push statistics across all feeds
    pub push_summary: String,
}
