pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod http;
pub mod models;
pub mod observability;
pub mod schema;
pub mod tasks;
pub mod telegram;
#[cfg(test)]
pub mod test_helpers;

pub use api::{AppState, RqState};
pub use db::{DbPool, Store};
