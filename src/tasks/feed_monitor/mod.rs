pub mod fetcher;
pub mod matcher;
pub mod runner;
pub mod stats;
pub mod types;
