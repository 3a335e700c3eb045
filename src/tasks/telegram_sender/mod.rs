pub mod formatter;
pub mod runner;
pub mod types;
