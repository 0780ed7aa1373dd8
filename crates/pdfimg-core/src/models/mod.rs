//! Data models: run report and persisted preferences.

pub mod config;
pub mod report;
