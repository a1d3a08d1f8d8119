//! Engagement scoring engine and CSV analytics ingestion for social-media exports.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
