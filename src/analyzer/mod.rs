//! Analyzer module for ranger log parsing and packet correlation.
//!
//! Provides functionality for:
//! - Parsing `csv-log:` lines into typed records
//! - Bucketing records per receiver, sender and RF descriptor
//! - Average RSSI and packet loss per link

pub mod link_stats;
pub mod log_loader;
pub mod log_parser;
pub mod receiver;
pub mod task;
pub mod types;

pub use task::{Analysis, LinkSummary, analyze_files};
pub use types::LogRecord;
