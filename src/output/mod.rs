//! Output module for operator-facing reports
//!
//! This module handles:
//! - Crawl statistics: source progress and game counts
//! - Status reports: storage and queue connectivity plus the pause flag

pub mod stats;
mod status;

pub use stats::{load_statistics, print_statistics, CrawlStatistics, SourceProgress};
pub use status::{check_status, Health, StatusReport};
