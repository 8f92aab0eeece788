//! Output module for reporting crawl results
//!
//! This module handles:
//! - The summary returned at the end of a run
//! - Per-run statistics read back from the crawl database

pub mod stats;
mod summary;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};
pub use summary::CrawlSummary;
