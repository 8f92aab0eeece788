//! Statistics generation from crawl database
//!
//! This module provides functionality for extracting and displaying
//! per-run statistics from the storage layer.

use crate::state::{CrawlRun, CrawlStatus};
use crate::storage::{Storage, StorageError, StorageResult};
use std::collections::HashMap;

/// Stored statistics for one run
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    pub run: CrawlRun,

    /// Number of closed URLs persisted
    pub closed_urls: u64,

    /// Closed URLs grouped by the status that closed them
    pub urls_by_status: HashMap<CrawlStatus, u64>,

    /// Total number of link rows
    pub total_links: u64,

    /// Sitemap entries recorded for the run
    pub sitemap_entries: u64,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `run_id` - The run to report on; the latest run when `None`
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - No such run, or the query failed
pub fn load_statistics(storage: &dyn Storage, run_id: Option<&str>) -> StorageResult<CrawlStatistics> {
    let run = match run_id {
        Some(id) => storage.get_run(id)?,
        None => storage
            .get_latest_run()?
            .ok_or_else(|| StorageError::RunNotFound("no runs recorded".to_string()))?,
    };

    let closed_urls = storage.count_urls(&run.run_id)?;
    let urls_by_status = storage.count_urls_by_status(&run.run_id)?;
    let total_links = storage.count_links(&run.run_id)?;
    let sitemap_entries = storage.count_sitemap_entries(&run.run_id)?;

    Ok(CrawlStatistics {
        run,
        closed_urls,
        urls_by_status,
        total_links,
        sitemap_entries,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Run:");
    println!("  ID: {}", stats.run.run_id);
    println!("  Seed: {}", stats.run.seed_url);
    println!("  Status: {}", stats.run.status);
    println!("  Started: {}", stats.run.start_time.to_rfc3339());
    if let Some(end) = stats.run.end_time {
        println!("  Finished: {}", end.to_rfc3339());
    }
    println!("  Page budget: {}", stats.run.max_pages);
    println!();

    println!("Overview:");
    println!("  Closed URLs: {}", stats.closed_urls);
    println!("  Links recorded: {}", stats.total_links);
    println!("  Sitemap entries: {}", stats.sitemap_entries);
    println!();

    println!("URLs by Outcome:");
    let mut status_counts: Vec<_> = stats.urls_by_status.iter().collect();
    status_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (status, count) in status_counts {
        let percentage = if stats.closed_urls > 0 {
            (*count as f64 / stats.closed_urls as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
}
