//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{CrawlRun, CrawlStatus, SitemapEntry, UrlRecord};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Persistence channel closed")]
    ChannelClosed,

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the crawler.
/// Writes are idempotent per `(run_id, url)` so re-delivered records are safe.
pub trait Storage {
    // ===== Run Management =====

    /// Records the start of a crawl run
    fn create_run(&mut self, run: &CrawlRun) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: &str) -> StorageResult<CrawlRun>;

    /// Gets the most recently started run
    fn get_latest_run(&self) -> StorageResult<Option<CrawlRun>>;

    /// Marks a run as completed with an end timestamp
    fn complete_run(&mut self, run_id: &str) -> StorageResult<()>;

    /// Marks a run as failed with an end timestamp
    fn fail_run(&mut self, run_id: &str) -> StorageResult<()>;

    // ===== URL Records =====

    /// Inserts or replaces closed URL records and their links
    ///
    /// All records are written in one transaction.
    fn upsert_urls(&mut self, records: &[UrlRecord]) -> StorageResult<()>;

    /// Gets the stored record for a URL in a run
    fn get_url(&self, run_id: &str, url: &str) -> StorageResult<Option<UrlRecord>>;

    // ===== Sitemaps =====

    /// Appends resolved sitemap entries for a run
    fn insert_sitemap_entries(
        &mut self,
        run_id: &str,
        seed_url: &str,
        entries: &[SitemapEntry],
    ) -> StorageResult<()>;

    // ===== Statistics =====

    /// Counts closed URLs in a run grouped by the status that closed them
    fn count_urls_by_status(&self, run_id: &str) -> StorageResult<HashMap<CrawlStatus, u64>>;

    /// Counts closed URLs in a run
    fn count_urls(&self, run_id: &str) -> StorageResult<u64>;

    /// Counts link rows in a run
    fn count_links(&self, run_id: &str) -> StorageResult<u64>;

    /// Counts sitemap entries in a run
    fn count_sitemap_entries(&self, run_id: &str) -> StorageResult<u64>;
}
