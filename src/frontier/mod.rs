//! Frontier Store: the shared queue and dedup sets of a crawl run
//!
//! Three namespaces are kept per run:
//!
//! - `to_visit`: FIFO queue of URLs awaiting download
//! - `download_requested`: every URL ever pushed into `to_visit`
//! - `parse_requested`: every URL ever scheduled for parsing
//!
//! A URL enters `to_visit` at most once per run and is parsed at most once.

mod memory;
mod sqlite;

pub use memory::MemoryFrontier;
pub use sqlite::SqliteFrontier;

use crate::storage::StorageResult;

/// Trait for Frontier Store implementations
///
/// All operations are atomic with respect to each other; implementations are
/// shared between the download and parse loops behind an `Arc`.
pub trait FrontierStore: Send + Sync {
    /// Requests a download for `url`
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The URL was new; it is now queued in `to_visit`
    /// * `Ok(false)` - The URL was already requested in this run
    /// * `Err(StorageError)` - The backing store is unavailable (fatal)
    fn request_download(&self, url: &str) -> StorageResult<bool>;

    /// Requests a parse for `url`, deduplicated independently of downloads
    fn request_parse(&self, url: &str) -> StorageResult<bool>;

    /// Pops the oldest URL from `to_visit`, or `None` when it is empty
    fn next_to_visit(&self) -> StorageResult<Option<String>>;

    /// Number of URLs still waiting in `to_visit`
    fn pending(&self) -> StorageResult<usize>;
}
