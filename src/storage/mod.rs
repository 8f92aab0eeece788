//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Run lifecycle records
//! - Closed URL records and their links
//! - Sitemap entries
//! - The batched writer the crawl stages publish through

mod schema;
mod sqlite;
mod traits;
mod writer;

pub(crate) use schema::initialize_schema;
pub(crate) use sqlite::open_connection;
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};
pub use writer::{BatchWriter, PersistenceHandle, WriteRequest, WriterStats};

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}
