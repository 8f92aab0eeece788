//! Batched persistence writer
//!
//! Crawl stages never touch the database directly. They publish write
//! requests through a [`PersistenceHandle`]; a single writer task buffers them
//! per table and flushes in batches, retrying transient storage failures.

use crate::state::{SitemapEntry, UrlRecord};
use crate::storage::{SqliteStorage, Storage, StorageError, StorageResult};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Attempts per flush before the writer gives up
pub const FLUSH_ATTEMPTS: u32 = 3;

/// Pause between flush attempts
pub const FLUSH_BACKOFF: Duration = Duration::from_millis(500);

/// A single write request sent to the writer task
#[derive(Debug, Clone)]
pub enum WriteRequest {
    /// A closed URL record (upserted into `urls`, with its `links`)
    Url(UrlRecord),

    /// Entries resolved by the sitemap mapper
    Sitemaps {
        run_id: String,
        seed_url: String,
        entries: Vec<SitemapEntry>,
    },
}

/// Cloneable sending side of the persistence channel
#[derive(Debug, Clone)]
pub struct PersistenceHandle {
    tx: mpsc::UnboundedSender<WriteRequest>,
}

impl PersistenceHandle {
    /// Publishes a closed URL record
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The request was queued
    /// * `Err(StorageError::ChannelClosed)` - The writer task has stopped
    pub fn publish_url(&self, record: UrlRecord) -> StorageResult<()> {
        self.send(WriteRequest::Url(record))
    }

    /// Publishes resolved sitemap entries
    pub fn publish_sitemap_entries(
        &self,
        run_id: &str,
        seed_url: &str,
        entries: Vec<SitemapEntry>,
    ) -> StorageResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.send(WriteRequest::Sitemaps {
            run_id: run_id.to_string(),
            seed_url: seed_url.to_string(),
            entries,
        })
    }

    fn send(&self, request: WriteRequest) -> StorageResult<()> {
        self.tx
            .send(request)
            .map_err(|_| StorageError::ChannelClosed)
    }

    /// Creates a handle whose requests are collected by the caller (for testing)
    #[cfg(test)]
    pub fn detached() -> (Self, mpsc::UnboundedReceiver<WriteRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

/// Counts of rows written by a finished writer task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub urls_written: u64,
    pub sitemap_entries_written: u64,
    pub flushes: u64,
}

/// Buffers write requests per table and flushes them in batches
pub struct BatchWriter {
    storage: Arc<Mutex<SqliteStorage>>,
    batch_size: usize,
    urls: Vec<UrlRecord>,
    sitemaps: Vec<(String, String, Vec<SitemapEntry>)>,
    pending_sitemap_entries: usize,
    stats: WriterStats,
}

impl BatchWriter {
    /// Creates a new writer over the given storage
    pub fn new(storage: Arc<Mutex<SqliteStorage>>, batch_size: usize) -> Self {
        Self {
            storage,
            batch_size: batch_size.max(1),
            urls: Vec::new(),
            sitemaps: Vec::new(),
            pending_sitemap_entries: 0,
            stats: WriterStats::default(),
        }
    }

    /// Spawns the writer task
    ///
    /// The task runs until every [`PersistenceHandle`] is dropped, then
    /// flushes whatever is still buffered. A flush that fails
    /// [`FLUSH_ATTEMPTS`] times ends the task with the storage error.
    pub fn spawn(self) -> (PersistenceHandle, JoinHandle<StorageResult<WriterStats>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.run(rx));
        (PersistenceHandle { tx }, handle)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<WriteRequest>) -> StorageResult<WriterStats> {
        while let Some(request) = rx.recv().await {
            match request {
                WriteRequest::Url(record) => {
                    self.urls.push(record);
                    if self.urls.len() >= self.batch_size {
                        self.flush_urls().await?;
                    }
                }
                WriteRequest::Sitemaps {
                    run_id,
                    seed_url,
                    entries,
                } => {
                    self.pending_sitemap_entries += entries.len();
                    self.sitemaps.push((run_id, seed_url, entries));
                    if self.pending_sitemap_entries >= self.batch_size {
                        self.flush_sitemaps().await?;
                    }
                }
            }
        }

        self.flush_urls().await?;
        self.flush_sitemaps().await?;

        tracing::debug!(
            "Persistence writer finished: {} urls, {} sitemap entries, {} flushes",
            self.stats.urls_written,
            self.stats.sitemap_entries_written,
            self.stats.flushes
        );

        Ok(self.stats)
    }

    async fn flush_urls(&mut self) -> StorageResult<()> {
        if self.urls.is_empty() {
            return Ok(());
        }

        let batch = std::mem::take(&mut self.urls);
        with_retry(&self.storage, "urls", |storage| storage.upsert_urls(&batch)).await?;

        self.stats.urls_written += batch.len() as u64;
        self.stats.flushes += 1;
        Ok(())
    }

    async fn flush_sitemaps(&mut self) -> StorageResult<()> {
        if self.sitemaps.is_empty() {
            return Ok(());
        }

        let batch = std::mem::take(&mut self.sitemaps);
        self.pending_sitemap_entries = 0;
        with_retry(&self.storage, "sitemaps", |storage| {
            for (run_id, seed_url, entries) in &batch {
                storage.insert_sitemap_entries(run_id, seed_url, entries)?;
            }
            Ok(())
        })
        .await?;

        self.stats.sitemap_entries_written +=
            batch.iter().map(|(_, _, e)| e.len() as u64).sum::<u64>();
        self.stats.flushes += 1;
        Ok(())
    }
}

/// Runs a storage operation, retrying with a fixed backoff
async fn with_retry<F>(
    storage: &Arc<Mutex<SqliteStorage>>,
    table: &str,
    mut op: F,
) -> StorageResult<()>
where
    F: FnMut(&mut SqliteStorage) -> StorageResult<()>,
{
    let mut attempt = 1;
    loop {
        let result = {
            let mut guard = storage.lock().map_err(|_| StorageError::LockPoisoned)?;
            op(&mut guard)
        };

        match result {
            Ok(()) => return Ok(()),
            Err(e) if attempt < FLUSH_ATTEMPTS => {
                tracing::warn!(
                    "Flush of {} failed (attempt {}/{}): {}",
                    table,
                    attempt,
                    FLUSH_ATTEMPTS,
                    e
                );
                attempt += 1;
                tokio::time::sleep(FLUSH_BACKOFF).await;
            }
            Err(e) => {
                tracing::error!("Giving up on {} flush after {} attempts: {}", table, attempt, e);
                return Err(e);
            }
        }
    }
}
