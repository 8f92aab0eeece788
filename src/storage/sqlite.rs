//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{CrawlRun, CrawlStatus, SitemapEntry, UrlRecord};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = open_connection(path)?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn set_run_end(&mut self, run_id: &str, status: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, end_time = ?2 WHERE run_id = ?3",
            params![status, now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id.to_string()));
        }
        Ok(())
    }
}

/// Opens a connection configured for concurrent use by the crawler
///
/// Both the storage backend and the durable frontier open the same file, so
/// WAL mode and a busy timeout are always set.
pub(crate) fn open_connection(path: &Path) -> StorageResult<Connection> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;
    ",
    )?;
    conn.busy_timeout(BUSY_TIMEOUT)?;

    Ok(conn)
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<CrawlRun> {
    let start_time: String = row.get(3)?;
    let end_time: Option<String> = row.get(4)?;

    Ok(CrawlRun {
        run_id: row.get(0)?,
        seed_url: row.get(1)?,
        max_pages: row.get(2)?,
        start_time: start_time
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
        end_time: end_time.and_then(|t| t.parse::<DateTime<Utc>>().ok()),
        status: row.get(5)?,
        config_hash: row.get(6)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, run: &CrawlRun) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO runs (run_id, seed_url, max_pages, start_time, end_time, status, config_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(run_id) DO UPDATE SET
                seed_url = excluded.seed_url,
                max_pages = excluded.max_pages,
                start_time = excluded.start_time,
                end_time = NULL,
                status = excluded.status,
                config_hash = excluded.config_hash",
            params![
                run.run_id,
                run.seed_url,
                run.max_pages,
                run.start_time.to_rfc3339(),
                run.end_time.map(|t| t.to_rfc3339()),
                run.status,
                run.config_hash,
            ],
        )?;
        Ok(())
    }

    fn get_run(&self, run_id: &str) -> StorageResult<CrawlRun> {
        self.conn
            .query_row(
                "SELECT run_id, seed_url, max_pages, start_time, end_time, status, config_hash
                 FROM runs WHERE run_id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or_else(|| StorageError::RunNotFound(run_id.to_string()))
    }

    fn get_latest_run(&self) -> StorageResult<Option<CrawlRun>> {
        let run = self
            .conn
            .query_row(
                "SELECT run_id, seed_url, max_pages, start_time, end_time, status, config_hash
                 FROM runs ORDER BY start_time DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn complete_run(&mut self, run_id: &str) -> StorageResult<()> {
        self.set_run_end(run_id, "completed")
    }

    fn fail_run(&mut self, run_id: &str) -> StorageResult<()> {
        self.set_run_end(run_id, "failed")
    }

    // ===== URL Records =====

    fn upsert_urls(&mut self, records: &[UrlRecord]) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        {
            let mut insert_url = tx.prepare(
                "INSERT INTO urls (run_id, seed_url, url, content, req_status, crawl_status, closed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(run_id, url) DO UPDATE SET
                    content = excluded.content,
                    req_status = excluded.req_status,
                    crawl_status = excluded.crawl_status,
                    closed_at = excluded.closed_at",
            )?;
            let mut delete_links =
                tx.prepare("DELETE FROM links WHERE run_id = ?1 AND from_url = ?2")?;
            let mut insert_link = tx.prepare(
                "INSERT OR IGNORE INTO links (run_id, from_url, to_url, position)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;

            for record in records {
                insert_url.execute(params![
                    record.run_id,
                    record.seed_url,
                    record.url,
                    record.content,
                    record.request_status,
                    record.outcome().to_db_string(),
                    now,
                ])?;

                delete_links.execute(params![record.run_id, record.url])?;
                for (position, to_url) in record.linked_urls.iter().enumerate() {
                    insert_link.execute(params![
                        record.run_id,
                        record.url,
                        to_url,
                        position as i64
                    ])?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn get_url(&self, run_id: &str, url: &str) -> StorageResult<Option<UrlRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT seed_url, content, req_status, crawl_status
                 FROM urls WHERE run_id = ?1 AND url = ?2",
                params![run_id, url],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<u16>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((seed_url, content, request_status, status)) = row else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT to_url FROM links WHERE run_id = ?1 AND from_url = ?2 ORDER BY position ASC",
        )?;
        let linked_urls = stmt
            .query_map(params![run_id, url], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(Some(UrlRecord {
            url: url.to_string(),
            seed_url,
            run_id: run_id.to_string(),
            content,
            request_status,
            crawl_status: CrawlStatus::Closed,
            final_status: CrawlStatus::from_db_string(&status),
            linked_urls,
        }))
    }

    // ===== Sitemaps =====

    fn insert_sitemap_entries(
        &mut self,
        run_id: &str,
        seed_url: &str,
        entries: &[SitemapEntry],
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO sitemaps
                    (run_id, seed_url, url, index_url, loc, priority, frequency, modified, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;

            for entry in entries {
                stmt.execute(params![
                    run_id,
                    seed_url,
                    entry.source_sitemap_url,
                    entry.index_marker,
                    entry.loc,
                    entry.priority,
                    entry.frequency,
                    entry.modified,
                    entry.status,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    // ===== Statistics =====

    fn count_urls_by_status(&self, run_id: &str) -> StorageResult<HashMap<CrawlStatus, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT crawl_status, COUNT(*) FROM urls WHERE run_id = ?1 GROUP BY crawl_status",
        )?;

        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (status, count) = row?;
            if let Some(status) = CrawlStatus::from_db_string(&status) {
                counts.insert(status, count as u64);
            }
        }

        Ok(counts)
    }

    fn count_urls(&self, run_id: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM urls WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_links(&self, run_id: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM links WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_sitemap_entries(&self, run_id: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sitemaps WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ROOT_INDEX_MARKER;

    fn closed_record(url: &str, outcome: CrawlStatus, links: &[&str]) -> UrlRecord {
        let mut record = UrlRecord::new(url, "https://example.com/", "run_1");
        record.content = Some("<html></html>".to_string());
        record.request_status = Some(200);
        record.crawl_status = CrawlStatus::Closed;
        record.final_status = Some(outcome);
        record.linked_urls = links.iter().map(|s| s.to_string()).collect();
        record
    }

    fn storage_with_run() -> SqliteStorage {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .create_run(&CrawlRun::new("run_1", "https://example.com/", 10))
            .unwrap();
        storage
    }

    #[test]
    fn test_create_and_get_run() {
        let storage = storage_with_run();
        let run = storage.get_run("run_1").unwrap();
        assert_eq!(run.seed_url, "https://example.com/");
        assert_eq!(run.max_pages, 10);
        assert_eq!(run.status, "running");
        assert!(run.end_time.is_none());
    }

    #[test]
    fn test_get_missing_run() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(matches!(
            storage.get_run("nope"),
            Err(StorageError::RunNotFound(_))
        ));
    }

    #[test]
    fn test_complete_and_fail_run() {
        let mut storage = storage_with_run();
        storage.complete_run("run_1").unwrap();
        let run = storage.get_run("run_1").unwrap();
        assert_eq!(run.status, "completed");
        assert!(run.end_time.is_some());

        storage.fail_run("run_1").unwrap();
        assert_eq!(storage.get_run("run_1").unwrap().status, "failed");

        assert!(storage.complete_run("missing").is_err());
    }

    #[test]
    fn test_upsert_urls_with_links() {
        let mut storage = storage_with_run();
        let record = closed_record(
            "https://example.com/",
            CrawlStatus::Parsed,
            &["https://example.com/a", "https://example.com/b"],
        );
        storage.upsert_urls(&[record]).unwrap();

        let stored = storage
            .get_url("run_1", "https://example.com/")
            .unwrap()
            .unwrap();
        assert_eq!(stored.final_status, Some(CrawlStatus::Parsed));
        assert_eq!(stored.request_status, Some(200));
        assert_eq!(
            stored.linked_urls,
            vec!["https://example.com/a", "https://example.com/b"]
        );
        assert_eq!(storage.count_links("run_1").unwrap(), 2);
    }

    #[test]
    fn test_redelivered_record_is_deduplicated() {
        let mut storage = storage_with_run();
        let record = closed_record("https://example.com/", CrawlStatus::Parsed, &["https://example.com/a"]);

        storage.upsert_urls(&[record.clone()]).unwrap();
        storage.upsert_urls(&[record]).unwrap();

        assert_eq!(storage.count_urls("run_1").unwrap(), 1);
        assert_eq!(storage.count_links("run_1").unwrap(), 1);
    }

    #[test]
    fn test_count_urls_by_status() {
        let mut storage = storage_with_run();
        storage
            .upsert_urls(&[
                closed_record("https://example.com/", CrawlStatus::Parsed, &[]),
                closed_record("https://example.com/a", CrawlStatus::Parsed, &[]),
                closed_record("https://example.com/b", CrawlStatus::Error, &[]),
                closed_record("https://example.com/c", CrawlStatus::Disallowed, &[]),
            ])
            .unwrap();

        let counts = storage.count_urls_by_status("run_1").unwrap();
        assert_eq!(counts.get(&CrawlStatus::Parsed), Some(&2));
        assert_eq!(counts.get(&CrawlStatus::Error), Some(&1));
        assert_eq!(counts.get(&CrawlStatus::Disallowed), Some(&1));
        assert_eq!(storage.count_urls("run_1").unwrap(), 4);
    }

    #[test]
    fn test_insert_sitemap_entries() {
        let mut storage = storage_with_run();
        let entry = SitemapEntry {
            source_sitemap_url: "https://example.com/sitemap.xml".to_string(),
            index_marker: ROOT_INDEX_MARKER.to_string(),
            loc: Some("https://example.com/a".to_string()),
            priority: Some("0.8".to_string()),
            frequency: Some("daily".to_string()),
            modified: None,
            status: "Success".to_string(),
        };

        storage
            .insert_sitemap_entries("run_1", "https://example.com/", &[entry.clone(), entry])
            .unwrap();

        assert_eq!(storage.count_sitemap_entries("run_1").unwrap(), 2);
    }

    #[test]
    fn test_get_latest_run() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage.get_latest_run().unwrap().is_none());

        let storage = storage_with_run();
        let latest = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(latest.run_id, "run_1");
    }
}
