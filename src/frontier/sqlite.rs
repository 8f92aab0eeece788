use crate::frontier::FrontierStore;
use crate::storage::{initialize_schema, open_connection, StorageError, StorageResult};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Frontier Store kept in the crawl database
///
/// Queue and dedup sets survive the process, so a crashed run can be
/// inspected afterwards. Rows are scoped by `run_id`.
pub struct SqliteFrontier {
    conn: Mutex<Connection>,
    run_id: String,
}

impl SqliteFrontier {
    /// Opens (or creates) the frontier tables in the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `run_id` - The run whose frontier this store manages
    pub fn open(path: &Path, run_id: &str) -> StorageResult<Self> {
        let conn = open_connection(path)?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            run_id: run_id.to_string(),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl FrontierStore for SqliteFrontier {
    fn request_download(&self, url: &str) -> StorageResult<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO download_requests (run_id, url) VALUES (?1, ?2)",
            params![self.run_id, url],
        )?;
        if inserted == 1 {
            tx.execute(
                "INSERT INTO frontier_queue (run_id, url) VALUES (?1, ?2)",
                params![self.run_id, url],
            )?;
        }

        tx.commit()?;
        Ok(inserted == 1)
    }

    fn request_parse(&self, url: &str) -> StorageResult<bool> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO parse_requests (run_id, url) VALUES (?1, ?2)",
            params![self.run_id, url],
        )?;
        Ok(inserted == 1)
    }

    fn next_to_visit(&self) -> StorageResult<Option<String>> {
        let mut conn = self.lock()?;
        // Write lock before the SELECT; a writer commit in between would
        // otherwise leave the read snapshot stale (SQLITE_BUSY_SNAPSHOT)
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let next: Option<(i64, String)> = tx
            .query_row(
                "SELECT id, url FROM frontier_queue WHERE run_id = ?1 ORDER BY id ASC LIMIT 1",
                params![self.run_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        if let Some((id, _)) = &next {
            tx.execute("DELETE FROM frontier_queue WHERE id = ?1", params![id])?;
        }

        tx.commit()?;
        Ok(next.map(|(_, url)| url))
    }

    fn pending(&self) -> StorageResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM frontier_queue WHERE run_id = ?1",
            params![self.run_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_runs_are_isolated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("crawl.db");

        let first = SqliteFrontier::open(&path, "run_1").unwrap();
        let second = SqliteFrontier::open(&path, "run_2").unwrap();

        assert!(first.request_download("https://example.com/").unwrap());
        assert!(second.request_download("https://example.com/").unwrap());

        assert_eq!(first.pending().unwrap(), 1);
        assert_eq!(second.pending().unwrap(), 1);
    }

    #[test]
    fn test_pop_waits_for_concurrent_writer() {
        use crate::storage::open_connection;
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("crawl.db");

        let frontier = SqliteFrontier::open(&path, "run_1").unwrap();
        frontier.request_download("https://example.com/a").unwrap();
        frontier.request_download("https://example.com/b").unwrap();

        // Another connection holds the write lock and commits mid-pop
        let writer_path = path.clone();
        let (locked_tx, locked_rx) = mpsc::channel();
        let writer = thread::spawn(move || {
            let mut conn = open_connection(&writer_path).unwrap();
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .unwrap();
            tx.execute(
                "INSERT INTO download_requests (run_id, url) VALUES ('other', 'https://example.com/x')",
                [],
            )
            .unwrap();
            locked_tx.send(()).unwrap();
            thread::sleep(Duration::from_millis(150));
            tx.commit().unwrap();
        });

        locked_rx.recv().unwrap();
        assert_eq!(
            frontier.next_to_visit().unwrap().as_deref(),
            Some("https://example.com/a")
        );
        assert!(frontier.request_download("https://example.com/c").unwrap());
        writer.join().unwrap();

        assert_eq!(frontier.pending().unwrap(), 2);
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("crawl.db");

        {
            let frontier = SqliteFrontier::open(&path, "run_1").unwrap();
            frontier.request_download("https://example.com/a").unwrap();
            frontier.request_download("https://example.com/b").unwrap();
            frontier.next_to_visit().unwrap();
        }

        let frontier = SqliteFrontier::open(&path, "run_1").unwrap();
        assert!(!frontier.request_download("https://example.com/a").unwrap());
        assert_eq!(
            frontier.next_to_visit().unwrap().as_deref(),
            Some("https://example.com/b")
        );
    }
}
