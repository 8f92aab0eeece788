//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the sitecrawl database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    run_id TEXT PRIMARY KEY,
    seed_url TEXT NOT NULL,
    max_pages INTEGER NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT,
    status TEXT NOT NULL,
    config_hash TEXT
);

-- One row per closed URL
CREATE TABLE IF NOT EXISTS urls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL REFERENCES runs(run_id),
    seed_url TEXT NOT NULL,
    url TEXT NOT NULL,
    content TEXT,
    req_status INTEGER,
    crawl_status TEXT NOT NULL,
    closed_at TEXT NOT NULL,
    UNIQUE(run_id, url)
);

CREATE INDEX IF NOT EXISTS idx_urls_run_status ON urls(run_id, crawl_status);

-- Links discovered on each parsed page, in extraction order
CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL REFERENCES runs(run_id),
    from_url TEXT NOT NULL,
    to_url TEXT NOT NULL,
    position INTEGER NOT NULL,
    UNIQUE(run_id, from_url, to_url)
);

CREATE INDEX IF NOT EXISTS idx_links_from ON links(run_id, from_url);

-- Entries resolved from sitemaps
CREATE TABLE IF NOT EXISTS sitemaps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL REFERENCES runs(run_id),
    seed_url TEXT NOT NULL,
    url TEXT NOT NULL,
    index_url TEXT NOT NULL,
    loc TEXT,
    priority TEXT,
    frequency TEXT,
    modified TEXT,
    status TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sitemaps_run ON sitemaps(run_id);

-- Durable frontier: FIFO queue of URLs awaiting download
CREATE TABLE IF NOT EXISTS frontier_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL,
    url TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_frontier_queue_run ON frontier_queue(run_id, id);

-- Durable frontier: URLs ever requested for download
CREATE TABLE IF NOT EXISTS download_requests (
    run_id TEXT NOT NULL,
    url TEXT NOT NULL,
    PRIMARY KEY(run_id, url)
);

-- Durable frontier: URLs ever requested for parse
CREATE TABLE IF NOT EXISTS parse_requests (
    run_id TEXT NOT NULL,
    url TEXT NOT NULL,
    PRIMARY KEY(run_id, url)
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        let result = initialize_schema(&conn);
        assert!(result.is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        let result = initialize_schema(&conn);

        assert!(result.is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let tables = vec![
            "runs",
            "urls",
            "links",
            "sitemaps",
            "frontier_queue",
            "download_requests",
            "parse_requests",
        ];

        for table in tables {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}
