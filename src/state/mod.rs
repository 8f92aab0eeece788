//! State module for tracking crawl progress
//!
//! This module provides the data model shared by every stage of a run.
//!
//! # Components
//!
//! - `CrawlStatus`: The per-URL pipeline state (frontier, downloaded, parsed, ...)
//! - `UrlRecord`: Everything known about one URL during a run
//! - `CrawlRun`: Identity and budget of a single crawl invocation
//! - `SitemapEntry`: One `<url>` element resolved from a sitemap
//! - `HostState`: Per-host request timing used to honor crawl delays

mod crawl_status;
mod host_state;
mod url_record;

// Re-export main types
pub use crawl_status::CrawlStatus;
pub use host_state::HostState;
pub use url_record::{new_run_id, CrawlRun, SitemapEntry, UrlRecord, ROOT_INDEX_MARKER};
