//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - The crawl tracker (per-URL state machine and page budget)
//! - HTTP fetching with retry logic and the politeness-aware downloader
//! - HTML parsing and link extraction
//! - Sitemap resolution
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod parser;
mod sitemap;
mod tracker;

pub use coordinator::Coordinator;
pub use fetcher::{
    build_http_client, fetch_page, fetch_with_retry, Downloader, FetchOutcome, FetchedPage,
    DISALLOWED_STATUS,
};
pub use parser::{extract_links, LinkExtractor};
pub use sitemap::{parse_sitemap, SitemapDocument, SitemapMapper, SitemapResolution, UrlElement};
pub use tracker::{CrawlTracker, NextPage, TrackerSnapshot, UrlUpdate};

use crate::config::Config;
use crate::output::CrawlSummary;
use crate::Result;

/// Runs a complete crawl of one site
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Record the run in the crawl database
/// 2. Seed the frontier from the sitemap or the seed URL
/// 3. Download pages and follow same-site links
/// 4. Stop at the page budget or when the frontier runs dry
///
/// # Example
///
/// ```no_run
/// use sitecrawl::config::Config;
/// use sitecrawl::crawler::crawl;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let summary = crawl(Config::default(), "https://example.com/").await?;
/// println!("{}", summary);
/// # Ok(())
/// # }
/// ```
pub async fn crawl(config: Config, seed_url: &str) -> Result<CrawlSummary> {
    Coordinator::new(config, seed_url)?.run().await
}
