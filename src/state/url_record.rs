use crate::state::CrawlStatus;
use chrono::{DateTime, Local, Utc};

/// Index marker used for sitemap entries that were not reached through an index
pub const ROOT_INDEX_MARKER: &str = "root";

/// Everything known about one URL during a run
///
/// Records are created when a URL is first requested for download or parse
/// and are only mutated through the crawl tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlRecord {
    /// Absolute URL; identity key within a run
    pub url: String,

    /// The run's starting point
    pub seed_url: String,

    /// Identifier of the run this record belongs to
    pub run_id: String,

    /// Last fetched body
    pub content: Option<String>,

    /// Last HTTP status code
    pub request_status: Option<u16>,

    /// Current pipeline state
    pub crawl_status: CrawlStatus,

    /// The state that closed this URL (Parsed, Error or Disallowed)
    pub final_status: Option<CrawlStatus>,

    /// Links discovered when this URL was parsed, sorted
    pub linked_urls: Vec<String>,
}

impl UrlRecord {
    /// Creates a record for a URL that just entered the frontier
    pub fn new(url: impl Into<String>, seed_url: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            seed_url: seed_url.into(),
            run_id: run_id.into(),
            content: None,
            request_status: None,
            crawl_status: CrawlStatus::Frontier,
            final_status: None,
            linked_urls: Vec::new(),
        }
    }

    /// Returns the outcome to report for this record
    ///
    /// For closed records this is the status that closed them; otherwise the
    /// current status.
    pub fn outcome(&self) -> CrawlStatus {
        self.final_status.unwrap_or(self.crawl_status)
    }
}

/// Identity and budget of a single crawl invocation
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlRun {
    pub run_id: String,
    pub seed_url: String,
    pub max_pages: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// `running`, `completed` or `failed`
    pub status: String,
    pub config_hash: Option<String>,
}

impl CrawlRun {
    /// Creates a new run record starting now
    pub fn new(run_id: impl Into<String>, seed_url: impl Into<String>, max_pages: u32) -> Self {
        Self {
            run_id: run_id.into(),
            seed_url: seed_url.into(),
            max_pages,
            start_time: Utc::now(),
            end_time: None,
            status: "running".to_string(),
            config_hash: None,
        }
    }
}

/// One `<url>` element resolved from a sitemap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    /// The urlset document this entry was read from
    pub source_sitemap_url: String,

    /// The sitemap index that led to the source, or [`ROOT_INDEX_MARKER`]
    pub index_marker: String,

    pub loc: Option<String>,
    pub priority: Option<String>,
    pub frequency: Option<String>,
    pub modified: Option<String>,

    /// "Success" when `loc` is present, otherwise a short error code
    pub status: String,
}

/// Builds a run identifier from the local start time
///
/// Format: `YYYY_MM_DD_HH_MM_SS`
pub fn new_run_id() -> String {
    Local::now().format("%Y_%m_%d_%H_%M_%S").to_string()
}
