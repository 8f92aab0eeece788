use serde::Deserialize;

/// Main configuration structure for a crawl
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Stop after this many URLs have been closed
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Attempts per download for transient failures
    pub retries: u32,

    /// Poll interval between frontier checks (milliseconds)
    #[serde(rename = "check-every-ms")]
    pub check_every_ms: u64,

    /// Consecutive empty polls before a loop treats its input as exhausted
    #[serde(rename = "max-idle-polls")]
    pub max_idle_polls: u32,

    /// Capacity of the download -> parse channel
    #[serde(rename = "channel-capacity")]
    pub channel_capacity: usize,

    /// Per-request HTTP timeout (milliseconds)
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,

    /// Maximum nesting of sitemap indexes
    #[serde(rename = "max-sitemap-depth")]
    pub max_sitemap_depth: u32,

    /// Upper bound on a robots.txt crawl-delay we are willing to honor (milliseconds)
    #[serde(rename = "max-crawl-delay-ms")]
    pub max_crawl_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: 10,
            retries: 3,
            check_every_ms: 500,
            max_idle_polls: 25,
            channel_capacity: 20,
            request_timeout_ms: 1000,
            max_sitemap_depth: 10,
            max_crawl_delay_ms: 10_000,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "sitecrawl".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://github.com/sitecrawl/sitecrawl".to_string(),
            contact_email: "crawler@sitecrawl.dev".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Which Frontier Store implementation backs a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontierBackend {
    /// Process-local queue and sets
    Memory,
    /// Durable queue and sets in the crawl database
    Sqlite,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Frontier Store backend
    pub frontier: FrontierBackend,

    /// Rows buffered per table before the writer flushes
    #[serde(rename = "batch-size")]
    pub batch_size: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "sitecrawl.db".to_string(),
            frontier: FrontierBackend::Sqlite,
            batch_size: 4,
        }
    }
}
