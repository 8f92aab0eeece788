//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests with retry for transient failures
//! - The Downloader, which adds the politeness check and reports every
//!   outcome to the crawl tracker

use crate::config::UserAgentConfig;
use crate::crawler::tracker::{CrawlTracker, UrlUpdate};
use crate::robots::PolitenessGate;
use crate::state::{CrawlStatus, HostState};
use crate::url::site_key;
use crate::{CrawlError, Result};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use url::Url;

/// Pause between attempts of a transient failure
const RETRY_PAUSE: Duration = Duration::from_millis(200);

/// Status recorded when robots.txt denies a URL
pub const DISALLOWED_STATUS: u16 = 403;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: String,
    /// HTTP status code
    pub status: u16,
    /// Page body
    pub body: String,
}

/// Result of a Downloader fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Body text; `None` when the URL was disallowed
    pub content: Option<String>,
    pub status: u16,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Per-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use sitecrawl::config::UserAgentConfig;
/// use sitecrawl::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(1)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL once
///
/// Non-2xx responses are errors carrying their status code.
pub async fn fetch_page(client: &Client, url: &str) -> Result<FetchedPage> {
    let response = client.get(url).send().await.map_err(|e| classify(url, e))?;

    let status = response.status();
    let final_url = response.url().to_string();

    if !status.is_success() {
        return Err(CrawlError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.text().await.map_err(|e| classify(url, e))?;

    Ok(FetchedPage {
        final_url,
        status: status.as_u16(),
        body,
    })
}

/// Fetches a URL, retrying transient failures
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 5xx | Retry |
/// | Timeout | Retry |
/// | Connection failure | Retry |
/// | HTTP 4xx (incl. 404, 429) | Fail immediately |
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
/// * `attempts` - Total attempts, at least one
pub async fn fetch_with_retry(client: &Client, url: &str, attempts: u32) -> Result<FetchedPage> {
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match fetch_page(client, url).await {
            Ok(page) => return Ok(page),
            Err(e) if attempt < attempts && is_transient(&e) => {
                tracing::debug!(
                    "Attempt {}/{} for {} failed: {}",
                    attempt,
                    attempts,
                    url,
                    e
                );
                attempt += 1;
                tokio::time::sleep(RETRY_PAUSE).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn classify(url: &str, error: reqwest::Error) -> CrawlError {
    if error.is_timeout() {
        CrawlError::Timeout {
            url: url.to_string(),
        }
    } else {
        CrawlError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}

/// Returns true if a failed fetch is worth repeating
fn is_transient(error: &CrawlError) -> bool {
    match error {
        CrawlError::Timeout { .. } => true,
        CrawlError::HttpStatus { status, .. } => *status >= 500,
        CrawlError::Http { source, .. } => source.is_connect() || source.is_request(),
        _ => false,
    }
}

/// Fetches page bodies, applying the politeness gate
///
/// Every call to [`Downloader::fetch`] makes exactly one status report to the
/// tracker: `Disallowed`, `Error` or `Downloaded`.
pub struct Downloader {
    client: Client,
    gate: Arc<PolitenessGate>,
    tracker: Arc<CrawlTracker>,
    retries: u32,
    max_crawl_delay: Duration,
    hosts: Mutex<HashMap<String, HostState>>,
}

impl Downloader {
    /// Creates a new downloader
    ///
    /// # Arguments
    ///
    /// * `client` - The HTTP client to use
    /// * `gate` - Politeness gate consulted before every fetch
    /// * `tracker` - Where outcomes are reported
    /// * `retries` - Attempts per fetch for transient failures
    /// * `max_crawl_delay` - Upper bound on honored robots.txt delays
    pub fn new(
        client: Client,
        gate: Arc<PolitenessGate>,
        tracker: Arc<CrawlTracker>,
        retries: u32,
        max_crawl_delay: Duration,
    ) -> Self {
        Self {
            client,
            gate,
            tracker,
            retries,
            max_crawl_delay,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Fetches a URL and reports the outcome
    ///
    /// # Returns
    ///
    /// * `Ok(FetchOutcome)` - Downloaded, or disallowed with status 403 and no content
    /// * `Err(CrawlError)` - The fetch failed; the URL has been closed as `Error`.
    ///   Storage errors from the report itself are fatal and returned as-is.
    pub async fn fetch(&self, url: &str) -> Result<FetchOutcome> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.tracker.update_status(url, CrawlStatus::Error, None)?;
                return Err(e.into());
            }
        };

        if !self.gate.can_fetch(&parsed).await {
            tracing::info!("URL {} disallowed by robots.txt", url);
            self.tracker
                .update_status(url, CrawlStatus::Disallowed, Some(DISALLOWED_STATUS))?;
            return Ok(FetchOutcome {
                content: None,
                status: DISALLOWED_STATUS,
            });
        }

        self.wait_for_host(&parsed).await;

        match fetch_with_retry(&self.client, url, self.retries).await {
            Ok(page) => {
                if page.final_url != url {
                    tracing::debug!("{} redirected to {}", url, page.final_url);
                }
                tracing::debug!("Downloaded {} ({})", url, page.status);
                self.tracker.update_url(
                    url,
                    UrlUpdate {
                        content: Some(page.body.clone()),
                        ..Default::default()
                    },
                )?;
                self.tracker
                    .update_status(url, CrawlStatus::Downloaded, Some(page.status))?;
                Ok(FetchOutcome {
                    content: Some(page.body),
                    status: page.status,
                })
            }
            Err(e) => {
                self.tracker
                    .update_status(url, CrawlStatus::Error, e.status_code())?;
                Err(e)
            }
        }
    }

    /// Sleeps until the host's robots.txt delay has passed since the last request
    async fn wait_for_host(&self, url: &Url) {
        let Some(key) = site_key(url) else {
            return;
        };

        let interval = self
            .gate
            .politeness_info(url)
            .await
            .min_interval()
            .map(|d| d.min(self.max_crawl_delay));

        let wait = {
            let Ok(mut hosts) = self.hosts.lock() else {
                return;
            };
            let host = hosts.entry(key).or_default();
            let now = Instant::now();
            let wait = interval.and_then(|i| host.time_until_next_request(i, now));
            // Reserve the slot so concurrent callers queue behind it
            host.record_request(now + wait.unwrap_or_default());
            wait
        };

        if let Some(wait) = wait {
            tracing::debug!("Waiting {:?} before requesting {}", wait, url);
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontier::MemoryFrontier;
    use crate::storage::{PersistenceHandle, WriteRequest};
    use tokio::sync::mpsc::UnboundedReceiver;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client() -> Client {
        build_http_client(&UserAgentConfig::default(), Duration::from_secs(2)).unwrap()
    }

    async fn mount_robots(server: &MockServer, body: &str) {
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    fn downloader(tracker: Arc<CrawlTracker>) -> Downloader {
        let client = test_client();
        Downloader::new(
            client.clone(),
            Arc::new(PolitenessGate::new(client)),
            tracker,
            3,
            Duration::from_secs(1),
        )
    }

    fn tracker() -> (Arc<CrawlTracker>, UnboundedReceiver<WriteRequest>) {
        let (persistence, rx) = PersistenceHandle::detached();
        let tracker = Arc::new(CrawlTracker::new(
            Arc::new(MemoryFrontier::new()),
            persistence,
            "run_1",
            "http://localhost/",
            10,
        ));
        (tracker, rx)
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(1));
        assert!(client.is_ok());
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient(&CrawlError::Timeout { url: "u".into() }));
        assert!(is_transient(&CrawlError::HttpStatus { url: "u".into(), status: 503 }));
        assert!(!is_transient(&CrawlError::HttpStatus { url: "u".into(), status: 404 }));
        assert!(!is_transient(&CrawlError::HttpStatus { url: "u".into(), status: 429 }));
    }

    #[tokio::test]
    async fn test_fetch_page_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>hi</html>"))
            .mount(&server)
            .await;

        let page = fetch_page(&test_client(), &format!("{}/page", server.uri()))
            .await
            .unwrap();
        assert_eq!(page.status, 200);
        assert_eq!(page.body, "<html>hi</html>");
    }

    #[tokio::test]
    async fn test_fetch_page_reports_redirect_target() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
            .mount(&server)
            .await;

        let page = fetch_page(&test_client(), &format!("{}/old", server.uri()))
            .await
            .unwrap();
        assert_eq!(page.final_url, format!("{}/new", server.uri()));
        assert_eq!(page.body, "moved");
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let result = fetch_with_retry(&test_client(), &format!("{}/flaky", server.uri()), 3).await;
        assert_eq!(result.unwrap_err().status_code(), Some(503));
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let result = fetch_with_retry(&test_client(), &format!("{}/missing", server.uri()), 3).await;
        assert_eq!(result.unwrap_err().status_code(), Some(404));
    }

    #[tokio::test]
    async fn test_downloader_reports_downloaded() {
        let server = MockServer::start().await;
        mount_robots(&server, "User-agent: *\nAllow: /").await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("body"))
            .mount(&server)
            .await;

        let (tracker, _rx) = tracker();
        let url = format!("{}/page", server.uri());
        tracker.request_download(&url).unwrap();

        let outcome = downloader(tracker.clone()).fetch(&url).await.unwrap();
        assert_eq!(outcome.content.as_deref(), Some("body"));
        assert_eq!(outcome.status, 200);

        let record = tracker.record(&url).unwrap().unwrap();
        assert_eq!(record.crawl_status, CrawlStatus::Downloaded);
        assert_eq!(record.request_status, Some(200));
        assert_eq!(record.content.as_deref(), Some("body"));
    }

    #[tokio::test]
    async fn test_downloader_reports_disallowed() {
        let server = MockServer::start().await;
        mount_robots(&server, "User-agent: *\nDisallow: /secret").await;
        Mock::given(method("GET"))
            .and(path("/secret"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (tracker, _rx) = tracker();
        let url = format!("{}/secret", server.uri());
        tracker.request_download(&url).unwrap();

        let outcome = downloader(tracker.clone()).fetch(&url).await.unwrap();
        assert_eq!(outcome, FetchOutcome { content: None, status: 403 });
        assert_eq!(tracker.status_of(&url).unwrap(), Some(CrawlStatus::Closed));
        assert_eq!(tracker.snapshot().unwrap().disallowed, 1);
    }

    #[tokio::test]
    async fn test_downloader_reports_error_and_closes() {
        let server = MockServer::start().await;
        mount_robots(&server, "").await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (tracker, _rx) = tracker();
        let url = format!("{}/gone", server.uri());
        tracker.request_download(&url).unwrap();

        let err = downloader(tracker.clone()).fetch(&url).await.unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(tracker.completed_pages().unwrap(), 1);
    }
}
