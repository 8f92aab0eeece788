//! Politeness Gate: robots.txt fetching, parsing and caching
//!
//! Every decision is made against the wildcard (`*`) group. Any failure to
//! obtain robots.txt falls back to allowing the fetch, logged as a warning.

mod cache;
mod parser;

pub use cache::CachedRobots;
pub use parser::{ParsedRobots, RequestRate};

use crate::url::{origin, site_key};
use crate::CrawlError;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

/// User agent token robots.txt rules are evaluated for
pub const WILDCARD_AGENT: &str = "*";

/// Sitemap and rate hints declared in a host's robots.txt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolitenessInfo {
    /// `Sitemap:` locations, in file order
    pub sitemap_urls: Vec<String>,

    /// `Request-rate` for the wildcard group
    pub request_rate: Option<RequestRate>,

    /// `Crawl-delay` for the wildcard group
    pub crawl_delay: Option<Duration>,
}

impl PolitenessInfo {
    /// Minimum gap between requests to the host, combining both hints
    pub fn min_interval(&self) -> Option<Duration> {
        let from_rate = self.request_rate.map(|r| r.interval());
        match (self.crawl_delay, from_rate) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Decides whether URLs may be fetched, caching robots.txt per host
pub struct PolitenessGate {
    client: Client,
    cache: Mutex<HashMap<String, CachedRobots>>,
}

impl PolitenessGate {
    /// Creates a gate that fetches robots.txt with the given client
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Checks whether `url` may be fetched
    ///
    /// Never fails: an unreachable or broken robots.txt allows the fetch.
    pub async fn can_fetch(&self, url: &Url) -> bool {
        let robots = self.robots_for(url).await;
        let allowed = robots.is_allowed(url.as_str(), WILDCARD_AGENT);
        if !allowed {
            tracing::debug!("robots.txt disallows {}", url);
        }
        allowed
    }

    /// Returns the sitemap and rate hints for `url`'s host
    pub async fn politeness_info(&self, url: &Url) -> PolitenessInfo {
        let robots = self.robots_for(url).await;
        PolitenessInfo {
            sitemap_urls: robots.sitemaps().to_vec(),
            request_rate: robots.request_rate(WILDCARD_AGENT),
            crawl_delay: robots.crawl_delay_duration(WILDCARD_AGENT),
        }
    }

    /// Gets robots.txt for a host, fetching if missing or stale
    async fn robots_for(&self, url: &Url) -> ParsedRobots {
        let Some(key) = site_key(url) else {
            return ParsedRobots::allow_all();
        };

        if let Some(cached) = self.cached(&key) {
            return cached;
        }

        let robots = match fetch_robots(&self.client, url).await {
            Ok(robots) => robots,
            Err(e) => {
                tracing::warn!("Could not read robots.txt for {}, allowing: {}", key, e);
                ParsedRobots::allow_all()
            }
        };

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, CachedRobots::new(robots.clone()));
        }

        robots
    }

    fn cached(&self, key: &str) -> Option<ParsedRobots> {
        let cache = self.cache.lock().ok()?;
        cache
            .get(key)
            .filter(|entry| !entry.is_stale())
            .map(|entry| entry.content.clone())
    }
}

/// Fetches and parses `{scheme}://{host}/robots.txt` for `url`
///
/// # Returns
///
/// * `Ok(ParsedRobots)` - Parsed rules; a 4xx response means no rules
/// * `Err(CrawlError)` - Network failure or server error
pub async fn fetch_robots(client: &Client, url: &Url) -> Result<ParsedRobots, CrawlError> {
    let base = origin(url).ok_or(CrawlError::Url(crate::UrlError::MissingDomain))?;
    let robots_url = format!("{}/robots.txt", base);

    tracing::debug!("Fetching {}", robots_url);
    let response = client
        .get(&robots_url)
        .send()
        .await
        .map_err(|source| CrawlError::Http {
            url: robots_url.clone(),
            source,
        })?;

    let status = response.status();
    if status.is_client_error() {
        return Ok(ParsedRobots::allow_all());
    }
    if !status.is_success() {
        return Err(CrawlError::HttpStatus {
            url: robots_url,
            status: status.as_u16(),
        });
    }

    let body = response.text().await.map_err(|source| CrawlError::Http {
        url: robots_url,
        source,
    })?;
    Ok(ParsedRobots::from_content(&body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn gate_for(server: &MockServer) -> (PolitenessGate, Url) {
        let client = Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        (
            PolitenessGate::new(client),
            Url::parse(&format!("{}/page", server.uri())).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_disallowed_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /page"))
            .mount(&server)
            .await;

        let (gate, url) = gate_for(&server).await;
        assert!(!gate.can_fetch(&url).await);

        let other = Url::parse(&format!("{}/other", server.uri())).unwrap();
        assert!(gate.can_fetch(&other).await);
    }

    #[tokio::test]
    async fn test_robots_fetched_once_per_host() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
            .expect(1)
            .mount(&server)
            .await;

        let (gate, url) = gate_for(&server).await;
        assert!(gate.can_fetch(&url).await);
        assert!(gate.can_fetch(&url).await);
        gate.politeness_info(&url).await;
    }

    #[tokio::test]
    async fn test_missing_robots_allows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (gate, url) = gate_for(&server).await;
        assert!(gate.can_fetch(&url).await);
    }

    #[tokio::test]
    async fn test_server_error_is_permissive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (gate, url) = gate_for(&server).await;
        assert!(gate.can_fetch(&url).await);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_permissive() {
        let client = Client::builder()
            .timeout(Duration::from_millis(500))
            .build()
            .unwrap();
        let gate = PolitenessGate::new(client);

        // Nothing listens on port 1
        let url = Url::parse("http://127.0.0.1:1/page").unwrap();
        assert!(gate.can_fetch(&url).await);
        assert_eq!(gate.politeness_info(&url).await, PolitenessInfo::default());
    }

    #[tokio::test]
    async fn test_politeness_info() {
        let server = MockServer::start().await;
        let body = format!(
            "User-agent: *\nCrawl-delay: 2\nRequest-rate: 1/5\nSitemap: {}/sitemap_index.xml\n",
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let (gate, url) = gate_for(&server).await;
        let info = gate.politeness_info(&url).await;

        assert_eq!(info.sitemap_urls, vec![format!("{}/sitemap_index.xml", server.uri())]);
        assert_eq!(info.crawl_delay, Some(Duration::from_secs(2)));
        assert_eq!(info.request_rate, Some(RequestRate { requests: 1, seconds: 5 }));
        assert_eq!(info.min_interval(), Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_unrepresentable_crawl_delay_saturates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nCrawl-delay: inf\nRequest-rate: 1/5\n"))
            .mount(&server)
            .await;

        let (gate, url) = gate_for(&server).await;
        let info = gate.politeness_info(&url).await;

        assert_eq!(info.crawl_delay, Some(Duration::MAX));
        assert_eq!(info.min_interval(), Some(Duration::MAX));
        assert!(gate.can_fetch(&url).await);
    }
}
