//! Link Extractor: pulls same-site links out of fetched pages
//!
//! Only `<a href="...">` anchors are followed. Links are resolved against the
//! page URL, normalized, and kept only when they point at the page's own site.

use crate::crawler::tracker::{CrawlTracker, UrlUpdate};
use crate::state::CrawlStatus;
use crate::url::{normalize_url, same_site};
use crate::{CrawlError, Result};
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::sync::Arc;
use url::Url;

/// Extracts same-site links from an HTML document
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` anywhere in the document, relative or absolute
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:` and `data:` hrefs
/// - Fragment-only hrefs (same page anchors)
/// - Anything whose host and port differ from `base_url`
///
/// # Returns
///
/// Normalized absolute URLs, sorted and without duplicates.
///
/// # Example
///
/// ```
/// use sitecrawl::crawler::extract_links;
/// use url::Url;
///
/// let html = r#"<a href="/page1">one</a><a href="https://other.com/x">two</a>"#;
/// let base = Url::parse("https://example.com").unwrap();
/// let links = extract_links(html, &base).unwrap();
/// assert_eq!(links, vec!["https://example.com/page1".to_string()]);
/// ```
pub fn extract_links(html: &str, base_url: &Url) -> Result<Vec<String>> {
    let selector = Selector::parse("a[href]").map_err(|e| CrawlError::HtmlParse {
        url: base_url.to_string(),
        message: format!("{:?}", e),
    })?;

    let document = Html::parse_document(html);
    let mut links = BTreeSet::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(link) = resolve_link(href, base_url) else {
            continue;
        };
        if same_site(&link, base_url) {
            links.insert(link.to_string());
        }
    }

    Ok(links.into_iter().collect())
}

/// Resolves a link href to a normalized absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel:, data: schemes
/// - Empty and fragment-only hrefs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    normalize_url(absolute.as_str()).ok()
}

/// Parses downloaded pages and feeds discovered links back into the frontier
pub struct LinkExtractor {
    tracker: Arc<CrawlTracker>,
}

impl LinkExtractor {
    pub fn new(tracker: Arc<CrawlTracker>) -> Self {
        Self { tracker }
    }

    /// Parses `content` fetched from `url`
    ///
    /// Each kept link is requested for download (deduplicated by the
    /// frontier), then the page is reported `Parsed` with its link list. A
    /// page that cannot be parsed is reported `Error` and yields no links.
    ///
    /// # Returns
    ///
    /// * `Ok(links)` - The page's same-site links (empty on parse failure)
    /// * `Err(CrawlError)` - Reporting to the tracker failed
    pub fn parse(&self, url: &str, content: &str) -> Result<Vec<String>> {
        let links = match Url::parse(url)
            .map_err(CrawlError::from)
            .and_then(|base| extract_links(content, &base))
        {
            Ok(links) => links,
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", url, e);
                self.tracker.update_status(url, CrawlStatus::Error, None)?;
                return Ok(Vec::new());
            }
        };

        let mut queued = 0;
        for link in &links {
            if self.tracker.request_download(link)? {
                queued += 1;
            }
        }
        tracing::debug!("{}: {} links, {} new", url, links.len(), queued);

        self.tracker.update_url(
            url,
            UrlUpdate {
                linked_urls: Some(links.clone()),
                ..Default::default()
            },
        )?;
        self.tracker.update_status(url, CrawlStatus::Parsed, None)?;

        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontier::{FrontierStore, MemoryFrontier};
    use crate::storage::{PersistenceHandle, WriteRequest};

    fn base_url() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    fn links(html: &str) -> Vec<String> {
        extract_links(html, &base_url()).unwrap()
    }

    #[test]
    fn test_extract_relative_link() {
        assert_eq!(
            links(r#"<html><body><a href="/other">Link</a></body></html>"#),
            vec!["https://example.com/other"]
        );
    }

    #[test]
    fn test_extract_relative_path_link() {
        assert_eq!(
            links(r#"<a href="other">Link</a>"#),
            vec!["https://example.com/other"]
        );
    }

    #[test]
    fn test_cross_domain_dropped() {
        assert!(links(r#"<a href="https://other.com/page">Link</a>"#).is_empty());
        assert!(links(r#"<a href="https://sub.example.com/page">Link</a>"#).is_empty());
    }

    #[test]
    fn test_skip_special_schemes() {
        let html = r#"
            <a href="javascript:void(0)">js</a>
            <a href="JavaScript:alert(1)">js</a>
            <a href="mailto:test@example.com">mail</a>
            <a href="tel:+1234567890">call</a>
            <a href="data:text/html,<h1>Test</h1>">data</a>
            <a href="ftp://example.com/file">ftp</a>
        "#;
        assert!(links(html).is_empty());
    }

    #[test]
    fn test_skip_fragment_only_and_empty() {
        assert!(links(r##"<a href="#section">Jump</a><a href="">x</a><a href="  ">y</a>"##).is_empty());
    }

    #[test]
    fn test_fragments_stripped_and_deduplicated() {
        let html = r##"<a href="/a#one">1</a><a href="/a#two">2</a><a href="/a">3</a>"##;
        assert_eq!(links(html), vec!["https://example.com/a"]);
    }

    #[test]
    fn test_results_sorted() {
        let html = r#"<a href="/zeta">z</a><a href="/alpha">a</a>"#;
        assert_eq!(
            links(html),
            vec!["https://example.com/alpha", "https://example.com/zeta"]
        );
    }

    #[test]
    fn test_malformed_html_still_yields_links() {
        let html = r#"<html><body><div><a href="/ok">unclosed <p>tags"#;
        assert_eq!(links(html), vec!["https://example.com/ok"]);
    }

    #[test]
    fn test_parse_reports_and_requests_downloads() {
        let (persistence, mut rx) = PersistenceHandle::detached();
        let frontier = Arc::new(MemoryFrontier::new());
        let tracker = Arc::new(CrawlTracker::new(
            frontier.clone(),
            persistence,
            "run_1",
            "https://example.com",
            10,
        ));

        let seed = "https://example.com/";
        tracker.request_download(seed).unwrap();
        tracker.get_page_to_visit().unwrap();
        tracker
            .update_status(seed, CrawlStatus::Downloaded, Some(200))
            .unwrap();

        let html = r#"
            <a href="/page1">one</a>
            <a href="https://other-domain.com/page3">three</a>
            <a href="https://example.com/page2">two</a>
        "#;
        let found = LinkExtractor::new(tracker.clone())
            .parse(seed, html)
            .unwrap();

        assert_eq!(
            found,
            vec!["https://example.com/page1", "https://example.com/page2"]
        );
        assert_eq!(frontier.pending().unwrap(), 2);
        assert_eq!(tracker.status_of(seed).unwrap(), Some(CrawlStatus::Closed));

        let Ok(WriteRequest::Url(record)) = rx.try_recv() else {
            panic!("expected the closed seed record");
        };
        assert_eq!(record.final_status, Some(CrawlStatus::Parsed));
        assert_eq!(record.linked_urls, found);
    }

    #[test]
    fn test_parse_of_invalid_url_reports_error() {
        let (persistence, _rx) = PersistenceHandle::detached();
        let tracker = Arc::new(CrawlTracker::new(
            Arc::new(MemoryFrontier::new()),
            persistence,
            "run_1",
            "https://example.com",
            10,
        ));

        let found = LinkExtractor::new(tracker.clone())
            .parse("not a url", "<a href='/x'>x</a>")
            .unwrap();

        assert!(found.is_empty());
        assert_eq!(tracker.snapshot().unwrap().errored, 1);
    }
}
