//! Sitemap Mapper: resolves a site's sitemaps into page URLs
//!
//! Candidates are tried in order: sitemaps declared in robots.txt, then
//! `/sitemap-index.xml`, then `/sitemap.xml`. Sitemap indexes are followed
//! breadth-first with a depth limit and a visited set, so cyclic or
//! runaway indexes terminate.

use crate::crawler::fetcher::fetch_with_retry;
use crate::robots::PolitenessGate;
use crate::state::{SitemapEntry, ROOT_INDEX_MARKER};
use crate::url::origin;
use crate::{CrawlError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use url::Url;

/// Status recorded on entries that carry a `<loc>`
pub const ENTRY_SUCCESS: &str = "Success";

/// Status recorded on entries without a `<loc>`
pub const ENTRY_MISSING_LOC: &str = "MissingLoc";

/// One `<url>` element as read from a urlset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlElement {
    pub loc: Option<String>,
    pub priority: Option<String>,
    pub changefreq: Option<String>,
    pub lastmod: Option<String>,
}

impl UrlElement {
    fn into_entry(self, source: &str, index_marker: &str) -> SitemapEntry {
        let status = if self.loc.is_some() {
            ENTRY_SUCCESS
        } else {
            ENTRY_MISSING_LOC
        };
        SitemapEntry {
            source_sitemap_url: source.to_string(),
            index_marker: index_marker.to_string(),
            loc: self.loc,
            priority: self.priority,
            frequency: self.changefreq,
            modified: self.lastmod,
            status: status.to_string(),
        }
    }
}

/// A parsed sitemap document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// `<sitemapindex>`: locations of child sitemaps
    Index(Vec<String>),
    /// `<urlset>`: page entries
    UrlSet(Vec<UrlElement>),
}

/// Parses sitemap XML
///
/// Element names are matched without namespace prefixes. Anything whose root
/// is neither `sitemapindex` nor `urlset`, or that is not well-formed XML,
/// is an error.
pub fn parse_sitemap(url: &str, xml: &str) -> Result<SitemapDocument> {
    let sitemap_error = |message: String| CrawlError::Sitemap {
        url: url.to_string(),
        message,
    };

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut root: Option<String> = None;
    let mut tag = String::new();
    let mut children: Vec<String> = Vec::new();
    let mut elements: Vec<UrlElement> = Vec::new();
    let mut current_url: Option<UrlElement> = None;
    let mut current_sitemap: Option<Option<String>> = None;

    loop {
        let text = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase();
                if root.is_none() {
                    root = Some(name.clone());
                }
                match name.as_str() {
                    "url" => current_url = Some(UrlElement::default()),
                    "sitemap" => current_sitemap = Some(None),
                    _ => {}
                }
                tag = name;
                None
            }
            Ok(Event::Empty(ref e)) => {
                if root.is_none() {
                    root = Some(String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase());
                }
                None
            }
            Ok(Event::Text(ref e)) => Some(
                e.unescape()
                    .map_err(|err| sitemap_error(err.to_string()))?
                    .trim()
                    .to_string(),
            ),
            Ok(Event::CData(ref e)) => Some(String::from_utf8_lossy(e).trim().to_string()),
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase();
                match name.as_str() {
                    "url" => elements.extend(current_url.take()),
                    "sitemap" => children.extend(current_sitemap.take().flatten()),
                    _ => {}
                }
                tag.clear();
                None
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(sitemap_error(e.to_string())),
            _ => None,
        };

        if let Some(text) = text.filter(|t| !t.is_empty()) {
            if let Some(element) = current_url.as_mut() {
                match tag.as_str() {
                    "loc" => element.loc = Some(text),
                    "priority" => element.priority = Some(text),
                    "changefreq" => element.changefreq = Some(text),
                    "lastmod" => element.lastmod = Some(text),
                    _ => {}
                }
            } else if let Some(loc) = current_sitemap.as_mut() {
                if tag == "loc" {
                    *loc = Some(text);
                }
            }
        }

        buf.clear();
    }

    match root.as_deref() {
        Some("sitemapindex") => Ok(SitemapDocument::Index(children)),
        Some("urlset") => Ok(SitemapDocument::UrlSet(elements)),
        Some(other) => Err(sitemap_error(format!("unexpected root element <{}>", other))),
        None => Err(sitemap_error("no root element".to_string())),
    }
}

/// Everything learned from one sitemap source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapResolution {
    /// The candidate URL that produced this resolution
    pub source_url: String,

    /// Sitemap index URL -> child sitemap URLs
    pub index_map: BTreeMap<String, Vec<String>>,

    /// Every `<url>` element found, in discovery order
    pub entries: Vec<SitemapEntry>,
}

impl SitemapResolution {
    /// Locations of all entries that carry one
    pub fn page_urls(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.status == ENTRY_SUCCESS)
            .filter_map(|e| e.loc.clone())
            .collect()
    }
}

/// Resolves sitemaps for a seed URL
pub struct SitemapMapper {
    client: Client,
    gate: Arc<PolitenessGate>,
    retries: u32,
    max_depth: u32,
}

impl SitemapMapper {
    /// Creates a new mapper
    ///
    /// # Arguments
    ///
    /// * `client` - The HTTP client to use
    /// * `gate` - Source of robots.txt sitemap declarations
    /// * `retries` - Attempts per sitemap fetch
    /// * `max_depth` - Deepest sitemap index nesting followed
    pub fn new(client: Client, gate: Arc<PolitenessGate>, retries: u32, max_depth: u32) -> Self {
        Self {
            client,
            gate,
            retries,
            max_depth,
        }
    }

    /// Lists sitemap locations to try, in order
    pub async fn candidates(&self, seed: &Url) -> Vec<String> {
        let mut candidates = self.gate.politeness_info(seed).await.sitemap_urls;

        if let Some(base) = origin(seed) {
            for path in ["/sitemap-index.xml", "/sitemap.xml"] {
                let url = format!("{}{}", base, path);
                if !candidates.contains(&url) {
                    candidates.push(url);
                }
            }
        }

        candidates
    }

    /// Resolves the first candidate that yields at least one page URL
    ///
    /// Returns `None` when no candidate works; the caller then falls back to
    /// the bare seed URL.
    pub async fn resolve(&self, seed: &Url) -> Option<SitemapResolution> {
        for candidate in self.candidates(seed).await {
            match self.resolve_from(&candidate).await {
                Ok(resolution) if !resolution.page_urls().is_empty() => {
                    tracing::info!(
                        "Resolved {} sitemap entries from {}",
                        resolution.entries.len(),
                        candidate
                    );
                    return Some(resolution);
                }
                Ok(_) => tracing::debug!("Sitemap {} lists no pages", candidate),
                Err(e) => tracing::debug!("Sitemap candidate {} unusable: {}", candidate, e),
            }
        }

        tracing::info!("No usable sitemap for {}", seed);
        None
    }

    /// Walks one sitemap source, following nested indexes
    ///
    /// A failure on the root document fails the source; failures on nested
    /// sitemaps are logged and skipped.
    pub async fn resolve_from(&self, root_url: &str) -> Result<SitemapResolution> {
        let mut resolution = SitemapResolution {
            source_url: root_url.to_string(),
            ..Default::default()
        };

        let mut pending = VecDeque::from([(root_url.to_string(), ROOT_INDEX_MARKER.to_string(), 0u32)]);
        let mut visited = HashSet::new();

        while let Some((url, index_marker, depth)) = pending.pop_front() {
            if !visited.insert(url.clone()) {
                tracing::warn!("Sitemap {} already visited, skipping", url);
                continue;
            }
            if depth > self.max_depth {
                tracing::warn!(
                    "Sitemap {} is nested deeper than {}, skipping",
                    url,
                    self.max_depth
                );
                continue;
            }

            let document = match self.fetch_document(&url).await {
                Ok(document) => document,
                Err(e) if depth == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!("Skipping sitemap {}: {}", url, e);
                    continue;
                }
            };

            match document {
                SitemapDocument::Index(children) => {
                    tracing::debug!("Sitemap index {} lists {} sitemaps", url, children.len());
                    for child in &children {
                        pending.push_back((child.clone(), url.clone(), depth + 1));
                    }
                    resolution.index_map.insert(url, children);
                }
                SitemapDocument::UrlSet(elements) => {
                    resolution.entries.extend(
                        elements
                            .into_iter()
                            .map(|e| e.into_entry(&url, &index_marker)),
                    );
                }
            }
        }

        Ok(resolution)
    }

    async fn fetch_document(&self, url: &str) -> Result<SitemapDocument> {
        let page = fetch_with_retry(&self.client, url, self.retries).await?;
        parse_sitemap(url, &page.body)
    }
}
