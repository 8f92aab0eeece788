//! Crawl Tracker: per-URL state machine and page budget
//!
//! The tracker is the only place `UrlRecord`s change. Every report from the
//! downloader or link extractor goes through [`CrawlTracker::update_status`]
//! or [`CrawlTracker::update_url`], both serialized by one lock, so no two
//! transitions for the same URL interleave.

use crate::frontier::FrontierStore;
use crate::state::{CrawlStatus, UrlRecord};
use crate::storage::{PersistenceHandle, StorageError};
use crate::{CrawlError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// What the download loop should do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// Download this URL
    Visit(String),
    /// The page budget is spent; stop dispatching downloads
    Exit,
    /// Nothing queued right now
    Empty,
}

/// Field changes that accompany a status report
#[derive(Debug, Clone, Default)]
pub struct UrlUpdate {
    /// Fetched body
    pub content: Option<String>,
    /// Links extracted from the body
    pub linked_urls: Option<Vec<String>>,
}

/// Point-in-time counters of a tracker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerSnapshot {
    pub completed_pages: u32,
    pub limit_reached: bool,
    pub parsed: u32,
    pub errored: u32,
    pub disallowed: u32,
    pub discovered_links: u64,
    pub active: usize,
}

#[derive(Debug, Default)]
struct TrackerState {
    active: HashMap<String, UrlRecord>,
    closed: HashSet<String>,
    completed_pages: u32,
    limit_reached: bool,
    parsed: u32,
    errored: u32,
    disallowed: u32,
    discovered_links: u64,
}

/// Owns per-URL status, completion counting and the termination decision
pub struct CrawlTracker {
    frontier: Arc<dyn FrontierStore>,
    persistence: PersistenceHandle,
    run_id: String,
    seed_url: String,
    max_pages: u32,
    state: Mutex<TrackerState>,
}

impl CrawlTracker {
    /// Creates a tracker for one run
    ///
    /// # Arguments
    ///
    /// * `frontier` - The run's Frontier Store
    /// * `persistence` - Where closed records are published
    /// * `run_id` - Identifier stamped on every record
    /// * `seed_url` - The run's starting point
    /// * `max_pages` - Closed URLs after which the run stops
    pub fn new(
        frontier: Arc<dyn FrontierStore>,
        persistence: PersistenceHandle,
        run_id: impl Into<String>,
        seed_url: impl Into<String>,
        max_pages: u32,
    ) -> Self {
        Self {
            frontier,
            persistence,
            run_id: run_id.into(),
            seed_url: seed_url.into(),
            max_pages: max_pages.max(1),
            state: Mutex::new(TrackerState::default()),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    fn lock(&self) -> Result<MutexGuard<'_, TrackerState>> {
        self.state
            .lock()
            .map_err(|_| CrawlError::Storage(StorageError::LockPoisoned))
    }

    /// Requests a download, creating the URL's record the first time
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The URL was queued for the first time
    /// * `Ok(false)` - The URL was already requested in this run
    pub fn request_download(&self, url: &str) -> Result<bool> {
        let is_new = self.frontier.request_download(url)?;
        if is_new {
            let mut state = self.lock()?;
            self.ensure_record(&mut state, url);
            tracing::debug!("Queued {}", url);
        }
        Ok(is_new)
    }

    /// Requests a parse; true only the first time for a URL
    pub fn request_parse(&self, url: &str) -> Result<bool> {
        let is_new = self.frontier.request_parse(url)?;
        if is_new {
            let mut state = self.lock()?;
            self.ensure_record(&mut state, url);
        }
        Ok(is_new)
    }

    fn ensure_record(&self, state: &mut TrackerState, url: &str) {
        if state.closed.contains(url) || state.active.contains_key(url) {
            return;
        }
        state.active.insert(
            url.to_string(),
            UrlRecord::new(url, self.seed_url.as_str(), self.run_id.as_str()),
        );
    }

    /// Applies field changes to an open URL
    pub fn update_url(&self, url: &str, update: UrlUpdate) -> Result<()> {
        let mut state = self.lock()?;
        if state.closed.contains(url) {
            return Err(CrawlError::InvalidTransition {
                url: url.to_string(),
                from: CrawlStatus::Closed,
                to: CrawlStatus::Closed,
            });
        }
        self.ensure_record(&mut state, url);

        let mut new_links = 0;
        if let Some(record) = state.active.get_mut(url) {
            if let Some(content) = update.content {
                record.content = Some(content);
            }
            if let Some(links) = update.linked_urls {
                new_links = links.len() as u64;
                record.linked_urls = links;
            }
        }
        state.discovered_links += new_links;
        Ok(())
    }

    /// Moves a URL to `status`, closing it when the status is a final outcome
    ///
    /// # Arguments
    ///
    /// * `url` - The URL being reported
    /// * `status` - The new status
    /// * `status_code` - HTTP status to record, if known
    ///
    /// # Errors
    ///
    /// * `CrawlError::InvalidTransition` - The URL is closed, or the move is
    ///   not allowed from its current status (per-URL, not fatal)
    /// * `CrawlError::Storage` - The closed record could not be published (fatal)
    pub fn update_status(
        &self,
        url: &str,
        status: CrawlStatus,
        status_code: Option<u16>,
    ) -> Result<()> {
        let mut state = self.lock()?;

        if state.closed.contains(url) {
            return Err(CrawlError::InvalidTransition {
                url: url.to_string(),
                from: CrawlStatus::Closed,
                to: status,
            });
        }
        self.ensure_record(&mut state, url);

        let Some(record) = state.active.get_mut(url) else {
            return Ok(());
        };

        if !record.crawl_status.can_transition_to(status) {
            return Err(CrawlError::InvalidTransition {
                url: url.to_string(),
                from: record.crawl_status,
                to: status,
            });
        }

        tracing::debug!("{}: {} -> {}", url, record.crawl_status, status);
        record.crawl_status = status;
        if status_code.is_some() {
            record.request_status = status_code;
        }

        if status.triggers_close() {
            self.close(&mut state, url)?;
        }

        Ok(())
    }

    /// Moves a URL to `Closed`, counts it and publishes the final record
    fn close(&self, state: &mut TrackerState, url: &str) -> Result<()> {
        let Some(mut record) = state.active.remove(url) else {
            return Ok(());
        };

        let outcome = record.crawl_status;
        record.final_status = Some(outcome);
        record.crawl_status = CrawlStatus::Closed;
        state.closed.insert(url.to_string());

        match outcome {
            CrawlStatus::Parsed => state.parsed += 1,
            CrawlStatus::Disallowed => state.disallowed += 1,
            _ => state.errored += 1,
        }

        if state.completed_pages < self.max_pages {
            state.completed_pages += 1;
        }
        if state.completed_pages >= self.max_pages && !state.limit_reached {
            state.limit_reached = true;
            tracing::info!(
                "Page budget of {} reached; no further downloads will be dispatched",
                self.max_pages
            );
        }

        self.persistence.publish_url(record)?;
        Ok(())
    }

    /// Returns the next URL to download, `Exit` once the budget is spent
    pub fn get_page_to_visit(&self) -> Result<NextPage> {
        if self.lock()?.limit_reached {
            return Ok(NextPage::Exit);
        }

        Ok(match self.frontier.next_to_visit()? {
            Some(url) => NextPage::Visit(url),
            None => NextPage::Empty,
        })
    }

    pub fn completed_pages(&self) -> Result<u32> {
        Ok(self.lock()?.completed_pages)
    }

    pub fn limit_reached(&self) -> Result<bool> {
        Ok(self.lock()?.limit_reached)
    }

    /// Current status of a URL, `Closed` for finished ones
    pub fn status_of(&self, url: &str) -> Result<Option<CrawlStatus>> {
        let state = self.lock()?;
        if state.closed.contains(url) {
            return Ok(Some(CrawlStatus::Closed));
        }
        Ok(state.active.get(url).map(|r| r.crawl_status))
    }

    /// Copy of an open URL's record
    pub fn record(&self, url: &str) -> Result<Option<UrlRecord>> {
        Ok(self.lock()?.active.get(url).cloned())
    }

    pub fn snapshot(&self) -> Result<TrackerSnapshot> {
        let state = self.lock()?;
        Ok(TrackerSnapshot {
            completed_pages: state.completed_pages,
            limit_reached: state.limit_reached,
            parsed: state.parsed,
            errored: state.errored,
            disallowed: state.disallowed,
            discovered_links: state.discovered_links,
            active: state.active.len(),
        })
    }
}
