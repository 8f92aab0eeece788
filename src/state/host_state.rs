use std::time::{Duration, Instant};

/// Tracks request timing for one host during crawling
///
/// The downloader keeps one of these per host so that a robots.txt
/// `Crawl-delay` is honored between consecutive requests.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Number of requests made to this host in the current run
    pub request_count: u32,

    /// Timestamp of the last request to this host
    pub last_request_time: Option<Instant>,
}

impl HostState {
    /// Creates a new HostState with no recorded requests
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a request was made to this host
    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(now);
    }

    /// Calculates the time until the next request can be made
    ///
    /// # Arguments
    ///
    /// * `min_delay` - Minimum gap required between two requests to this host
    /// * `now` - The current time instant
    ///
    /// # Returns
    ///
    /// * `None` - A request can be made now
    /// * `Some(duration)` - How long to wait first
    pub fn time_until_next_request(&self, min_delay: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < min_delay {
            Some(min_delay - elapsed)
        } else {
            None
        }
    }
}
