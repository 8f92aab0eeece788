//! End-of-run crawl summary

use std::fmt;
use std::time::Duration;

/// What a finished crawl run did
///
/// Returned by [`crate::Coordinator::run`]; counters come from the crawl
/// tracker at the moment both loops stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlSummary {
    pub run_id: String,
    pub seed_url: String,

    /// URLs closed and counted against the budget
    pub completed_pages: u32,
    pub max_pages: u32,

    /// Whether the run stopped because the budget was spent
    pub limit_reached: bool,

    /// Same-site links extracted across all parsed pages
    pub discovered_links: u64,

    pub parsed: u32,
    pub errored: u32,
    pub disallowed: u32,

    /// Entries written from the resolved sitemap, zero when seeded bare
    pub sitemap_entries: usize,

    /// URLs still queued for download when the run ended
    pub frontier_remaining: usize,

    pub elapsed: Duration,
}

impl CrawlSummary {
    /// Closed pages per second of wall time
    pub fn pages_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.completed_pages as f64 / secs
        } else {
            0.0
        }
    }

    /// Why the run ended, for display
    pub fn stop_reason(&self) -> &'static str {
        if self.limit_reached {
            "page budget reached"
        } else {
            "frontier exhausted"
        }
    }
}

impl fmt::Display for CrawlSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Crawl Summary ===")?;
        writeln!(f)?;
        writeln!(f, "Run:          {}", self.run_id)?;
        writeln!(f, "Seed:         {}", self.seed_url)?;
        writeln!(f, "Stopped:      {}", self.stop_reason())?;
        writeln!(
            f,
            "Duration:     {:.1}s ({:.2} pages/sec)",
            self.elapsed.as_secs_f64(),
            self.pages_per_second()
        )?;
        writeln!(f)?;
        writeln!(f, "Pages:        {} / {}", self.completed_pages, self.max_pages)?;
        writeln!(f, "  Parsed:     {}", self.parsed)?;
        writeln!(f, "  Errored:    {}", self.errored)?;
        writeln!(f, "  Disallowed: {}", self.disallowed)?;
        writeln!(f, "Links found:  {}", self.discovered_links)?;
        writeln!(f, "Sitemap URLs: {}", self.sitemap_entries)?;
        write!(f, "Still queued: {}", self.frontier_remaining)
    }
}
