/// Crawl status definitions for tracking a URL through the pipeline
///
/// This module defines all possible states a URL can be in during a run and
/// which transitions between them are legal.
use std::fmt;

/// Represents the current state of a URL in the crawl pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlStatus {
    // ===== Active States =====
    /// URL has been requested for download but not fetched yet
    Frontier,

    /// Page body has been fetched and awaits link extraction
    Downloaded,

    // ===== Closing States =====
    /// Links were extracted from the page
    Parsed,

    /// Fetch or parse failed
    Error,

    /// robots.txt denies the URL
    Disallowed,

    // ===== Terminal State =====
    /// No further transitions; counted against the page budget
    Closed,
}

impl CrawlStatus {
    /// Returns true if this is the terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns true if entering this state closes the URL
    ///
    /// Parsed, Error and Disallowed are all final outcomes: the tracker
    /// records them and then moves the URL to `Closed`.
    pub fn triggers_close(&self) -> bool {
        matches!(self, Self::Parsed | Self::Error | Self::Disallowed)
    }

    /// Checks whether a transition from `self` to `next` is legal
    ///
    /// # Rules
    ///
    /// - Nothing leaves `Closed`
    /// - `Parsed` is only reachable from `Downloaded`
    /// - `Closed` is only entered through the tracker's close path
    /// - Any other active state may move to `Downloaded`, `Error` or `Disallowed`
    pub fn can_transition_to(&self, next: CrawlStatus) -> bool {
        match (self, next) {
            (Self::Closed, _) => false,
            (_, Self::Closed) => false,
            (Self::Downloaded, Self::Parsed) => true,
            (_, Self::Parsed) => false,
            (_, Self::Frontier) => false,
            _ => true,
        }
    }

    /// Converts the status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Frontier => "frontier",
            Self::Downloaded => "downloaded",
            Self::Parsed => "parsed",
            Self::Error => "error",
            Self::Disallowed => "disallowed",
            Self::Closed => "closed",
        }
    }

    /// Parses a status from a database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "frontier" => Some(Self::Frontier),
            "downloaded" => Some(Self::Downloaded),
            "parsed" => Some(Self::Parsed),
            "error" => Some(Self::Error),
            "disallowed" => Some(Self::Disallowed),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    /// Returns all possible statuses in pipeline order
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Frontier,
            Self::Downloaded,
            Self::Parsed,
            Self::Error,
            Self::Disallowed,
            Self::Closed,
        ]
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
