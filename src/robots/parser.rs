//! Robots.txt parser implementation
//!
//! Allow/disallow matching is delegated to the robotstxt crate; the
//! non-standard `Crawl-delay`, `Request-rate` and `Sitemap` lines are read
//! directly.

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// A `Request-rate: <requests>/<period>` directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestRate {
    /// Requests allowed per period
    pub requests: u32,
    /// Period length in seconds
    pub seconds: u32,
}

impl RequestRate {
    /// Parses the value part of a `Request-rate` line
    ///
    /// Accepts `1/5`, `1/5s`, `1/10m` and `1/1h`.
    pub fn parse(value: &str) -> Option<Self> {
        let (requests, period) = value.trim().split_once('/')?;
        let requests: u32 = requests.trim().parse().ok()?;

        let period = period.trim();
        let (digits, multiplier) = match period.chars().last()? {
            's' | 'S' => (&period[..period.len() - 1], 1),
            'm' | 'M' => (&period[..period.len() - 1], 60),
            'h' | 'H' => (&period[..period.len() - 1], 3600),
            _ => (period, 1),
        };
        let seconds = digits.trim().parse::<u32>().ok()?.checked_mul(multiplier)?;

        if requests == 0 || seconds == 0 {
            return None;
        }

        Some(Self { requests, seconds })
    }

    /// Minimum gap between two requests implied by this rate
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(f64::from(self.seconds) / f64::from(self.requests))
    }
}

/// Parsed robots.txt data
///
/// This is a wrapper around the robotstxt crate's matcher, providing a
/// simplified interface for checking if URLs are allowed plus the extra
/// directives the matcher ignores.
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    /// Whether to allow all (true = allow all, false = parse content)
    allow_all: bool,
    /// `Sitemap:` locations, in file order
    sitemaps: Vec<String>,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        let sitemaps = content
            .lines()
            .filter_map(|line| {
                let (key, value) = strip_comment(line).split_once(':')?;
                if key.trim().eq_ignore_ascii_case("sitemap") {
                    let value = value.trim();
                    (!value.is_empty()).then(|| value.to_string())
                } else {
                    None
                }
            })
            .collect();

        Self {
            content: content.to_string(),
            allow_all: false,
            sitemaps,
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// This is used when robots.txt is absent or cannot be fetched.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
            sitemaps: Vec::new(),
        }
    }

    /// Returns true if this is the permissive fallback
    pub fn is_allow_all(&self) -> bool {
        self.allow_all
    }

    /// Declared sitemap URLs
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL to check
    /// * `user_agent` - The user agent token (`*` for the wildcard group)
    ///
    /// # Returns
    ///
    /// * `true` - If the URL is allowed
    /// * `false` - If the URL is disallowed
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Gets the crawl delay for a specific user agent
    ///
    /// A group naming the agent wins over the wildcard group.
    ///
    /// # Returns
    ///
    /// * `Some(f64)` - The crawl delay in seconds; may be infinite or huge
    /// * `None` - If no usable crawl delay is specified
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        self.group_directive(user_agent, "crawl-delay", |value| {
            value.parse::<f64>().ok().filter(|d| !d.is_nan() && *d >= 0.0)
        })
    }

    /// Crawl delay as a `Duration`, saturating values too large to represent
    pub fn crawl_delay_duration(&self, user_agent: &str) -> Option<Duration> {
        self.crawl_delay(user_agent)
            .map(|secs| Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
    }

    /// Gets the request rate for a specific user agent
    pub fn request_rate(&self, user_agent: &str) -> Option<RequestRate> {
        self.group_directive(user_agent, "request-rate", RequestRate::parse)
    }

    /// Finds the first value of `directive` in the group that applies to `user_agent`
    fn group_directive<T>(
        &self,
        user_agent: &str,
        directive: &str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Option<T> {
        if self.allow_all || self.content.is_empty() {
            return None;
        }

        let normalized_agent = user_agent.to_lowercase();
        let mut current_agents: Vec<String> = Vec::new();
        let mut in_rules = false;
        let mut for_agent: Option<T> = None;
        let mut for_wildcard: Option<T> = None;

        for line in self.content.lines() {
            let Some((key, value)) = strip_comment(line).split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            if key == "user-agent" {
                // A user-agent line after rules starts a new group
                if in_rules {
                    current_agents.clear();
                    in_rules = false;
                }
                current_agents.push(value.to_lowercase());
                continue;
            }

            if key == "sitemap" {
                continue;
            }

            in_rules = true;
            if key != directive {
                continue;
            }

            let Some(parsed) = parse(value) else {
                continue;
            };

            let is_wildcard = current_agents.iter().any(|ua| ua == "*");
            let is_specific = normalized_agent != "*"
                && current_agents
                    .iter()
                    .any(|ua| ua != "*" && normalized_agent.contains(ua.as_str()));

            if is_specific && for_agent.is_none() {
                for_agent = Some(parsed);
            } else if is_wildcard && for_wildcard.is_none() {
                for_wildcard = Some(parsed);
            }
        }

        for_agent.or(for_wildcard)
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => line[..idx].trim(),
        None => line.trim(),
    }
}
