//! Crawler coordinator - main crawl orchestration logic
//!
//! A run is two loops over one crawl tracker:
//!
//! - The download loop pulls URLs from the frontier, downloads them and puts
//!   `(url, body)` pairs on a bounded channel. A full channel blocks it, which
//!   caps how many downloaded bodies are held in memory.
//! - The parse loop takes pairs off the channel, extracts links and feeds
//!   them back into the frontier.
//!
//! The download loop stops when the page budget is spent, the frontier stays
//! empty for too long, or shutdown is requested. Stopping drops the channel
//! sender; the parse loop then drains what is left and stops. The run
//! completes once both have stopped and the persistence writer has flushed.

use crate::config::{validate_seed_url, Config, FrontierBackend};
use crate::crawler::fetcher::{build_http_client, Downloader};
use crate::crawler::parser::LinkExtractor;
use crate::crawler::sitemap::SitemapMapper;
use crate::crawler::tracker::{CrawlTracker, NextPage};
use crate::frontier::{FrontierStore, MemoryFrontier, SqliteFrontier};
use crate::output::CrawlSummary;
use crate::robots::PolitenessGate;
use crate::state::{new_run_id, CrawlRun, CrawlStatus};
use crate::storage::{BatchWriter, PersistenceHandle, SqliteStorage, Storage, StorageError};
use crate::url::{normalize_url, same_site};
use crate::{CrawlError, Result};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use url::Url;

/// Status code that triggers poll-interval backoff in the download loop
const TOO_MANY_REQUESTS: u16 = 429;

/// The poll interval is multiplied by `BACKOFF_NUMERATOR / BACKOFF_DENOMINATOR`
/// (1.5) after each 429
const BACKOFF_NUMERATOR: u32 = 3;
const BACKOFF_DENOMINATOR: u32 = 2;

/// Upper bound on the backed-off poll interval
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// A downloaded page waiting to be parsed
type DownloadedPage = (String, String);

/// Poll settings of the download loop
///
/// When the frontier is empty the loop sleeps `poll_interval` and counts the
/// miss; after `max_idle_polls` consecutive misses it treats the frontier as
/// exhausted. Any URL resets the count. Misses are tolerated because the
/// parse loop may still be about to queue links.
#[derive(Debug, Clone, Copy)]
struct LoopPolicy {
    poll_interval: Duration,
    max_idle_polls: u32,
}

/// What the download loop did, for logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DownloadReport {
    /// Pages handed to the parse loop
    sent: u32,
    /// Downloads answered with 429
    rate_limited: u32,
    /// Poll interval when the loop stopped
    poll_interval: Duration,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    seed_url: Url,
    run_id: String,
    config_hash: Option<String>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Coordinator {
    /// Creates a new coordinator for one seed URL
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `seed_url` - Where the crawl starts; must be an absolute http(s) URL
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(CrawlError)` - The seed URL is invalid
    pub fn new(config: Config, seed_url: &str) -> Result<Self> {
        validate_seed_url(seed_url)?;
        let seed_url = normalize_url(seed_url)?;

        Ok(Self {
            config,
            seed_url,
            run_id: new_run_id(),
            config_hash: None,
            shutdown: None,
        })
    }

    /// Overrides the generated run identifier
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Records the hash of the configuration file on the run
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// Stops downloading once the receiver observes `true`; pages already
    /// downloaded are still parsed
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn seed_url(&self) -> &Url {
        &self.seed_url
    }

    /// Runs the crawl to completion
    ///
    /// This method:
    /// 1. Records the run start
    /// 2. Starts the persistence writer and opens the frontier
    /// 3. Primes the frontier from the sitemap, or the bare seed URL
    /// 4. Runs the download and parse loops until both stop
    /// 5. Flushes persistence and records the run end
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSummary)` - The run finished; per-URL failures are counted in it
    /// * `Err(CrawlError)` - A storage or transport failure aborted the run.
    ///   The run is marked failed and frontier tables are left as they were.
    pub async fn run(self) -> Result<CrawlSummary> {
        let started = Instant::now();
        let seed = self.seed_url.to_string();
        let crawler = &self.config.crawler;

        tracing::info!(
            "Starting crawl run {} from {} (max {} pages)",
            self.run_id,
            seed,
            crawler.max_pages
        );

        let db_path = Path::new(&self.config.output.database_path);
        let storage = Arc::new(Mutex::new(SqliteStorage::new(db_path)?));
        {
            let mut run = CrawlRun::new(&self.run_id, &seed, crawler.max_pages);
            run.config_hash = self.config_hash.clone();
            lock(&storage)?.create_run(&run)?;
        }

        let (persistence, writer) =
            BatchWriter::new(Arc::clone(&storage), self.config.output.batch_size).spawn();

        let outcome = self.crawl(&seed, persistence).await;

        // Every handle is gone once `crawl` returns, so the writer drains and stops
        let writer_result = writer.await;

        let result = match (outcome, writer_result) {
            (_, Err(e)) => Err(CrawlError::Join(e)),
            // A failed writer closes the channel; its own error is the cause
            (_, Ok(Err(storage_error))) => Err(storage_error.into()),
            (Err(e), Ok(Ok(_))) => Err(e),
            (Ok(summary), Ok(Ok(stats))) => {
                tracing::debug!(
                    "Writer stored {} URLs and {} sitemap entries in {} flushes",
                    stats.urls_written,
                    stats.sitemap_entries_written,
                    stats.flushes
                );
                Ok(summary)
            }
        };

        match result {
            Ok(mut summary) => {
                lock(&storage)?.complete_run(&self.run_id)?;
                summary.elapsed = started.elapsed();
                tracing::info!(
                    "Crawl run {} completed: {} pages closed, {} links found in {:?}",
                    self.run_id,
                    summary.completed_pages,
                    summary.discovered_links,
                    summary.elapsed
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::error!("Crawl run {} aborted: {}", self.run_id, e);
                let marked = lock(&storage)
                    .and_then(|mut storage| storage.fail_run(&self.run_id).map_err(CrawlError::from));
                if let Err(mark_error) = marked {
                    tracing::error!("Could not mark run {} as failed: {}", self.run_id, mark_error);
                }
                Err(e)
            }
        }
    }

    /// Primes the frontier and runs both loops
    ///
    /// Consumes `persistence`; every clone of it is dropped by the time this
    /// returns.
    async fn crawl(&self, seed: &str, persistence: PersistenceHandle) -> Result<CrawlSummary> {
        let crawler = &self.config.crawler;

        let frontier = self.open_frontier()?;
        let client = build_http_client(
            &self.config.user_agent,
            Duration::from_millis(crawler.request_timeout_ms),
        )?;
        let gate = Arc::new(PolitenessGate::new(client.clone()));

        let tracker = Arc::new(CrawlTracker::new(
            Arc::clone(&frontier),
            persistence.clone(),
            &self.run_id,
            seed,
            crawler.max_pages,
        ));

        let mapper = SitemapMapper::new(
            client.clone(),
            Arc::clone(&gate),
            crawler.retries,
            crawler.max_sitemap_depth,
        );
        let sitemap_entries = self.prime(&mapper, &tracker, &persistence).await?;
        drop(persistence);

        let downloader = Downloader::new(
            client,
            gate,
            Arc::clone(&tracker),
            crawler.retries,
            Duration::from_millis(crawler.max_crawl_delay_ms),
        );
        let extractor = LinkExtractor::new(Arc::clone(&tracker));

        let policy = LoopPolicy {
            poll_interval: Duration::from_millis(crawler.check_every_ms),
            max_idle_polls: crawler.max_idle_polls,
        };
        let (tx, rx) = mpsc::channel::<DownloadedPage>(crawler.channel_capacity);

        let download = tokio::spawn(download_loop(
            downloader,
            Arc::clone(&tracker),
            tx,
            policy,
            self.shutdown.clone(),
        ));
        let parse = tokio::spawn(parse_loop(extractor, Arc::clone(&tracker), rx));

        let (download_result, parse_result) = tokio::join!(download, parse);
        let report = download_result??;
        parse_result??;
        tracing::debug!(
            "Download loop sent {} pages, {} rate limited, final poll interval {:?}",
            report.sent,
            report.rate_limited,
            report.poll_interval
        );

        let snapshot = tracker.snapshot()?;
        let frontier_remaining = frontier.pending()?;

        Ok(CrawlSummary {
            run_id: self.run_id.clone(),
            seed_url: seed.to_string(),
            completed_pages: snapshot.completed_pages,
            max_pages: tracker.max_pages(),
            limit_reached: snapshot.limit_reached,
            discovered_links: snapshot.discovered_links,
            parsed: snapshot.parsed,
            errored: snapshot.errored,
            disallowed: snapshot.disallowed,
            sitemap_entries,
            frontier_remaining,
            elapsed: Duration::ZERO,
        })
    }

    fn open_frontier(&self) -> Result<Arc<dyn FrontierStore>> {
        let frontier: Arc<dyn FrontierStore> = match self.config.output.frontier {
            FrontierBackend::Memory => Arc::new(MemoryFrontier::new()),
            FrontierBackend::Sqlite => Arc::new(SqliteFrontier::open(
                Path::new(&self.config.output.database_path),
                &self.run_id,
            )?),
        };
        Ok(frontier)
    }

    /// Seeds the frontier from the site's sitemap, falling back to the seed URL
    ///
    /// Only same-site sitemap locations are queued. Returns the number of
    /// sitemap entries published.
    async fn prime(
        &self,
        mapper: &SitemapMapper,
        tracker: &CrawlTracker,
        persistence: &PersistenceHandle,
    ) -> Result<usize> {
        let mut queued = 0;
        let mut entries = 0;

        if let Some(resolution) = mapper.resolve(&self.seed_url).await {
            for loc in resolution.page_urls() {
                let Ok(url) = normalize_url(&loc) else {
                    tracing::debug!("Skipping unusable sitemap location {}", loc);
                    continue;
                };
                if !same_site(&url, &self.seed_url) {
                    tracing::debug!("Skipping off-site sitemap location {}", url);
                    continue;
                }
                if tracker.request_download(url.as_str())? {
                    queued += 1;
                }
            }

            entries = resolution.entries.len();
            persistence.publish_sitemap_entries(
                &self.run_id,
                self.seed_url.as_str(),
                resolution.entries,
            )?;
        }

        if queued == 0 {
            tracing::info!("Seeding frontier with {}", self.seed_url);
            tracker.request_download(self.seed_url.as_str())?;
        } else {
            tracing::info!("Seeded frontier with {} sitemap URLs", queued);
        }

        Ok(entries)
    }
}

fn lock(storage: &Mutex<SqliteStorage>) -> Result<std::sync::MutexGuard<'_, SqliteStorage>> {
    storage
        .lock()
        .map_err(|_| CrawlError::Storage(StorageError::LockPoisoned))
}

fn shutdown_requested(shutdown: &Option<watch::Receiver<bool>>) -> bool {
    shutdown.as_ref().is_some_and(|rx| *rx.borrow())
}

/// Next poll interval after a 429, capped at [`MAX_POLL_INTERVAL`]
///
/// An interval already above the cap is left as it is.
fn back_off(interval: Duration) -> Duration {
    let next = interval.saturating_mul(BACKOFF_NUMERATOR) / BACKOFF_DENOMINATOR;
    next.min(MAX_POLL_INTERVAL).max(interval)
}

/// Closes a downloaded URL that will never reach the parse loop
fn abandon(tracker: &CrawlTracker, url: &str) -> Result<()> {
    match tracker.update_status(url, CrawlStatus::Error, None) {
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::debug!("Could not close {}: {}", url, e);
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}

/// Downloads frontier URLs and hands their bodies to the parse loop
async fn download_loop(
    downloader: Downloader,
    tracker: Arc<CrawlTracker>,
    tx: mpsc::Sender<DownloadedPage>,
    policy: LoopPolicy,
    shutdown: Option<watch::Receiver<bool>>,
) -> Result<DownloadReport> {
    let mut idle_polls = 0;
    let mut report = DownloadReport {
        poll_interval: policy.poll_interval,
        ..Default::default()
    };

    loop {
        if shutdown_requested(&shutdown) {
            tracing::info!("Shutdown requested, download loop stopping");
            break;
        }

        let url = match tracker.get_page_to_visit()? {
            NextPage::Exit => {
                tracing::debug!("Page budget spent, download loop stopping");
                break;
            }
            NextPage::Empty => {
                idle_polls += 1;
                if idle_polls > policy.max_idle_polls {
                    tracing::debug!("Frontier idle for {} polls, download loop stopping", idle_polls - 1);
                    break;
                }
                tokio::time::sleep(report.poll_interval).await;
                continue;
            }
            NextPage::Visit(url) => url,
        };
        idle_polls = 0;

        match downloader.fetch(&url).await {
            Ok(outcome) => {
                report.poll_interval = policy.poll_interval;
                let Some(content) = outcome.content else {
                    continue;
                };
                // Blocks while the channel is full
                if let Err(mpsc::error::SendError((url, _))) = tx.send((url, content)).await {
                    tracing::warn!("Parse loop has stopped; closing {} unparsed", url);
                    abandon(&tracker, &url)?;
                    break;
                }
                report.sent += 1;
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::debug!("Download of {} failed: {}", url, e);
                if e.status_code() == Some(TOO_MANY_REQUESTS) {
                    report.rate_limited += 1;
                    report.poll_interval = back_off(report.poll_interval);
                    tracing::info!("Rate limited; polling every {:?}", report.poll_interval);
                    tokio::time::sleep(report.poll_interval).await;
                }
            }
        }
    }

    Ok(report)
}

/// Parses downloaded pages until the channel is closed and drained
///
/// The channel closes only when the download loop stops, so every page it
/// handed over is parsed, including during shutdown.
async fn parse_loop(
    extractor: LinkExtractor,
    tracker: Arc<CrawlTracker>,
    mut rx: mpsc::Receiver<DownloadedPage>,
) -> Result<()> {
    while let Some((url, content)) = rx.recv().await {
        if !tracker.request_parse(&url)? {
            tracing::debug!("{} already parsed, skipping", url);
            continue;
        }

        match extractor.parse(&url, &content) {
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => tracing::debug!("Parse of {} not recorded: {}", url, e),
        }
    }

    tracing::debug!("Download loop finished and channel drained, parse loop stopping");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UserAgentConfig;
    use crate::storage::WriteRequest;
    use tempfile::TempDir;
    use tokio::sync::mpsc::UnboundedReceiver;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(dir: &TempDir, max_pages: u32) -> Config {
        let mut config = Config::default();
        config.crawler.max_pages = max_pages;
        config.crawler.check_every_ms = 10;
        config.crawler.max_idle_polls = 20;
        config.output.database_path = dir.path().join("crawl.db").to_string_lossy().into_owned();
        config.output.frontier = FrontierBackend::Memory;
        config
    }

    async fn page(server: &MockServer, at: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    async fn status(server: &MockServer, at: &str, code: u16, delay: Duration) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(code).set_delay(delay))
            .mount(server)
            .await;
    }

    /// A tracker with `paths` queued on `server`, and a downloader reporting to it
    struct LoopFixture {
        tracker: Arc<CrawlTracker>,
        downloader: Downloader,
        _records: UnboundedReceiver<WriteRequest>,
    }

    fn loop_fixture(server: &MockServer, paths: &[&str]) -> LoopFixture {
        let (persistence, records) = PersistenceHandle::detached();
        let tracker = Arc::new(CrawlTracker::new(
            Arc::new(MemoryFrontier::new()),
            persistence,
            "loops",
            format!("{}/", server.uri()),
            100,
        ));
        for at in paths {
            tracker.request_download(&format!("{}{}", server.uri(), at)).unwrap();
        }

        let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(2)).unwrap();
        let gate = Arc::new(PolitenessGate::new(client.clone()));
        let downloader = Downloader::new(client, gate, Arc::clone(&tracker), 1, Duration::from_secs(1));

        LoopFixture {
            tracker,
            downloader,
            _records: records,
        }
    }

    fn quick_policy() -> LoopPolicy {
        LoopPolicy {
            poll_interval: Duration::from_millis(10),
            max_idle_polls: 1,
        }
    }

    #[test]
    fn test_back_off_grows_and_caps() {
        assert_eq!(back_off(Duration::from_millis(10)), Duration::from_millis(15));
        assert_eq!(back_off(Duration::from_secs(25)), MAX_POLL_INTERVAL);
        assert_eq!(back_off(MAX_POLL_INTERVAL), MAX_POLL_INTERVAL);
        // Configured intervals above the cap are never shortened
        assert_eq!(back_off(Duration::from_secs(40)), Duration::from_secs(40));
    }

    #[tokio::test]
    async fn test_rate_limit_backs_off_per_429() {
        let server = MockServer::start().await;
        status(&server, "/r1", 429, Duration::ZERO).await;
        status(&server, "/r2", 429, Duration::ZERO).await;

        let fixture = loop_fixture(&server, &["/r1", "/r2"]);
        let (tx, _rx) = mpsc::channel(1);

        let report = download_loop(fixture.downloader, Arc::clone(&fixture.tracker), tx, quick_policy(), None)
            .await
            .unwrap();

        assert_eq!(report.rate_limited, 2);
        assert_eq!(report.sent, 0);
        assert_eq!(report.poll_interval, Duration::from_micros(22_500));
        assert_eq!(fixture.tracker.snapshot().unwrap().errored, 2);
    }

    #[tokio::test]
    async fn test_success_resets_backoff() {
        let server = MockServer::start().await;
        status(&server, "/limited", 429, Duration::ZERO).await;
        page(&server, "/ok", "<p>ok</p>".to_string()).await;

        let fixture = loop_fixture(&server, &["/limited", "/ok"]);
        let (tx, _rx) = mpsc::channel(1);

        let report = download_loop(fixture.downloader, Arc::clone(&fixture.tracker), tx, quick_policy(), None)
            .await
            .unwrap();

        assert_eq!(report.rate_limited, 1);
        assert_eq!(report.sent, 1);
        assert_eq!(report.poll_interval, Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_unsendable_page_is_closed_as_error() {
        let server = MockServer::start().await;
        page(&server, "/orphan", "<p>orphan</p>".to_string()).await;

        let fixture = loop_fixture(&server, &["/orphan"]);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let report = download_loop(fixture.downloader, Arc::clone(&fixture.tracker), tx, quick_policy(), None)
            .await
            .unwrap();

        let url = format!("{}/orphan", server.uri());
        assert_eq!(report.sent, 0);
        assert_eq!(fixture.tracker.status_of(&url).unwrap(), Some(CrawlStatus::Closed));
        let snapshot = fixture.tracker.snapshot().unwrap();
        assert_eq!(snapshot.errored, 1);
        assert_eq!(snapshot.completed_pages, 1);
    }

    #[tokio::test]
    async fn test_full_channel_holds_downloads_back() {
        let server = MockServer::start().await;
        let paths = ["/p0", "/p1", "/p2", "/p3", "/p4"];
        for at in paths {
            page(&server, at, "<p>page</p>".to_string()).await;
        }

        let fixture = loop_fixture(&server, &paths);
        let (tx, mut rx) = mpsc::channel(1);
        let download = tokio::spawn(download_loop(
            fixture.downloader,
            Arc::clone(&fixture.tracker),
            tx,
            quick_policy(),
            None,
        ));

        // Nothing is received yet: one page sits in the channel, one waits to be sent
        tokio::time::sleep(Duration::from_millis(300)).await;
        let mut downloaded = 0;
        for at in paths {
            let url = format!("{}{}", server.uri(), at);
            if fixture.tracker.status_of(&url).unwrap() == Some(CrawlStatus::Downloaded) {
                downloaded += 1;
            }
        }
        assert!((1..=2).contains(&downloaded), "{} pages downloaded ahead", downloaded);
        let requested = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|request| request.url.path().starts_with("/p"))
            .count();
        assert!(requested <= 2, "{} pages requested ahead", requested);

        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }
        let report = download.await.unwrap().unwrap();
        assert_eq!(received, 5);
        assert_eq!(report.sent, 5);
    }

    #[tokio::test]
    async fn test_parse_loop_waits_for_slow_downloads() {
        let server = MockServer::start().await;
        page(
            &server,
            "/",
            r#"<a href="/a-slow">a</a><a href="/b-slow">b</a><a href="/c-ok">c</a>"#.to_string(),
        )
        .await;
        status(&server, "/a-slow", 404, Duration::from_millis(150)).await;
        status(&server, "/b-slow", 404, Duration::from_millis(150)).await;
        page(&server, "/c-ok", "<p>c</p>".to_string()).await;

        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir, 10);
        config.crawler.max_idle_polls = 10;

        let summary = Coordinator::new(config, &format!("{}/", server.uri()))
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(summary.completed_pages, 4);
        assert_eq!(summary.parsed, 2);
        assert_eq!(summary.errored, 2);
        assert_eq!(summary.frontier_remaining, 0);
    }

    #[test]
    fn test_rejects_bad_seed() {
        assert!(Coordinator::new(Config::default(), "ftp://example.com").is_err());
        assert!(Coordinator::new(Config::default(), "not a url").is_err());
    }

    #[test]
    fn test_builder_overrides() {
        let coordinator = Coordinator::new(Config::default(), "https://Example.com/#top")
            .unwrap()
            .with_run_id("fixed");
        assert_eq!(coordinator.run_id(), "fixed");
        assert_eq!(coordinator.seed_url().as_str(), "https://example.com/");
    }

    #[tokio::test]
    async fn test_run_records_lifecycle() {
        let server = MockServer::start().await;
        page(
            &server,
            "/",
            r#"<a href="/a">a</a><a href="/b">b</a>"#.to_string(),
        )
        .await;
        page(&server, "/a", "<p>a</p>".to_string()).await;
        page(&server, "/b", "<p>b</p>".to_string()).await;

        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, 10);
        let db_path = config.output.database_path.clone();

        let summary = Coordinator::new(config, &format!("{}/", server.uri()))
            .unwrap()
            .with_run_id("lifecycle")
            .with_config_hash("abc123")
            .run()
            .await
            .unwrap();

        assert_eq!(summary.completed_pages, 3);
        assert_eq!(summary.parsed, 3);
        assert_eq!(summary.discovered_links, 2);
        assert!(!summary.limit_reached);

        let storage = SqliteStorage::new(Path::new(&db_path)).unwrap();
        let run = storage.get_run("lifecycle").unwrap();
        assert_eq!(run.status, "completed");
        assert!(run.end_time.is_some());
        assert_eq!(run.config_hash.as_deref(), Some("abc123"));
        assert_eq!(storage.count_urls("lifecycle").unwrap(), 3);
    }

    #[tokio::test]
    async fn test_shutdown_stops_run() {
        let server = MockServer::start().await;
        page(&server, "/", "<p>hi</p>".to_string()).await;

        let dir = TempDir::new().unwrap();
        let (tx, rx) = watch::channel(true);

        let summary = Coordinator::new(test_config(&dir, 10), &format!("{}/", server.uri()))
            .unwrap()
            .with_shutdown(rx)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.completed_pages, 0);
        assert_eq!(summary.frontier_remaining, 1);
        drop(tx);
    }
}
