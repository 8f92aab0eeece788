//! Sitecrawl main entry point
//!
//! This is the command-line interface for the sitecrawl single-site crawler.

use clap::Parser;
use sitecrawl::config::{
    hash_content, load_config_with_hash, validate, validate_seed_url, Config, FrontierBackend,
};
use sitecrawl::Coordinator;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Sitecrawl: a polite single-site crawler
///
/// Sitecrawl starts from one URL, seeds its frontier from the site's sitemap
/// when there is one, and follows same-site links while respecting
/// robots.txt until the page budget is spent or nothing is left to fetch.
#[derive(Parser, Debug)]
#[command(name = "sitecrawl")]
#[command(version)]
#[command(about = "A polite single-site crawler", long_about = None)]
struct Cli {
    /// Seed URL to start crawling from
    #[arg(value_name = "URL", required_unless_present = "stats")]
    url: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Stop after this many URLs have been closed
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Attempts per download for transient failures
    #[arg(long, value_name = "N")]
    retries: Option<u32>,

    /// Seconds between frontier checks
    #[arg(long, value_name = "SECONDS")]
    check_every: Option<f64>,

    /// Path to the SQLite database
    #[arg(long, value_name = "PATH")]
    database: Option<String>,

    /// Keep the frontier in memory instead of the database
    #[arg(long)]
    memory_frontier: bool,

    /// Use this run identifier instead of the start time
    #[arg(long, value_name = "ID")]
    run_id: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics for the latest (or --run-id) run and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = match load_effective_config(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    // Handle different modes
    if cli.stats {
        handle_stats(&config, cli.run_id.as_deref())?;
    } else if cli.dry_run {
        handle_dry_run(&config, cli.url.as_deref().unwrap_or_default())?;
    } else {
        handle_crawl(&cli, config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitecrawl=info,warn"),
            1 => EnvFilter::new("sitecrawl=debug,info"),
            2 => EnvFilter::new("sitecrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file (if any) and applies command-line overrides
///
/// The returned hash covers the file plus the overrides, so two runs with
/// the same file but different flags are told apart.
fn load_effective_config(cli: &Cli) -> Result<(Config, String), Box<dyn std::error::Error>> {
    let (mut config, file_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, hash)
        }
        None => (Config::default(), String::new()),
    };

    if let Some(max_pages) = cli.max_pages {
        config.crawler.max_pages = max_pages;
    }
    if let Some(retries) = cli.retries {
        config.crawler.retries = retries;
    }
    if let Some(seconds) = cli.check_every {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(format!("--check-every must be a positive number, got {}", seconds).into());
        }
        config.crawler.check_every_ms = (seconds * 1000.0).round() as u64;
    }
    if let Some(database) = &cli.database {
        config.output.database_path = database.clone();
    }
    if cli.memory_frontier {
        config.output.frontier = FrontierBackend::Memory;
    }

    validate(&config)?;

    let overrides = format!(
        "{}|{:?}|{:?}|{:?}|{:?}|{}",
        file_hash, cli.max_pages, cli.retries, cli.check_every, cli.database, cli.memory_frontier
    );
    Ok((config, hash_content(&overrides)))
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, seed: &str) -> Result<(), Box<dyn std::error::Error>> {
    let seed_url = validate_seed_url(seed)?;

    println!("=== Sitecrawl Dry Run ===\n");

    println!("Seed: {}", seed_url);

    println!("\nCrawler Configuration:");
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Retries: {}", config.crawler.retries);
    println!("  Check every: {}ms", config.crawler.check_every_ms);
    println!("  Max idle polls: {}", config.crawler.max_idle_polls);
    println!("  Channel capacity: {}", config.crawler.channel_capacity);
    println!("  Request timeout: {}ms", config.crawler.request_timeout_ms);
    println!("  Max sitemap depth: {}", config.crawler.max_sitemap_depth);
    println!("  Max crawl delay: {}ms", config.crawler.max_crawl_delay_ms);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Frontier: {:?}", config.output.frontier);
    println!("  Batch size: {}", config.output.batch_size);

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would crawl at most {} pages from {}",
        config.crawler.max_pages, seed_url
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config, run_id: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    use sitecrawl::output::{load_statistics, print_statistics};
    use sitecrawl::storage::SqliteStorage;

    println!("Database: {}\n", config.output.database_path);

    // Open the database
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

    // Load statistics
    let stats = load_statistics(&storage, run_id)?;

    // Print statistics
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    cli: &Cli,
    config: Config,
    config_hash: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let seed = cli.url.as_deref().unwrap_or_default();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing in-flight work");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut coordinator = Coordinator::new(config, seed)?
        .with_config_hash(config_hash)
        .with_shutdown(shutdown_rx);
    if let Some(run_id) = &cli.run_id {
        coordinator = coordinator.with_run_id(run_id.clone());
    }

    // Run the crawler
    match coordinator.run().await {
        Ok(summary) => {
            tracing::info!("Crawl completed successfully");
            println!("{}", summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
