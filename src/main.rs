//! Email harvester main entry point
//!
//! This is the command-line interface for the email harvester.

use anyhow::Context;
use clap::Parser;
use email_harvester::config::{load_config_with_hash, validate, Config};
use email_harvester::output::{load_statistics, print_report, print_statistics};
use email_harvester::{CrawlRequest, Harvester};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Email harvester: crawls sites for deliverable email addresses
///
/// Starting from each seed, the harvester follows same-site links up to the
/// configured depth and prints every address whose domain accepts mail,
/// followed by the status of each URL it visited.
#[derive(Parser, Debug)]
#[command(name = "email-harvester")]
#[command(version = "1.0.0")]
#[command(about = "Harvest validated email addresses from websites", long_about = None)]
struct Cli {
    /// Seed URLs; a missing scheme defaults to https
    #[arg(value_name = "SEEDS")]
    seeds: Vec<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Link hops to follow from each seed (overrides config)
    #[arg(short, long, allow_negative_numbers = true)]
    depth: Option<i64>,

    /// Concurrent fetches and DNS lookups (overrides config)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Requests per second across the whole crawl (overrides config)
    #[arg(long)]
    rps: Option<f64>,

    /// Route fetches through vetted proxies
    #[arg(long)]
    proxies: bool,

    /// Fetch and probe proxy candidates before crawling
    #[arg(long)]
    refresh_proxies: bool,

    /// Show proxy statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            let config = Config::default();
            validate(&config).context("default configuration is invalid")?;
            config
        }
    };

    let request = build_request(&cli, &config);

    if cli.dry_run {
        handle_dry_run(&config, &request)
    } else if cli.stats {
        handle_stats(config)
    } else {
        handle_harvest(config, request, cli.refresh_proxies).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("email_harvester=info,warn"),
            1 => EnvFilter::new("email_harvester=debug,info"),
            2 => EnvFilter::new("email_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Applies command-line overrides on top of the configured defaults
fn build_request(cli: &Cli, config: &Config) -> CrawlRequest {
    let mut request = CrawlRequest::from_config(config, cli.seeds.clone());
    if let Some(depth) = cli.depth {
        request = request.max_depth(depth);
    }
    if let Some(concurrency) = cli.concurrency {
        request = request.concurrency(concurrency);
    }
    if cli.rps.is_some() {
        request = request.requests_per_second(cli.rps);
    }
    if cli.proxies {
        request = request.use_proxies(true);
    }
    request
}

/// Handles the --dry-run mode: validates the request and shows what would run
fn handle_dry_run(config: &Config, request: &CrawlRequest) -> anyhow::Result<()> {
    request.validate()?;

    println!("=== Email Harvester Dry Run ===\n");

    println!("Crawl:");
    println!("  Max depth: {}", request.max_depth);
    println!("  Concurrency: {}", request.concurrency);
    match request.requests_per_second {
        Some(rps) => println!("  Requests per second: {}", rps),
        None => println!("  Requests per second: unlimited"),
    }
    println!("  Links per page: {}", config.crawler.links_per_page);
    println!("  Attempts per fetch: {}", config.crawler.max_attempts);
    println!("  Cache TTL: {}s", request.cache_ttl.as_secs());
    println!("  Proxy mode: {}", if request.use_proxies { "on" } else { "off" });

    println!("\nProxies:");
    println!("  Database: {}", config.proxy.database_path);
    println!("  Sources: {}", config.proxy.sources.len());
    println!("  Minimum anonymity: {}", config.proxy.min_anonymity);

    println!("\nSeeds ({}):", request.seeds.len());
    for seed in &request.seeds {
        match email_harvester::normalize_seed(seed) {
            Ok(url) => println!("  - {}", url),
            Err(e) => println!("  - {} (invalid: {})", seed, e),
        }
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows proxy statistics from the database
fn handle_stats(config: Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.proxy.database_path);

    let harvester = Harvester::new(config);
    let store = harvester.proxy_store()?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    request: CrawlRequest,
    refresh_proxies: bool,
) -> anyhow::Result<()> {
    let harvester = Harvester::new(config);

    if refresh_proxies {
        let summary = harvester
            .refresh_proxies()
            .await
            .context("proxy refresh failed")?;
        tracing::info!(
            "{} of {} proxy candidates validated ({} vetted overall)",
            summary.validated,
            summary.fetched,
            harvester.vetted_proxy_count()?
        );
    }

    if request.seeds.is_empty() {
        if !refresh_proxies {
            tracing::warn!("No seed URLs given; nothing to do");
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; returning partial results");
            on_interrupt.cancel();
        }
    });

    tracing::info!("Harvesting from {} seed URLs", request.seeds.len());
    let report = harvester.harvest_with_cancel(&request, cancel).await?;
    print_report(&report);

    Ok(())
}
