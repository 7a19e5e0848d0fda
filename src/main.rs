//! Crawldex main entry point
//!
//! Command-line interface for the concurrent crawler and indexer.

use clap::Parser;
use crawldex::config::CrawlConfig;
use crawldex::crawler::crawl;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Exit code when a cancellation signal ended the run
const EXIT_INTERRUPTED: i32 = 130;

/// Crawldex: a concurrent web crawler and content indexer
///
/// Crawls from a seed URL, indexing page titles, keywords, and text
/// previews into a local SQLite database. Crawling is bounded by depth,
/// domain, worker count, and a per-host request rate.
#[derive(Parser, Debug)]
#[command(name = "crawldex")]
#[command(version = "1.0.0")]
#[command(about = "A concurrent web crawler and content indexer", long_about = None)]
struct Cli {
    /// Starting URL for the crawl
    #[arg(value_name = "START_URL")]
    start_url: String,

    /// Maximum crawl depth, inclusive (default: unlimited)
    #[arg(long, value_name = "N")]
    max_depth: Option<u32>,

    /// Restrict discovered links to this host (default: no restriction)
    #[arg(long, value_name = "HOST")]
    domain: Option<String>,

    /// Number of worker tasks (default: 10, env: CRAWLER_CONCURRENCY)
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Requests per second per host (default: 5.0, env: CRAWLER_RATE_LIMIT)
    #[arg(long, value_name = "RATE")]
    rate_limit: Option<f64>,

    /// Database file path (default: crawler_index.db, env: CRAWLER_DB_PATH)
    #[arg(long, value_name = "PATH")]
    db_path: Option<PathBuf>,

    /// Request timeout in seconds (default: 10)
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = match CrawlConfig::resolve(
        cli.start_url,
        cli.max_depth,
        cli.domain,
        cli.concurrency,
        cli.rate_limit,
        cli.db_path,
        cli.timeout,
    ) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        start_url = %config.start_url,
        concurrency = config.concurrency,
        rate_limit = config.rate_per_second,
        max_depth = ?config.max_depth,
        domain = ?config.allowed_host,
        db_path = %config.db_path.display(),
        "starting crawl"
    );

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    match crawl(config, cancel.clone()).await {
        Ok(snapshot) => {
            println!("{}", snapshot.summary_line());
            if cancel.is_cancelled() {
                std::process::exit(EXIT_INTERRUPTED);
            }
        }
        Err(e) => {
            tracing::error!("Crawl failed to start: {}", e);
            std::process::exit(1);
        }
    }
}

/// Cancels the crawl on Ctrl-C
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("cancellation signal received, draining workers");
            cancel.cancel();
        }
    });
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::new("crawldex=info,warn"),
        1 => EnvFilter::new("crawldex=debug,info"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
