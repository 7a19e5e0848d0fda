//! Crawler module: the concurrent crawl pipeline
//!
//! This module contains the core crawling machinery:
//! - HTTP fetching with retry and body-size caps
//! - HTML parsing and link extraction
//! - Per-host rate limiting
//! - The frontier (queue + seen set + drain detection)
//! - The worker-pool engine and its shutdown protocol
//! - Statistics aggregation

mod engine;
mod fetcher;
mod frontier;
mod limiter;
mod parser;
mod stats;

pub use engine::Engine;
pub use fetcher::{FailureKind, FetchOutcome, Fetcher, RetryPolicy, MAX_BODY_BYTES, USER_AGENT};
pub use frontier::{Frontier, FrontierEntry};
pub use limiter::RateLimiter;
pub use parser::{parse, ParseError, ParsedPage};
pub use stats::{CrawlStats, StatsSnapshot};

use crate::config::CrawlConfig;
use crate::storage::Indexer;
use crate::CrawlError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl
///
/// Opens the index at the configured path, seeds the frontier with the
/// start URL, and runs the worker pool until the frontier drains or
/// `cancel` fires. The indexer is closed before this returns, so every
/// record reflected in the snapshot is durable.
///
/// # Arguments
///
/// * `config` - Resolved crawler configuration
/// * `cancel` - Cancellation signal observed at every suspension point
///
/// # Returns
///
/// * `Ok(StatsSnapshot)` - Final counters, including after cancellation
/// * `Err(CrawlError)` - Fatal initialization failure
pub async fn crawl(
    config: CrawlConfig,
    cancel: CancellationToken,
) -> Result<StatsSnapshot, CrawlError> {
    let indexer = Arc::new(Indexer::open(&config.db_path)?);
    let engine = Engine::new(&config, indexer, cancel)?;
    Ok(engine.run().await)
}
