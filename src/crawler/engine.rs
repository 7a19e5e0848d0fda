//! Crawl engine: worker pool, pipeline orchestration, and shutdown
//!
//! The engine owns a fixed pool of worker tasks. Each worker loops over
//! take → rate-limit → fetch → parse → index → offer, so the worker count
//! is the bound on in-flight fetches. A worker blocked on the rate limiter
//! holds no other resource. The run ends when the frontier drains or the
//! cancellation token fires; canceled workers finish their current step,
//! skip offering new links, and exit.

use crate::config::CrawlConfig;
use crate::crawler::fetcher::{FailureKind, FetchOutcome, Fetcher, RetryPolicy};
use crate::crawler::frontier::{Frontier, FrontierEntry};
use crate::crawler::limiter::RateLimiter;
use crate::crawler::parser;
use crate::crawler::stats::{CrawlStats, StatsSnapshot};
use crate::storage::{Indexer, PageRecord};
use crate::url::normalize_url;
use crate::{ConfigError, CrawlError};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// How long canceled workers get to finish their current step
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Crawl engine owning the worker pool and the shared components
pub struct Engine {
    concurrency: usize,
    frontier: Arc<Frontier>,
    fetcher: Arc<Fetcher>,
    limiter: Arc<RateLimiter>,
    indexer: Arc<Indexer>,
    stats: Arc<CrawlStats>,
    cancel: CancellationToken,
}

impl Engine {
    /// Builds an engine and seeds the frontier
    ///
    /// Fails when the seed URL does not normalize or the HTTP client cannot
    /// be built; both are fatal initialization errors.
    pub fn new(
        config: &CrawlConfig,
        indexer: Arc<Indexer>,
        cancel: CancellationToken,
    ) -> Result<Self, CrawlError> {
        Self::with_retry_policy(config, indexer, cancel, RetryPolicy::default())
    }

    /// Builds an engine with a custom fetch retry policy
    pub fn with_retry_policy(
        config: &CrawlConfig,
        indexer: Arc<Indexer>,
        cancel: CancellationToken,
        policy: RetryPolicy,
    ) -> Result<Self, CrawlError> {
        let seed =
            normalize_url(&config.start_url, None).map_err(|e| ConfigError::InvalidSeed {
                url: config.start_url.clone(),
                reason: e.to_string(),
            })?;

        let stats = Arc::new(CrawlStats::new());
        let frontier = Arc::new(Frontier::new(
            config.max_depth,
            config.allowed_host.clone(),
            Arc::clone(&stats),
        ));
        frontier.seed(&seed);

        let fetcher = Arc::new(Fetcher::new(config.timeout, policy, Arc::clone(&stats))?);
        let limiter = Arc::new(RateLimiter::new(config.rate_per_second));

        Ok(Self {
            concurrency: config.concurrency,
            frontier,
            fetcher,
            limiter,
            indexer,
            stats,
            cancel,
        })
    }

    /// Runs the crawl to completion or cancellation
    ///
    /// Always closes the indexer before returning, so the returned snapshot
    /// reflects everything that was durably written.
    pub async fn run(&self) -> StatsSnapshot {
        let mut workers = JoinSet::new();
        for worker_id in 0..self.concurrency {
            let ctx = WorkerCtx {
                frontier: Arc::clone(&self.frontier),
                fetcher: Arc::clone(&self.fetcher),
                limiter: Arc::clone(&self.limiter),
                indexer: Arc::clone(&self.indexer),
                stats: Arc::clone(&self.stats),
                cancel: self.cancel.clone(),
            };
            workers.spawn(run_worker(worker_id, ctx));
        }

        let deadline = async {
            self.cancel.cancelled().await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        };
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                joined = workers.join_next() => {
                    if joined.is_none() {
                        break;
                    }
                }
                _ = &mut deadline => {
                    tracing::warn!(
                        grace_secs = SHUTDOWN_GRACE.as_secs(),
                        "shutdown grace period elapsed, aborting remaining workers"
                    );
                    workers.shutdown().await;
                    break;
                }
            }
        }

        self.indexer.close().await;
        self.stats.snapshot()
    }
}

/// Everything one worker needs, cloned per task
struct WorkerCtx {
    frontier: Arc<Frontier>,
    fetcher: Arc<Fetcher>,
    limiter: Arc<RateLimiter>,
    indexer: Arc<Indexer>,
    stats: Arc<CrawlStats>,
    cancel: CancellationToken,
}

async fn run_worker(worker_id: usize, ctx: WorkerCtx) {
    loop {
        let entry = tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            taken = ctx.frontier.take() => match taken {
                Some(entry) => entry,
                None => break,
            },
        };

        process_entry(&ctx, &entry).await;
        ctx.frontier.done(&entry.url);
    }

    tracing::debug!(worker = worker_id, "worker exiting");
}

/// Runs one frontier entry through the fetch → parse → index pipeline
async fn process_entry(ctx: &WorkerCtx, entry: &FrontierEntry) {
    let host = entry.url.host_str().unwrap_or_default().to_string();

    tokio::select! {
        _ = ctx.cancel.cancelled() => return,
        _ = ctx.limiter.acquire(&host) => {}
    }

    match ctx.fetcher.fetch(&entry.url, &ctx.cancel).await {
        FetchOutcome::Success {
            final_url,
            status,
            body,
            content_type: _,
            elapsed,
        } => {
            ctx.stats.record_fetched();

            // Redirects may have moved the page; the final URL is the one
            // that gets indexed and the base links resolve against.
            let page_url = normalize_url(final_url.as_str(), None)
                .unwrap_or_else(|_| entry.url.clone());

            tracing::debug!(
                url = %entry.url,
                status,
                elapsed_ms = elapsed.as_millis() as u64,
                "fetched page"
            );

            match parser::parse(&body, &page_url) {
                Ok(parsed) => {
                    let record = PageRecord::new(
                        page_url.as_str().to_string(),
                        parsed.title,
                        parsed.keywords,
                        &parsed.text,
                    );

                    match ctx.indexer.index(record).await {
                        Ok(()) => ctx.stats.record_indexed(),
                        Err(error) => {
                            ctx.stats.record_index_failure();
                            tracing::warn!(url = %page_url, kind = "index", error = %error, "failed to index page");
                        }
                    }

                    if !ctx.cancel.is_cancelled() {
                        ctx.frontier.offer(parsed.links, entry.depth);
                    }
                }
                Err(error) => {
                    ctx.stats.record_parse_failure();
                    tracing::warn!(url = %page_url, kind = "parse", error = %error, "failed to parse page");
                }
            }
        }

        FetchOutcome::Failure {
            kind: FailureKind::Canceled,
            ..
        } => {}

        FetchOutcome::Failure {
            kind,
            message,
            attempts,
        } => {
            ctx.stats.record_fetched();
            ctx.stats.record_fetch_failure(kind);
            tracing::warn!(
                url = %entry.url,
                kind = kind.as_str(),
                attempts,
                "fetch failed: {message}"
            );
        }
    }
}
