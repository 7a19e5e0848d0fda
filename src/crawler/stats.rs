//! Crawl statistics aggregation
//!
//! Workers record events through atomic increments; the engine takes a
//! snapshot at termination and emits a single summary line. Counters are
//! monotonically increasing; mid-run reads are approximate by design.

use crate::crawler::fetcher::FailureKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters shared by all workers
#[derive(Debug)]
pub struct CrawlStats {
    started: Instant,
    fetched: AtomicU64,
    indexed: AtomicU64,
    retries: AtomicU64,
    skipped_depth: AtomicU64,
    skipped_domain: AtomicU64,
    skipped_visited: AtomicU64,
    failed_timeout: AtomicU64,
    failed_network: AtomicU64,
    failed_http4xx: AtomicU64,
    failed_http5xx: AtomicU64,
    failed_oversize: AtomicU64,
    failed_content_type: AtomicU64,
    failed_parse: AtomicU64,
    failed_index: AtomicU64,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            fetched: AtomicU64::new(0),
            indexed: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            skipped_depth: AtomicU64::new(0),
            skipped_domain: AtomicU64::new(0),
            skipped_visited: AtomicU64::new(0),
            failed_timeout: AtomicU64::new(0),
            failed_network: AtomicU64::new(0),
            failed_http4xx: AtomicU64::new(0),
            failed_http5xx: AtomicU64::new(0),
            failed_oversize: AtomicU64::new(0),
            failed_content_type: AtomicU64::new(0),
            failed_parse: AtomicU64::new(0),
            failed_index: AtomicU64::new(0),
        }
    }

    /// Records a terminally-processed frontier entry
    pub fn record_fetched(&self) {
        self.fetched.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successfully indexed page
    pub fn record_indexed(&self) {
        self.indexed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one retry attempt inside the fetcher
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_depth(&self) {
        self.skipped_depth.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_domain(&self) {
        self.skipped_domain.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_visited(&self) {
        self.skipped_visited.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a terminal fetch failure by kind
    ///
    /// Canceled fetches are not failures and are not counted.
    pub fn record_fetch_failure(&self, kind: FailureKind) {
        let counter = match kind {
            FailureKind::Timeout => &self.failed_timeout,
            FailureKind::Network => &self.failed_network,
            FailureKind::Http4xx => &self.failed_http4xx,
            FailureKind::Http5xx => &self.failed_http5xx,
            FailureKind::Oversize => &self.failed_oversize,
            FailureKind::BadContentType => &self.failed_content_type,
            FailureKind::Canceled => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_failure(&self) {
        self.failed_parse.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_index_failure(&self) {
        self.failed_index.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time snapshot of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            fetched: self.fetched.load(Ordering::Relaxed),
            indexed: self.indexed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            skipped_depth: self.skipped_depth.load(Ordering::Relaxed),
            skipped_domain: self.skipped_domain.load(Ordering::Relaxed),
            skipped_visited: self.skipped_visited.load(Ordering::Relaxed),
            failed_timeout: self.failed_timeout.load(Ordering::Relaxed),
            failed_network: self.failed_network.load(Ordering::Relaxed),
            failed_http4xx: self.failed_http4xx.load(Ordering::Relaxed),
            failed_http5xx: self.failed_http5xx.load(Ordering::Relaxed),
            failed_oversize: self.failed_oversize.load(Ordering::Relaxed),
            failed_content_type: self.failed_content_type.load(Ordering::Relaxed),
            failed_parse: self.failed_parse.load(Ordering::Relaxed),
            failed_index: self.failed_index.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }
}

impl Default for CrawlStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable view of the counters at one instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub fetched: u64,
    pub indexed: u64,
    pub retries: u64,
    pub skipped_depth: u64,
    pub skipped_domain: u64,
    pub skipped_visited: u64,
    pub failed_timeout: u64,
    pub failed_network: u64,
    pub failed_http4xx: u64,
    pub failed_http5xx: u64,
    pub failed_oversize: u64,
    pub failed_content_type: u64,
    pub failed_parse: u64,
    pub failed_index: u64,
    pub elapsed: Duration,
}

impl StatsSnapshot {
    /// Total failures across all kinds
    pub fn failed(&self) -> u64 {
        self.failed_timeout
            + self.failed_network
            + self.failed_http4xx
            + self.failed_http5xx
            + self.failed_oversize
            + self.failed_content_type
            + self.failed_parse
            + self.failed_index
    }

    /// Formats the single-line report emitted on termination
    pub fn summary_line(&self) -> String {
        format!(
            "crawl finished: fetched={} indexed={} failed={} retries={} \
             skipped_depth={} skipped_domain={} skipped_visited={} elapsed={:.3}s",
            self.fetched,
            self.indexed,
            self.failed(),
            self.retries,
            self.skipped_depth,
            self.skipped_domain,
            self.skipped_visited,
            self.elapsed.as_secs_f64(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = CrawlStats::new();
        stats.record_fetched();
        stats.record_fetched();
        stats.record_indexed();
        stats.record_retry();
        stats.record_fetch_failure(FailureKind::Http5xx);

        let snap = stats.snapshot();
        assert_eq!(snap.fetched, 2);
        assert_eq!(snap.indexed, 1);
        assert_eq!(snap.retries, 1);
        assert_eq!(snap.failed_http5xx, 1);
        assert_eq!(snap.failed(), 1);
    }

    #[test]
    fn test_canceled_not_counted() {
        let stats = CrawlStats::new();
        stats.record_fetch_failure(FailureKind::Canceled);
        assert_eq!(stats.snapshot().failed(), 0);
    }

    #[test]
    fn test_failure_kinds_partitioned() {
        let stats = CrawlStats::new();
        for kind in [
            FailureKind::Timeout,
            FailureKind::Network,
            FailureKind::Http4xx,
            FailureKind::Http5xx,
            FailureKind::Oversize,
            FailureKind::BadContentType,
        ] {
            stats.record_fetch_failure(kind);
        }
        stats.record_parse_failure();
        stats.record_index_failure();

        let snap = stats.snapshot();
        assert_eq!(snap.failed(), 8);
        assert_eq!(snap.failed_timeout, 1);
        assert_eq!(snap.failed_parse, 1);
        assert_eq!(snap.failed_index, 1);
    }

    #[test]
    fn test_summary_line_contains_counters() {
        let stats = CrawlStats::new();
        stats.record_fetched();
        stats.record_indexed();

        let line = stats.snapshot().summary_line();
        assert!(line.contains("fetched=1"));
        assert!(line.contains("indexed=1"));
        assert!(line.contains("failed=0"));
        assert!(line.contains("elapsed="));
    }
}
