//! Crawl frontier: queue, seen set, and drain detection
//!
//! The frontier owns the pending-URL queue, the set of every canonical URL
//! ever enqueued, and the in-flight counter. A single seen set covers both
//! queued and completed URLs, which guarantees each canonical URL is
//! dequeued at most once across the run. The run is over when the queue is
//! empty and nothing is in flight.

use crate::crawler::stats::CrawlStats;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;
use url::Url;

/// A URL queued for fetching together with its link depth
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Canonical URL
    pub url: Url,

    /// Distance from the seed along the discovery path
    pub depth: u32,
}

#[derive(Debug, Default)]
struct Inner {
    queue: VecDeque<FrontierEntry>,
    seen: HashSet<String>,
    in_flight: usize,
}

/// Shared frontier state with depth and domain filtering
#[derive(Debug)]
pub struct Frontier {
    inner: Mutex<Inner>,
    notify: Notify,
    max_depth: Option<u32>,
    allowed_host: Option<String>,
    stats: Arc<CrawlStats>,
}

impl Frontier {
    pub fn new(
        max_depth: Option<u32>,
        allowed_host: Option<String>,
        stats: Arc<CrawlStats>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            max_depth,
            allowed_host,
            stats,
        }
    }

    /// Enqueues the seed at depth 0
    ///
    /// The seed bypasses the depth and domain filters; those apply only to
    /// discovered links. Returns false when an equal canonical URL was
    /// already seeded.
    pub fn seed(&self, url: &Url) -> bool {
        let mut inner = self.inner.lock();
        if !inner.seen.insert(url.as_str().to_string()) {
            return false;
        }
        inner.queue.push_back(FrontierEntry {
            url: url.clone(),
            depth: 0,
        });
        drop(inner);

        self.notify.notify_waiters();
        true
    }

    /// Offers discovered links at `parent_depth + 1`
    ///
    /// Links past the depth bound, outside the allowed host, or already
    /// seen are skipped and counted; the rest are enqueued exactly once.
    pub fn offer(&self, links: Vec<Url>, parent_depth: u32) {
        let depth = parent_depth + 1;
        let mut enqueued = false;

        {
            let mut inner = self.inner.lock();
            for url in links {
                if let Some(max_depth) = self.max_depth {
                    if depth > max_depth {
                        self.stats.record_skipped_depth();
                        continue;
                    }
                }

                if let Some(allowed) = &self.allowed_host {
                    if url.host_str() != Some(allowed.as_str()) {
                        self.stats.record_skipped_domain();
                        continue;
                    }
                }

                if !inner.seen.insert(url.as_str().to_string()) {
                    self.stats.record_skipped_visited();
                    continue;
                }

                inner.queue.push_back(FrontierEntry { url, depth });
                enqueued = true;
            }
        }

        if enqueued {
            self.notify.notify_waiters();
        }
    }

    /// Takes the next entry, suspending while the queue is empty but work
    /// is still in flight
    ///
    /// Returns `None` when the frontier is drained: queue empty and
    /// `in_flight == 0`. Drained is terminal.
    pub async fn take(&self) -> Option<FrontierEntry> {
        loop {
            // Register for wakeups before inspecting state so a signal
            // between the check and the await is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.inner.lock();
                if let Some(entry) = inner.queue.pop_front() {
                    inner.in_flight += 1;
                    return Some(entry);
                }
                if inner.in_flight == 0 {
                    drop(inner);
                    // Wake the other takers so they observe the drain too.
                    self.notify.notify_waiters();
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Marks an entry as completed
    ///
    /// The seen set already covers completed URLs, so this only releases
    /// the in-flight slot and wakes suspended takers.
    pub fn done(&self, _url: &Url) {
        let drained = {
            let mut inner = self.inner.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
            inner.in_flight == 0 && inner.queue.is_empty()
        };

        if drained {
            self.notify.notify_waiters();
        }
    }

    /// Current queue length (approximate under concurrency)
    pub fn queue_len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Current in-flight count (approximate under concurrency)
    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight
    }
}
