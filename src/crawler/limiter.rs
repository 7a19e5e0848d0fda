//! Per-host request pacing
//!
//! A degenerate token bucket: one token per host, refilled at the configured
//! rate, which reduces to enforcing a minimum interval of `1/rate` between
//! successive request starts on the same host. Hosts never seen before
//! acquire immediately.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Per-host rate limiter
///
/// `acquire` calls on the same host serialize in arrival order; calls on
/// distinct hosts proceed in parallel. A single global rate is applied
/// independently per host.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    hosts: Mutex<HashMap<String, Arc<HostSlot>>>,
}

#[derive(Debug, Default)]
struct HostSlot {
    // Holding this lock is what serializes same-host acquirers; the tokio
    // mutex hands it over in FIFO order.
    last_issued: tokio::sync::Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter enforcing `rate_per_second` requests per host
    ///
    /// The rate must be positive; configuration validation guarantees this
    /// before construction.
    pub fn new(rate_per_second: f64) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / rate_per_second),
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Waits until a request to `host` is allowed to start, then claims the slot
    pub async fn acquire(&self, host: &str) {
        let slot = {
            let mut hosts = self.hosts.lock();
            Arc::clone(hosts.entry(host.to_string()).or_default())
        };

        let mut last_issued = slot.last_issued.lock().await;
        if let Some(last) = *last_issued {
            let ready_at = last + self.interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last_issued = Some(Instant::now());
    }

    /// Number of hosts currently tracked
    pub fn tracked_hosts(&self) -> usize {
        self.hosts.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_is_immediate() {
        let limiter = RateLimiter::new(1.0);
        let start = Instant::now();
        limiter.acquire("example.com").await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_host_paced() {
        let limiter = RateLimiter::new(2.0);
        let start = Instant::now();

        limiter.acquire("example.com").await;
        limiter.acquire("example.com").await;
        limiter.acquire("example.com").await;

        // Two inter-request gaps of 500ms each.
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_hosts_independent() {
        let limiter = RateLimiter::new(1.0);
        let start = Instant::now();

        limiter.acquire("a.com").await;
        limiter.acquire("b.com").await;
        limiter.acquire("c.com").await;

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.tracked_hosts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_same_host_serialized() {
        let limiter = Arc::new(RateLimiter::new(10.0));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..5 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.acquire("example.com").await;
                Instant::now()
            }));
        }

        let mut times = Vec::new();
        for handle in handles {
            times.push(handle.await.unwrap());
        }
        times.sort();

        // Successive request starts are at least 1/rate apart.
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100));
        }
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_host_acquires_immediately() {
        let limiter = RateLimiter::new(1.0);
        limiter.acquire("example.com").await;

        tokio::time::sleep(Duration::from_secs(5)).await;

        let start = Instant::now();
        limiter.acquire("example.com").await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
