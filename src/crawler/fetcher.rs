//! HTTP fetcher
//!
//! All page retrieval goes through one shared `reqwest::Client` so
//! connections are pooled and kept alive across fetches. The fetcher owns:
//! - Error classification into retryable and terminal kinds
//! - Retry with exponential backoff for transient failures
//! - The streaming body-size cap
//! - Cancellation at every suspension point

use crate::crawler::stats::CrawlStats;
use reqwest::header::CONTENT_TYPE;
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// User agent sent with every request
pub const USER_AGENT: &str = "ConcurrentCrawler/1.0";

/// Streaming body read cap; a response of exactly this size is accepted
pub const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// Maximum redirect hops followed by the client
const MAX_REDIRECTS: usize = 5;

/// Classification of a terminal fetch failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Timeout,
    Network,
    Http4xx,
    Http5xx,
    Oversize,
    BadContentType,
    Canceled,
}

impl FailureKind {
    /// Whether a failure of this kind is worth another attempt
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Timeout | Self::Network | Self::Http5xx)
    }

    /// Stable tag used in log records
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::Http4xx => "http_4xx",
            Self::Http5xx => "http_5xx",
            Self::Oversize => "oversize",
            Self::BadContentType => "bad_content_type",
            Self::Canceled => "canceled",
        }
    }
}

/// Result of a fetch operation, after all retries
#[derive(Debug)]
pub enum FetchOutcome {
    /// The page body was retrieved
    Success {
        /// Final URL after redirects
        final_url: Url,
        /// HTTP status code
        status: u16,
        /// Raw body bytes; decoding is the parser's concern
        body: Vec<u8>,
        /// Content-Type header value
        content_type: String,
        /// Wall time across all attempts
        elapsed: Duration,
    },

    /// The fetch failed terminally
    Failure {
        kind: FailureKind,
        message: String,
        /// Attempts performed, including the first
        attempts: u32,
    },
}

/// Retry policy for transient failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay before retry number `retry` (0-indexed)
    fn delay_for_retry(&self, retry: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(retry)
    }
}

/// HTTP fetcher with a shared connection pool
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
    stats: Arc<CrawlStats>,
}

impl Fetcher {
    /// Builds a fetcher with a freshly configured client
    ///
    /// # Arguments
    ///
    /// * `timeout` - Per-attempt timeout covering connect through body read
    /// * `policy` - Retry policy for transient failures
    /// * `stats` - Counter sink for retry accounting
    pub fn new(
        timeout: Duration,
        policy: RetryPolicy,
        stats: Arc<CrawlStats>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            policy,
            stats,
        })
    }

    /// Fetches a URL, retrying transient failures
    ///
    /// Timeouts, network errors, and HTTP 5xx are retried up to the policy's
    /// limit with exponentially growing delays. 4xx, oversize, and
    /// content-type mismatches are terminal on first sight. Cancellation is
    /// observed during the request, the body read, and the backoff sleeps;
    /// a canceled fetch returns promptly and starts no further retries.
    pub async fn fetch(&self, url: &Url, cancel: &CancellationToken) -> FetchOutcome {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    Err((FailureKind::Canceled, "crawl canceled".to_string()))
                }
                result = self.fetch_once(url) => result,
            };

            match result {
                Ok((final_url, status, content_type, body)) => {
                    return FetchOutcome::Success {
                        final_url,
                        status,
                        body,
                        content_type,
                        elapsed: started.elapsed(),
                    };
                }
                Err((kind, message)) => {
                    let retries_done = attempt - 1;
                    if !kind.is_retryable() || retries_done >= self.policy.max_retries {
                        return FetchOutcome::Failure {
                            kind,
                            message,
                            attempts: attempt,
                        };
                    }

                    let delay = self.policy.delay_for_retry(retries_done);
                    tracing::debug!(
                        url = %url,
                        kind = kind.as_str(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying fetch"
                    );
                    self.stats.record_retry();

                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return FetchOutcome::Failure {
                                kind: FailureKind::Canceled,
                                message: "crawl canceled".to_string(),
                                attempts: attempt,
                            };
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Performs a single attempt without retry logic
    async fn fetch_once(
        &self,
        url: &Url,
    ) -> Result<(Url, u16, String, Vec<u8>), (FailureKind, String)> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if status.is_client_error() {
            return Err((FailureKind::Http4xx, format!("HTTP {}", status)));
        }
        if status.is_server_error() {
            return Err((FailureKind::Http5xx, format!("HTTP {}", status)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !is_html_content_type(&content_type) {
            // Headers are enough to rule the page out; skip the body read.
            return Err((
                FailureKind::BadContentType,
                format!("content-type '{}'", content_type),
            ));
        }

        if let Some(length) = response.content_length() {
            if length > MAX_BODY_BYTES {
                return Err((
                    FailureKind::Oversize,
                    format!("declared length {} exceeds {} bytes", length, MAX_BODY_BYTES),
                ));
            }
        }

        let final_url = response.url().clone();
        let status = status.as_u16();

        let mut body: Vec<u8> = Vec::new();
        let mut response = response;
        while let Some(chunk) = response.chunk().await.map_err(classify_error)? {
            if body.len() as u64 + chunk.len() as u64 > MAX_BODY_BYTES {
                return Err((
                    FailureKind::Oversize,
                    format!("body exceeds {} bytes", MAX_BODY_BYTES),
                ));
            }
            body.extend_from_slice(&chunk);
        }

        Ok((final_url, status, content_type, body))
    }
}

/// Classifies a reqwest error into a failure kind
fn classify_error(error: reqwest::Error) -> (FailureKind, String) {
    if error.is_timeout() {
        (FailureKind::Timeout, "request timeout".to_string())
    } else if error.is_redirect() {
        (
            FailureKind::Network,
            format!("redirect limit of {} exceeded", MAX_REDIRECTS),
        )
    } else if let Some(status) = error.status() {
        if status.is_server_error() {
            (FailureKind::Http5xx, format!("HTTP {}", status))
        } else if status.is_client_error() {
            (FailureKind::Http4xx, format!("HTTP {}", status))
        } else {
            (FailureKind::Network, error.to_string())
        }
    } else {
        (FailureKind::Network, error.to_string())
    }
}

/// Whether a Content-Type header value denotes an HTML page
fn is_html_content_type(value: &str) -> bool {
    value
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("text/html")
}
