//! Crawl configuration and option resolution
//!
//! Options come from three layers: command-line flags, environment variables,
//! and built-in defaults. The CLI wins when both a flag and an environment
//! variable are present; environment variables override only the defaults.

use crate::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the default worker count
pub const ENV_CONCURRENCY: &str = "CRAWLER_CONCURRENCY";

/// Environment variable overriding the default per-host rate limit
pub const ENV_RATE_LIMIT: &str = "CRAWLER_RATE_LIMIT";

/// Environment variable overriding the default database path
pub const ENV_DB_PATH: &str = "CRAWLER_DB_PATH";

const DEFAULT_CONCURRENCY: usize = 10;
const DEFAULT_RATE_LIMIT: f64 = 5.0;
const DEFAULT_DB_PATH: &str = "crawler_index.db";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Resolved crawler configuration
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Seed URL supplied on the command line (not yet normalized)
    pub start_url: String,

    /// Maximum link depth, inclusive; `None` means unbounded
    pub max_depth: Option<u32>,

    /// Restrict link discovery to this host; `None` means any host
    pub allowed_host: Option<String>,

    /// Number of worker tasks
    pub concurrency: usize,

    /// Requests per second, applied independently per host
    pub rate_per_second: f64,

    /// SQLite database file path
    pub db_path: PathBuf,

    /// Per-attempt HTTP timeout
    pub timeout: Duration,
}

impl CrawlConfig {
    /// Builds a configuration from CLI-supplied options
    ///
    /// Each `None` option falls back to the matching environment variable,
    /// then to the built-in default. The result is validated before return.
    #[allow(clippy::too_many_arguments)]
    pub fn resolve(
        start_url: String,
        max_depth: Option<u32>,
        allowed_host: Option<String>,
        concurrency: Option<usize>,
        rate_per_second: Option<f64>,
        db_path: Option<PathBuf>,
        timeout_secs: Option<u64>,
    ) -> Result<Self, ConfigError> {
        let concurrency = match concurrency {
            Some(n) => n,
            None => env_override::<usize>(ENV_CONCURRENCY)?.unwrap_or(DEFAULT_CONCURRENCY),
        };

        let rate_per_second = match rate_per_second {
            Some(r) => r,
            None => env_override::<f64>(ENV_RATE_LIMIT)?.unwrap_or(DEFAULT_RATE_LIMIT),
        };

        let db_path = match db_path {
            Some(p) => p,
            None => std::env::var(ENV_DB_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB_PATH)),
        };

        let config = Self {
            start_url,
            max_depth,
            allowed_host: allowed_host.map(|h| h.to_lowercase()),
            concurrency,
            rate_per_second,
            db_path,
            timeout: Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates option ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency < 1 {
            return Err(ConfigError::InvalidValue {
                name: "concurrency",
                value: self.concurrency.to_string(),
            });
        }

        if !(self.rate_per_second > 0.0) || !self.rate_per_second.is_finite() {
            return Err(ConfigError::InvalidValue {
                name: "rate-limit",
                value: self.rate_per_second.to_string(),
            });
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "timeout",
                value: "0".to_string(),
            });
        }

        Ok(())
    }
}

/// Reads and parses an environment variable override
///
/// Returns `Ok(None)` when the variable is unset; a set-but-unparseable
/// value is a configuration error rather than a silent fallback.
fn env_override<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value: raw }),
        Err(_) => Ok(None),
    }
}
