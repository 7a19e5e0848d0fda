//! Crawldex: a concurrent web crawler and content indexer
//!
//! This crate fetches HTML pages starting from a seed URL, extracts titles,
//! visible text, keywords, and links, stores a per-page record in a local
//! SQLite index, and recursively explores discovered links subject to depth,
//! domain, concurrency, and per-host rate bounds.

pub mod config;
pub mod crawler;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for crawldex operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Index error: {0}")]
    Index(#[from] storage::IndexError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid seed URL '{url}': {reason}")]
    InvalidSeed { url: String, reason: String },

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Invalid value in {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
}

/// URL normalization errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Unsupported URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing or empty host")]
    MissingHost,

    #[error("Host is not ASCII: {0}")]
    NonAsciiHost(String),

    #[error("URL exceeds {limit} bytes")]
    TooLong { limit: usize },
}

/// Result type alias for crawldex operations
pub type Result<T> = std::result::Result<T, CrawlError>;

// Re-export commonly used types
pub use config::CrawlConfig;
pub use crawler::{crawl, StatsSnapshot};
pub use url::normalize_url;
