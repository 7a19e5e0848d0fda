//! Storage module: the durable page index
//!
//! The index is a single SQLite `pages` table with upsert-by-URL
//! semantics. Workers hand records to an [`Indexer`] handle; a dedicated
//! writer thread owns the connection and serializes all writes, so callers
//! never contend on the database itself.

mod schema;
mod sqlite;

pub use schema::{initialize_schema, SCHEMA_SQL};
pub use sqlite::{Indexer, PageStore};

use thiserror::Error;

/// Maximum length of `text_preview`, in Unicode codepoints
pub const PREVIEW_CODEPOINTS: usize = 500;

/// A page record handed to the indexer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    /// Canonical URL; the unique key
    pub url: String,

    /// Page title; empty when the document had none
    pub title: String,

    /// Extracted keywords, most frequent first
    pub keywords: Vec<String>,

    /// First [`PREVIEW_CODEPOINTS`] codepoints of the page text
    pub text_preview: String,
}

impl PageRecord {
    /// Builds a record, truncating the text to the preview bound
    pub fn new(url: String, title: String, keywords: Vec<String>, text: &str) -> Self {
        Self {
            url,
            title,
            keywords,
            text_preview: text.chars().take(PREVIEW_CODEPOINTS).collect(),
        }
    }
}

/// A page row read back from the index
#[derive(Debug, Clone)]
pub struct StoredPage {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub keywords: Vec<String>,
    pub text_preview: String,
    pub crawled_at: String,
    pub updated_at: String,
}

/// Errors surfaced by index operations
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("database error: {0}")]
    Database(String),

    #[error("indexer is closed")]
    Closed,
}
