//! SQLite-backed page store and the async indexer handle
//!
//! [`PageStore`] is the synchronous connection owner. [`Indexer`] wraps it
//! in a dedicated writer thread fed by a bounded channel, which serializes
//! writes and gives workers an await-able upsert with per-record replies.

use crate::storage::schema::initialize_schema;
use crate::storage::{IndexError, PageRecord, StoredPage};
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Delay before the single retry of a transient write failure
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Writer channel capacity; senders back off when the writer falls behind
const CHANNEL_CAPACITY: usize = 64;

/// Synchronous page store owning the SQLite connection
pub struct PageStore {
    conn: Connection,
}

impl PageStore {
    /// Opens or creates the index database at `path`
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Upserts a page record keyed by URL
    ///
    /// A fresh URL is inserted with both timestamps set to now; an existing
    /// URL keeps its `crawled_at` and gets new content fields and
    /// `updated_at`.
    pub fn upsert(&self, record: &PageRecord) -> Result<(), rusqlite::Error> {
        let now = now_timestamp();
        let keywords =
            serde_json::to_string(&record.keywords).unwrap_or_else(|_| String::from("[]"));

        self.conn.execute(
            "INSERT INTO pages (url, title, keywords, text_preview, crawled_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(url) DO UPDATE SET
                 title = excluded.title,
                 keywords = excluded.keywords,
                 text_preview = excluded.text_preview,
                 updated_at = excluded.updated_at",
            params![record.url, record.title, keywords, record.text_preview, now],
        )?;

        Ok(())
    }

    /// Looks up a page by canonical URL
    pub fn get_page(&self, url: &str) -> Result<Option<StoredPage>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, url, title, keywords, text_preview, crawled_at, updated_at
             FROM pages WHERE url = ?1",
        )?;

        let page = stmt
            .query_row(params![url], |row| {
                let keywords: Option<String> = row.get(3)?;
                Ok(StoredPage {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    title: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    keywords: keywords
                        .and_then(|s| serde_json::from_str(&s).ok())
                        .unwrap_or_default(),
                    text_preview: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    crawled_at: row.get(5)?,
                    updated_at: row.get(6)?,
                })
            })
            .optional()?;

        Ok(page)
    }

    /// Total number of indexed pages
    pub fn count_pages(&self) -> Result<u64, rusqlite::Error> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// RFC 3339 timestamp with millisecond resolution
///
/// Lexicographic order on these strings matches chronological order, which
/// the `updated_at >= crawled_at` comparison in tests relies on.
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Whether a write failure is worth a single retry
fn is_transient(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _) if matches!(
            e.code,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::SystemIoFailure
        )
    )
}

enum Command {
    Index {
        record: PageRecord,
        reply: oneshot::Sender<Result<(), IndexError>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Async handle to the single-writer index
///
/// Clonable across workers via `Arc`; all writes funnel through one thread
/// so concurrent callers never contend on the connection.
pub struct Indexer {
    tx: mpsc::Sender<Command>,
    writer: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl Indexer {
    /// Opens the index and starts the writer thread
    ///
    /// The database is opened on the caller's thread so startup failures
    /// (bad path, corrupt file) surface here as fatal errors.
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let store = PageStore::open(path)?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let writer = std::thread::spawn(move || writer_loop(store, rx));

        Ok(Self {
            tx,
            writer: Mutex::new(Some(writer)),
        })
    }

    /// Upserts a record, waiting for the write to be acknowledged
    ///
    /// A transient failure is retried once by the writer after
    /// [`RETRY_DELAY`]; if it persists, the error comes back as
    /// recoverable and the caller decides what to count. After
    /// [`Indexer::close`], this fails fast with [`IndexError::Closed`].
    pub async fn index(&self, record: PageRecord) -> Result<(), IndexError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Index {
                record,
                reply: reply_tx,
            })
            .await
            .map_err(|_| IndexError::Closed)?;

        reply_rx.await.map_err(|_| IndexError::Closed)?
    }

    /// Flushes pending writes and releases the database
    pub async fn close(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(Command::Close { reply: reply_tx })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }

        // The writer has already exited once the close is acknowledged, so
        // the join returns immediately.
        let handle = self.writer.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

fn writer_loop(store: PageStore, mut rx: mpsc::Receiver<Command>) {
    while let Some(command) = rx.blocking_recv() {
        match command {
            Command::Index { record, reply } => {
                let result = store.upsert(&record).or_else(|error| {
                    if is_transient(&error) {
                        tracing::warn!(
                            url = %record.url,
                            error = %error,
                            "transient index failure, retrying once"
                        );
                        std::thread::sleep(RETRY_DELAY);
                        store.upsert(&record)
                    } else {
                        Err(error)
                    }
                });

                let _ = reply.send(result.map_err(|e| IndexError::Database(e.to_string())));
            }
            Command::Close { reply } => {
                // Refuse queued and future sends, then release the
                // connection before acknowledging.
                rx.close();
                drop(store);
                let _ = reply.send(());
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(url: &str, title: &str) -> PageRecord {
        PageRecord::new(
            url.to_string(),
            title.to_string(),
            vec!["alpha".to_string(), "beta".to_string()],
            "body text",
        )
    }

    #[test]
    fn test_upsert_inserts_fresh_row() {
        let store = PageStore::open_in_memory().unwrap();
        store.upsert(&record("http://example.com/", "Home")).unwrap();

        let page = store.get_page("http://example.com/").unwrap().unwrap();
        assert_eq!(page.title, "Home");
        assert_eq!(page.keywords, vec!["alpha", "beta"]);
        assert_eq!(page.text_preview, "body text");
        assert_eq!(page.crawled_at, page.updated_at);
    }

    #[test]
    fn test_upsert_updates_existing_row() {
        let store = PageStore::open_in_memory().unwrap();
        store.upsert(&record("http://example.com/", "Old")).unwrap();
        let before = store.get_page("http://example.com/").unwrap().unwrap();

        std::thread::sleep(Duration::from_millis(5));
        store.upsert(&record("http://example.com/", "New")).unwrap();
        let after = store.get_page("http://example.com/").unwrap().unwrap();

        assert_eq!(after.id, before.id);
        assert_eq!(after.title, "New");
        assert_eq!(after.crawled_at, before.crawled_at);
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(store.count_pages().unwrap(), 1);
    }

    #[test]
    fn test_keywords_stored_as_json_array() {
        let store = PageStore::open_in_memory().unwrap();
        store.upsert(&record("http://example.com/", "T")).unwrap();

        let raw: String = store
            .conn
            .query_row(
                "SELECT keywords FROM pages WHERE url = 'http://example.com/'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(raw, r#"["alpha","beta"]"#);
    }

    #[test]
    fn test_missing_page_is_none() {
        let store = PageStore::open_in_memory().unwrap();
        assert!(store.get_page("http://nowhere/").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_indexer_roundtrip() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("index.db");

        let indexer = Indexer::open(&db_path).unwrap();
        indexer
            .index(record("http://example.com/", "Home"))
            .await
            .unwrap();
        indexer.close().await;

        let store = PageStore::open(&db_path).unwrap();
        assert_eq!(store.count_pages().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_index_after_close_fails_fast() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("index.db");

        let indexer = Indexer::open(&db_path).unwrap();
        indexer.close().await;

        let result = indexer.index(record("http://example.com/", "Late")).await;
        assert!(matches!(result, Err(IndexError::Closed)));
    }

    #[tokio::test]
    async fn test_concurrent_index_calls() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("index.db");
        let indexer = std::sync::Arc::new(Indexer::open(&db_path).unwrap());

        let mut handles = Vec::new();
        for i in 0..20 {
            let indexer = std::sync::Arc::clone(&indexer);
            handles.push(tokio::spawn(async move {
                indexer
                    .index(record(&format!("http://example.com/{}", i), "page"))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        indexer.close().await;

        let store = PageStore::open(&db_path).unwrap();
        assert_eq!(store.count_pages().unwrap(), 20);
    }

    #[test]
    fn test_transient_classification() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(is_transient(&busy));

        let misuse = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_MISUSE),
            None,
        );
        assert!(!is_transient(&misuse));
    }
}
