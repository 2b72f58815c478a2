//! Storage module for the source registry and discovered games
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Source registry reads and writes, including the resume cursor
//! - Per-node poll timestamps used for crawl-delay accounting
//! - Game upserts and lookups

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage handle shared between the scheduler, walker and item sink
///
/// Locks are only ever held for the duration of a single storage call and
/// never across an `.await`.
pub type SharedStorage = Arc<Mutex<dyn Storage + Send>>;

/// Wraps a storage backend into a [`SharedStorage`] handle
pub fn share<S: Storage + Send + 'static>(storage: S) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Locks a shared storage handle, mapping lock poisoning to a storage error
pub fn lock(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, dyn Storage + Send + 'static>> {
    storage.lock().map_err(|_| StorageError::LockPoisoned)
}

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// A registered game source site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Unique name of the source
    pub name: String,

    /// Start page of the listing
    pub url: String,

    /// Selector for game links on a listing page
    pub link_selector: String,

    /// Selector for the link to the next listing page
    pub next_page_selector: String,

    /// Page to fetch next; `None` starts from `url`
    #[serde(default)]
    pub current_page: Option<String>,

    /// Last fetch time per crawling node
    #[serde(default)]
    pub last_polled: HashMap<String, DateTime<Utc>>,
}

impl Source {
    /// Creates a source with no crawl progress
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        link_selector: impl Into<String>,
        next_page_selector: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            link_selector: link_selector.into(),
            next_page_selector: next_page_selector.into(),
            current_page: None,
            last_polled: HashMap::new(),
        }
    }

    /// Returns when the given node last fetched a page of this source
    pub fn last_polled_by(&self, node: &str) -> Option<DateTime<Utc>> {
        self.last_polled.get(node).copied()
    }

    /// Returns true if a previous walk stopped part-way through the listing
    pub fn is_in_progress(&self) -> bool {
        self.current_page.is_some()
    }
}

/// A discovered game listing
///
/// Serialized as `{"name", "link", "sourceName", "updatedAt"}` when
/// published onto the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    /// Unique name, taken from the scraped link text
    pub name: String,

    /// Target URL of the listing
    pub link: String,

    /// Name of the source that last listed this game
    pub source_name: String,

    /// When the record was last written
    pub updated_at: DateTime<Utc>,
}
