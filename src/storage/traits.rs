//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{Game, Source};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The crawler consumes the registry half (sources, cursor, poll
/// timestamps) and owns the game half.
pub trait Storage {
    // ===== Source Registry =====

    /// Gets every registered source, ordered by name
    fn get_all_sources(&self) -> StorageResult<Vec<Source>>;

    /// Gets a source by name
    fn find_source(&self, name: &str) -> StorageResult<Option<Source>>;

    /// Registers a new source
    ///
    /// The cursor and poll timestamps on `source` are ignored; a new source
    /// always starts from its base URL.
    fn insert_source(&mut self, source: &Source) -> StorageResult<()>;

    /// Updates a source's URL and selectors, keeping its crawl progress
    fn update_source(&mut self, source: &Source) -> StorageResult<()>;

    /// Deletes a source and its poll timestamps
    ///
    /// # Returns
    ///
    /// `true` if a source with that name existed
    fn delete_source(&mut self, name: &str) -> StorageResult<bool>;

    /// Sets or clears the resume cursor of a source
    ///
    /// # Arguments
    ///
    /// * `name` - The source name
    /// * `page` - The next page to fetch, or `None` to start from the base URL
    fn update_page(&mut self, name: &str, page: Option<&str>) -> StorageResult<()>;

    /// Records that `node` fetched a page of the source just now
    fn log_last_polled(&mut self, name: &str, node: &str) -> StorageResult<()>;

    // ===== Games =====

    /// Inserts a game or replaces the link and source of an existing one
    fn upsert_game(&mut self, name: &str, source_name: &str, link: &str) -> StorageResult<()>;

    /// Gets a game by name
    fn find_game(&self, name: &str) -> StorageResult<Option<Game>>;

    // ===== Statistics =====

    /// Counts all stored games
    fn count_games(&self) -> StorageResult<u64>;

    /// Counts games per source name, largest first
    fn count_games_by_source(&self) -> StorageResult<Vec<(String, u64)>>;

    /// Verifies the backend is reachable
    fn ping(&self) -> StorageResult<()>;
}
