//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{Game, Source};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn source_exists(&self, name: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sources WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Loads poll timestamps, optionally restricted to one source
    fn load_polls(
        &self,
        source_name: Option<&str>,
    ) -> StorageResult<HashMap<String, HashMap<String, DateTime<Utc>>>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_name, node, polled_at FROM source_polls
             WHERE ?1 IS NULL OR source_name = ?1",
        )?;

        let rows = stmt.query_map(params![source_name], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut polls: HashMap<String, HashMap<String, DateTime<Utc>>> = HashMap::new();
        for row in rows {
            let (source, node, polled_at) = row?;
            match parse_timestamp(&polled_at) {
                Some(at) => {
                    polls.entry(source).or_default().insert(node, at);
                }
                None => {
                    tracing::warn!(
                        "Ignoring unreadable poll timestamp '{}' for source {} (node {})",
                        polled_at,
                        source,
                        node
                    );
                }
            }
        }

        Ok(polls)
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<Source> {
    Ok(Source {
        name: row.get(0)?,
        url: row.get(1)?,
        link_selector: row.get(2)?,
        next_page_selector: row.get(3)?,
        current_page: row.get(4)?,
        last_polled: HashMap::new(),
    })
}

impl Storage for SqliteStorage {
    // ===== Source Registry =====

    fn get_all_sources(&self) -> StorageResult<Vec<Source>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, url, link_selector, next_page_selector, current_page
             FROM sources ORDER BY name",
        )?;

        let mut sources = stmt
            .query_map([], source_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut polls = self.load_polls(None)?;
        for source in &mut sources {
            if let Some(last_polled) = polls.remove(&source.name) {
                source.last_polled = last_polled;
            }
        }

        Ok(sources)
    }

    fn find_source(&self, name: &str) -> StorageResult<Option<Source>> {
        let source = self
            .conn
            .query_row(
                "SELECT name, url, link_selector, next_page_selector, current_page
                 FROM sources WHERE name = ?1",
                params![name],
                source_from_row,
            )
            .optional()?;

        match source {
            Some(mut source) => {
                if let Some(last_polled) = self.load_polls(Some(name))?.remove(name) {
                    source.last_polled = last_polled;
                }
                Ok(Some(source))
            }
            None => Ok(None),
        }
    }

    fn insert_source(&mut self, source: &Source) -> StorageResult<()> {
        if self.source_exists(&source.name)? {
            return Err(StorageError::ConstraintViolation(format!(
                "source '{}' already exists",
                source.name
            )));
        }

        self.conn.execute(
            "INSERT INTO sources (name, url, link_selector, next_page_selector, current_page, created_at)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
            params![
                source.name,
                source.url,
                source.link_selector,
                source.next_page_selector,
                now_timestamp()
            ],
        )?;
        Ok(())
    }

    fn update_source(&mut self, source: &Source) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE sources SET url = ?1, link_selector = ?2, next_page_selector = ?3
             WHERE name = ?4",
            params![
                source.url,
                source.link_selector,
                source.next_page_selector,
                source.name
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::SourceNotFound(source.name.clone()));
        }
        Ok(())
    }

    fn delete_source(&mut self, name: &str) -> StorageResult<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM sources WHERE name = ?1", params![name])?;
        Ok(deleted > 0)
    }

    fn update_page(&mut self, name: &str, page: Option<&str>) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE sources SET current_page = ?1 WHERE name = ?2",
            params![page, name],
        )?;

        if updated == 0 {
            return Err(StorageError::SourceNotFound(name.to_string()));
        }
        Ok(())
    }

    fn log_last_polled(&mut self, name: &str, node: &str) -> StorageResult<()> {
        if !self.source_exists(name)? {
            return Err(StorageError::SourceNotFound(name.to_string()));
        }

        self.conn.execute(
            "INSERT INTO source_polls (source_name, node, polled_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(source_name, node) DO UPDATE SET polled_at = excluded.polled_at",
            params![name, node, now_timestamp()],
        )?;
        Ok(())
    }

    // ===== Games =====

    fn upsert_game(&mut self, name: &str, source_name: &str, link: &str) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO games (name, link, source_name, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO UPDATE SET
                link = excluded.link,
                source_name = excluded.source_name,
                updated_at = excluded.updated_at",
            params![name, link, source_name, now_timestamp()],
        )?;
        Ok(())
    }

    fn find_game(&self, name: &str) -> StorageResult<Option<Game>> {
        let row = self
            .conn
            .query_row(
                "SELECT name, link, source_name, updated_at FROM games WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((name, link, source_name, updated_at)) => {
                let updated_at = parse_timestamp(&updated_at).ok_or_else(|| {
                    StorageError::Serialization(format!(
                        "Invalid updated_at '{}' for game {}",
                        updated_at, name
                    ))
                })?;
                Ok(Some(Game {
                    name,
                    link,
                    source_name,
                    updated_at,
                }))
            }
            None => Ok(None),
        }
    }

    // ===== Statistics =====

    fn count_games(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_games_by_source(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_name, COUNT(*) as count FROM games
             GROUP BY source_name ORDER BY count DESC, source_name",
        )?;

        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    fn ping(&self) -> StorageResult<()> {
        self.conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}
