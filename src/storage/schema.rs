//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the GameScout database.

use rusqlite::Connection;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Registered game sources and their resume cursor
CREATE TABLE IF NOT EXISTS sources (
    name TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    link_selector TEXT NOT NULL,
    next_page_selector TEXT NOT NULL,
    current_page TEXT,
    created_at TEXT NOT NULL
);

-- Last fetch time of each source, per crawling node
CREATE TABLE IF NOT EXISTS source_polls (
    source_name TEXT NOT NULL REFERENCES sources(name) ON DELETE CASCADE,
    node TEXT NOT NULL,
    polled_at TEXT NOT NULL,
    PRIMARY KEY (source_name, node)
);

-- Discovered games; source_name is a back-reference, not ownership
CREATE TABLE IF NOT EXISTS games (
    name TEXT PRIMARY KEY,
    link TEXT NOT NULL,
    source_name TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_games_source ON games(source_name);
"#;

/// Creates all tables and indexes if they do not exist yet
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
