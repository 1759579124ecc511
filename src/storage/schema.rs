//! Database schema definitions
//!
//! This module contains the SQL schema for the checkpoint database.

/// SQL schema for the checkpoint database
pub const SCHEMA_SQL: &str = r#"
-- Scalar checkpoint metadata (pages processed, config hash, timestamps)
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Every URL ever dequeued or skipped, with its outcome
CREATE TABLE IF NOT EXISTS visited (
    url TEXT PRIMARY KEY,
    outcome TEXT NOT NULL
);

-- Pending frontier queue snapshot, in order
CREATE TABLE IF NOT EXISTS frontier (
    position INTEGER PRIMARY KEY,
    url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    discovery_order INTEGER NOT NULL
);

-- Per-host rate controller statistics (JSON)
CREATE TABLE IF NOT EXISTS host_stats (
    host TEXT PRIMARY KEY,
    stats TEXT NOT NULL
);

-- Fetched pages together with their analysis
CREATE TABLE IF NOT EXISTS analyzed_pages (
    discovery_order INTEGER PRIMARY KEY,
    url TEXT NOT NULL UNIQUE,
    title TEXT,
    text TEXT NOT NULL,
    status INTEGER NOT NULL,
    fetched_at TEXT NOT NULL,
    depth INTEGER NOT NULL,
    language TEXT NOT NULL,
    languages TEXT NOT NULL,
    category TEXT NOT NULL,
    summary TEXT NOT NULL,
    keywords TEXT NOT NULL,
    importance INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_analyzed_pages_language ON analyzed_pages(language);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
