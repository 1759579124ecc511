//! Checkpoint store backed by SQLite
//!
//! One checkpoint commit covers the full CrawlState snapshot plus the
//! batch of analyzed pages that completed it, all inside a single
//! transaction. A subsequent load therefore never observes a partially
//! written checkpoint: the previous one stays intact until the new one
//! commits.

use crate::analysis::{AnalysisResult, AnalyzedPage};
use crate::crawler::PageRecord;
use crate::frontier::{FrontierEntry, VisitOutcome};
use crate::state::{CrawlState, HostStats};
use crate::storage::schema::initialize_schema;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during checkpoint operations
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt checkpoint: {0}")]
    Corrupt(String),
}

/// Result type for checkpoint operations
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// SQLite-backed persistence for crawl resumption
pub struct CheckpointStore {
    conn: Connection,
}

impl CheckpointStore {
    /// Opens (creating if needed) a checkpoint database
    pub fn open(path: &Path) -> CheckpointResult<Self> {
        let conn = Connection::open(path)?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Opens an in-memory store, for tests
    pub fn open_in_memory() -> CheckpointResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Removes any existing checkpoint, for a fresh crawl
    pub fn clear(&mut self) -> CheckpointResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM meta", [])?;
        tx.execute("DELETE FROM visited", [])?;
        tx.execute("DELETE FROM frontier", [])?;
        tx.execute("DELETE FROM host_stats", [])?;
        tx.execute("DELETE FROM analyzed_pages", [])?;
        tx.commit()?;
        Ok(())
    }

    /// Commits one checkpoint: the state snapshot plus a completed batch
    ///
    /// Runs as a single transaction; on failure nothing is written and
    /// the previous checkpoint remains loadable.
    pub fn commit(
        &mut self,
        state: &CrawlState,
        batch: &[AnalyzedPage],
        config_hash: &str,
    ) -> CheckpointResult<()> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM frontier", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO frontier (position, url, depth, discovery_order)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (position, entry) in state.frontier.iter().enumerate() {
                insert.execute(params![
                    position as i64,
                    entry.url,
                    entry.depth,
                    entry.discovery_order as i64,
                ])?;
            }
        }

        tx.execute("DELETE FROM visited", [])?;
        {
            let mut insert =
                tx.prepare("INSERT INTO visited (url, outcome) VALUES (?1, ?2)")?;
            for (url, outcome) in &state.visited {
                insert.execute(params![url, outcome.to_db_string()])?;
            }
        }

        tx.execute("DELETE FROM host_stats", [])?;
        {
            let mut insert =
                tx.prepare("INSERT INTO host_stats (host, stats) VALUES (?1, ?2)")?;
            for (host, stats) in &state.host_stats {
                insert.execute(params![host, serde_json::to_string(stats)?])?;
            }
        }

        {
            let mut insert = tx.prepare(
                "INSERT OR REPLACE INTO analyzed_pages
                 (discovery_order, url, title, text, status, fetched_at, depth,
                  language, languages, category, summary, keywords, importance)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for page in batch {
                insert.execute(params![
                    page.page.discovery_order as i64,
                    page.page.url,
                    page.page.title,
                    page.page.text,
                    page.page.status,
                    page.page.fetched_at,
                    page.page.depth,
                    page.analysis.language,
                    serde_json::to_string(&page.analysis.languages)?,
                    page.analysis.category,
                    page.analysis.summary,
                    serde_json::to_string(&page.analysis.keywords)?,
                    page.analysis.importance,
                ])?;
            }
        }

        for (key, value) in [
            ("pages_processed", state.pages_processed.to_string()),
            (
                "next_discovery_order",
                state.next_discovery_order.to_string(),
            ),
            ("config_hash", config_hash.to_string()),
            ("checkpoint_at", chrono::Utc::now().to_rfc3339()),
        ] {
            tx.execute(
                "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Loads the last checkpoint, if one exists
    pub fn load(&self) -> CheckpointResult<Option<(CrawlState, Vec<AnalyzedPage>)>> {
        let pages_processed = match self.meta_value("pages_processed")? {
            Some(v) => v
                .parse::<u64>()
                .map_err(|_| CheckpointError::Corrupt("pages_processed not a number".into()))?,
            None => return Ok(None),
        };

        let next_discovery_order = self
            .meta_value("next_discovery_order")?
            .ok_or_else(|| CheckpointError::Corrupt("missing next_discovery_order".into()))?
            .parse::<u64>()
            .map_err(|_| CheckpointError::Corrupt("next_discovery_order not a number".into()))?;

        let mut visited = BTreeMap::new();
        {
            let mut stmt = self.conn.prepare("SELECT url, outcome FROM visited")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (url, outcome) = row?;
                let outcome = VisitOutcome::from_db_string(&outcome).ok_or_else(|| {
                    CheckpointError::Corrupt(format!("unknown visit outcome '{}'", outcome))
                })?;
                visited.insert(url, outcome);
            }
        }

        let mut frontier = Vec::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT url, depth, discovery_order FROM frontier ORDER BY position",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(FrontierEntry {
                    url: row.get(0)?,
                    depth: row.get(1)?,
                    discovery_order: row.get::<_, i64>(2)? as u64,
                })
            })?;
            for row in rows {
                frontier.push(row?);
            }
        }

        let mut host_stats = HashMap::new();
        {
            let mut stmt = self.conn.prepare("SELECT host, stats FROM host_stats")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (host, stats_json) = row?;
                let stats: HostStats = serde_json::from_str(&stats_json)?;
                host_stats.insert(host, stats);
            }
        }

        let state = CrawlState {
            visited,
            frontier,
            pages_processed,
            next_discovery_order,
            host_stats,
        };

        let pages = self.load_analyzed_pages()?;

        Ok(Some((state, pages)))
    }

    /// Loads all analyzed pages, in discovery order
    pub fn load_analyzed_pages(&self) -> CheckpointResult<Vec<AnalyzedPage>> {
        let mut stmt = self.conn.prepare(
            "SELECT discovery_order, url, title, text, status, fetched_at, depth,
                    language, languages, category, summary, keywords, importance
             FROM analyzed_pages ORDER BY discovery_order",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                PageRecord {
                    discovery_order: row.get::<_, i64>(0)? as u64,
                    url: row.get(1)?,
                    title: row.get(2)?,
                    text: row.get(3)?,
                    status: row.get(4)?,
                    fetched_at: row.get(5)?,
                    depth: row.get(6)?,
                },
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
                row.get::<_, String>(10)?,
                row.get::<_, String>(11)?,
                row.get::<_, u8>(12)?,
            ))
        })?;

        let mut pages = Vec::new();
        for row in rows {
            let (page, language, languages_json, category, summary, keywords_json, importance) =
                row?;
            pages.push(AnalyzedPage {
                page,
                analysis: AnalysisResult {
                    language,
                    languages: serde_json::from_str(&languages_json)?,
                    category,
                    summary,
                    keywords: serde_json::from_str(&keywords_json)?,
                    importance,
                },
            });
        }

        Ok(pages)
    }

    /// The config hash recorded with the last checkpoint
    pub fn config_hash(&self) -> CheckpointResult<Option<String>> {
        self.meta_value("config_hash")
    }

    fn meta_value(&self, key: &str) -> CheckpointResult<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?)
    }
}
