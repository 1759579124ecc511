//! Output handler types
//!
//! This module defines the writer trait for per-language documents and
//! the run report emitted at the end of a crawl.

use crate::aggregate::LanguageGroup;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// One non-fatal failure recorded during the run
#[derive(Debug, Clone, Serialize)]
pub struct UrlFailure {
    /// The URL that failed
    pub url: String,

    /// Why it failed
    pub reason: String,
}

/// Final accounting for a crawl run
///
/// Success is reported as counts, never a single pass/fail boolean.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// The site that was crawled
    pub base_url: String,

    /// False when the run was interrupted by a shutdown signal
    pub completed: bool,

    /// Pages fetched and handed to the analysis pipeline
    pub pages_succeeded: u64,

    /// Pages abandoned after fetch retries were exhausted
    pub pages_abandoned: u64,

    /// Pages skipped without fetching (robots, rejected content)
    pub pages_skipped: u64,

    /// Fetched pages whose analysis failed on every retry
    pub pages_unanalyzed: u64,

    /// URLs still pending when the run ended
    pub frontier_remaining: u64,

    /// Analyzed page count per language group
    pub language_counts: BTreeMap<String, u64>,

    /// Non-fatal failures keyed by URL
    pub failures: Vec<UrlFailure>,

    /// When the run finished (RFC 3339)
    pub finished_at: String,
}

/// Trait for per-language document writers
///
/// Writers consume the language -> group mapping and emit files; the
/// crawl core has no knowledge of their format.
pub trait OutputWriter {
    /// Writes one document per language group into the directory
    ///
    /// Returns the paths written.
    fn write_groups(
        &self,
        groups: &BTreeMap<String, LanguageGroup>,
        dir: &Path,
    ) -> OutputResult<Vec<PathBuf>>;
}

/// Writes the JSON run summary
pub fn write_summary(report: &RunReport, path: &Path) -> OutputResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}
