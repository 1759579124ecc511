//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry and backoff
//! - HTML text and link extraction
//! - The sequential crawl loop with adaptive politeness delays,
//!   batching, and checkpointing

mod coordinator;
mod fetcher;
mod parser;

pub use coordinator::Coordinator;
pub use fetcher::{
    build_http_client, FetchExecutor, FetchOutcome, FetchReport, PermanentReason,
};
pub use parser::{extract_links, extract_text, parse_page, ParsedPage};

use crate::analysis::Analyzer;
use crate::config::Config;
use crate::output::RunReport;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// A successfully fetched and extracted page
///
/// Immutable once built; owned by the crawl loop until handed to the
/// batch pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Canonical URL of the page
    pub url: String,

    /// Page title, if any
    pub title: Option<String>,

    /// Extracted readable text
    pub text: String,

    /// HTTP status of the successful fetch
    pub status: u16,

    /// Fetch timestamp (RFC 3339)
    pub fetched_at: String,

    /// Link depth from the seed page
    pub depth: u32,

    /// Position in the global discovery sequence
    pub discovery_order: u64,
}

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the checkpoint store and resume or seed the frontier
/// 2. Build the HTTP client and fetch robots.txt
/// 3. Drain the frontier sequentially with adaptive politeness delays
/// 4. Batch fetched pages through the analysis pipeline
/// 5. Checkpoint after every completed batch
/// 6. Aggregate, write per-language outputs, and report
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the loaded config file
/// * `analyzer` - The content-analysis service implementation
/// * `fresh` - Whether to discard any existing checkpoint
/// * `shutdown` - Watch channel flipped to true on shutdown request
pub async fn crawl(
    config: Config,
    config_hash: String,
    analyzer: Arc<dyn Analyzer>,
    fresh: bool,
    shutdown: watch::Receiver<bool>,
) -> crate::Result<RunReport> {
    let coordinator = Coordinator::new(config, config_hash, analyzer, fresh, shutdown).await?;
    coordinator.run().await
}
