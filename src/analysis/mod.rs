//! Content-analysis service interface
//!
//! The crawl core consumes the analysis service through the [`Analyzer`]
//! trait: one call per page for analysis, one per page-language pair for
//! translation. The HTTP implementation lives in [`client`]; batching and
//! per-page retry policy live in [`pipeline`].

mod client;
mod pipeline;

pub use client::AnalysisClient;
pub use pipeline::BatchPipeline;

use crate::crawler::PageRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Language tag for pages the service could not attribute to one language
pub const MIXED_LANGUAGE: &str = "mixed";

/// Language tag for pages whose analysis failed on every retry
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Errors from the analysis service
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Worth retrying: timeout, 429, 5xx
    #[error("transient analysis failure: {0}")]
    Transient(String),

    /// Retrying cannot fix this: bad request, unparseable response
    #[error("permanent analysis failure: {0}")]
    Permanent(String),
}

impl AnalysisError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// What the analysis service reports about one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Primary detected language (lowercase tag, e.g. "english")
    pub language: String,

    /// Explicit multi-language list; empty unless the service names
    /// more than one language for the page
    #[serde(default)]
    pub languages: Vec<String>,

    /// Content category tag
    pub category: String,

    /// Brief summary of the page
    pub summary: String,

    /// Key topics, at most a handful
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Importance score, 1-10 (0 marks the unanalyzed sentinel)
    pub importance: u8,
}

impl AnalysisResult {
    /// The sentinel attached to pages whose analysis failed on all
    /// retries; such pages are kept, never dropped
    pub fn unanalyzed() -> Self {
        Self {
            language: UNKNOWN_LANGUAGE.to_string(),
            languages: Vec::new(),
            category: "general".to_string(),
            summary: String::new(),
            keywords: Vec::new(),
            importance: 0,
        }
    }

    /// True for the sentinel produced by [`AnalysisResult::unanalyzed`]
    pub fn is_unanalyzed(&self) -> bool {
        self.language == UNKNOWN_LANGUAGE && self.importance == 0
    }
}

/// A fetched page together with its analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedPage {
    pub page: PageRecord,
    pub analysis: AnalysisResult,
}

/// The external analysis/translation capability
///
/// Implementations may fail transiently or permanently; retry policy is
/// the batch pipeline's concern, not the implementation's.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyzes one page's text
    async fn analyze(
        &self,
        text: &str,
        url: &str,
        title: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError>;

    /// Translates text into the target language
    async fn translate(
        &self,
        text: &str,
        target_language: &str,
    ) -> Result<String, AnalysisError>;
}
