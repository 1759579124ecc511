//! Batch pipeline: groups fetched pages and fans them out to the
//! analysis service
//!
//! Analysis calls within one batch run concurrently up to a configured
//! limit; they are independent of crawl ordering and of each other. A
//! per-page failure never fails the batch: transient errors are retried
//! with backoff, and a page that still fails is returned with the
//! unanalyzed sentinel rather than dropped, so every fetched page
//! produces exactly one record.

use crate::analysis::{AnalysisResult, AnalyzedPage, Analyzer};
use crate::config::AnalysisConfig;
use crate::crawler::PageRecord;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;

pub struct BatchPipeline {
    analyzer: Arc<dyn Analyzer>,
    concurrency: usize,
    max_retries: u32,
    retry_delay: Duration,
}

impl BatchPipeline {
    pub fn new(analyzer: Arc<dyn Analyzer>, config: &AnalysisConfig) -> Self {
        Self {
            analyzer,
            concurrency: config.concurrency,
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Analyzes one batch of fetched pages
    ///
    /// Returns one AnalyzedPage per input PageRecord, in discovery order
    /// regardless of the order analysis calls complete in.
    pub async fn process(&self, batch: Vec<PageRecord>) -> Vec<AnalyzedPage> {
        let mut results: Vec<AnalyzedPage> = stream::iter(batch)
            .map(|page| {
                let analyzer = Arc::clone(&self.analyzer);
                let max_retries = self.max_retries;
                let retry_delay = self.retry_delay;
                async move {
                    let analysis =
                        analyze_with_retry(analyzer.as_ref(), &page, max_retries, retry_delay)
                            .await;
                    AnalyzedPage { page, analysis }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        results.sort_by_key(|p| p.page.discovery_order);
        results
    }
}

/// Analyzes one page, retrying transient failures
///
/// Falls back to the unanalyzed sentinel when retries are exhausted or
/// the failure is permanent.
async fn analyze_with_retry(
    analyzer: &dyn Analyzer,
    page: &PageRecord,
    max_retries: u32,
    retry_delay: Duration,
) -> AnalysisResult {
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = retry_delay * 2u32.saturating_pow(attempt - 1);
            tokio::time::sleep(delay).await;
        }

        match analyzer
            .analyze(&page.text, &page.url, page.title.as_deref())
            .await
        {
            Ok(result) => {
                if attempt > 0 {
                    tracing::debug!("Analysis of {} succeeded after retry", page.url);
                }
                return result;
            }
            Err(e) if e.is_transient() && attempt < max_retries => {
                tracing::debug!("Transient analysis failure for {}: {}", page.url, e);
                attempt += 1;
            }
            Err(e) => {
                tracing::warn!(
                    "Analysis failed for {}, recording as unanalyzed: {}",
                    page.url,
                    e
                );
                return AnalysisResult::unanalyzed();
            }
        }
    }
}
