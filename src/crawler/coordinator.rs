//! Crawl coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects
//! of the crawling process:
//! - Resuming from or seeding the checkpoint store
//! - Draining the frontier with adaptive politeness delays
//! - Fetching, text extraction, and link discovery
//! - Batching pages through the analysis pipeline
//! - Checkpointing after every completed batch
//! - Aggregation and final output generation

use crate::aggregate::{aggregate, LanguageGroup};
use crate::analysis::{AnalyzedPage, Analyzer, BatchPipeline, MIXED_LANGUAGE, UNKNOWN_LANGUAGE};
use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, FetchExecutor, FetchOutcome, PermanentReason};
use crate::crawler::parser::parse_page;
use crate::crawler::PageRecord;
use crate::frontier::{Frontier, FrontierEntry, VisitOutcome};
use crate::output::{
    write_summary, ConsolidatedTextWriter, OutputWriter, PaginatedDocumentWriter, RunReport,
    UrlFailure,
};
use crate::robots::RobotsGate;
use crate::state::{CrawlState, RateController};
use crate::storage::CheckpointStore;
use crate::url::{normalize_in_scope, normalize_url};
use crate::{LinguaError, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use url::Url;

/// Main crawl coordinator
///
/// Owns all shared mutable state of a run: the frontier, the rate
/// controller statistics, the current batch, and the checkpoint store.
/// No other component mutates them.
pub struct Coordinator {
    config: Config,
    config_hash: String,
    frontier: Frontier,
    rate: RateController,
    executor: FetchExecutor,
    pipeline: BatchPipeline,
    analyzer: Arc<dyn Analyzer>,
    store: CheckpointStore,
    robots: RobotsGate,
    shutdown: watch::Receiver<bool>,
    host: String,
    base_url: Url,
    batch: Vec<PageRecord>,
    analyzed: Vec<AnalyzedPage>,
    pages_processed: u64,
    failures: Vec<UrlFailure>,
}

impl Coordinator {
    /// Creates a coordinator, resuming from a checkpoint when one exists
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `config_hash` - Hash of the loaded config file
    /// * `analyzer` - The content-analysis service implementation
    /// * `fresh` - Whether to discard any existing checkpoint
    /// * `shutdown` - Watch channel flipped to true on shutdown request
    pub async fn new(
        config: Config,
        config_hash: String,
        analyzer: Arc<dyn Analyzer>,
        fresh: bool,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let base_url = normalize_url(&config.site.base_url)?;
        let host = base_url
            .host_str()
            .ok_or(crate::UrlError::MissingHost)?
            .to_string();

        let mut store = CheckpointStore::open(Path::new(&config.output.database_path))?;
        if fresh {
            tracing::info!("Starting fresh crawl, clearing previous checkpoint");
            store.clear()?;
        }

        let checkpoint = store.load()?;
        let (frontier, rate, analyzed, pages_processed) = match checkpoint {
            Some((state, analyzed)) => {
                tracing::info!(
                    "Resuming from checkpoint: {} pages processed, {} pending",
                    state.pages_processed,
                    state.frontier.len()
                );

                if let Some(previous_hash) = store.config_hash()? {
                    if previous_hash != config_hash {
                        tracing::warn!(
                            "Configuration changed since the checkpoint was written \
                             (was {}, now {})",
                            previous_hash,
                            config_hash
                        );
                    }
                }

                let frontier = state.restore_frontier();
                let rate = RateController::from_stats(&config.crawler, state.host_stats.clone());
                (frontier, rate, analyzed, state.pages_processed)
            }
            None => {
                tracing::info!("No checkpoint found, starting from {}", base_url);
                (
                    Frontier::new(),
                    RateController::new(&config.crawler),
                    Vec::new(),
                    0,
                )
            }
        };

        let client = build_http_client(&config.user_agent)?;
        let executor = FetchExecutor::new(client.clone(), &config.crawler, &config.site);

        let user_agent = format!(
            "{}/{}",
            config.user_agent.crawler_name, config.user_agent.crawler_version
        );
        let robots = RobotsGate::fetch(&client, &base_url, &user_agent).await;

        let pipeline = BatchPipeline::new(Arc::clone(&analyzer), &config.analysis);

        let mut coordinator = Self {
            config,
            config_hash,
            frontier,
            rate,
            executor,
            pipeline,
            analyzer,
            store,
            robots,
            shutdown,
            host,
            base_url: base_url.clone(),
            batch: Vec::new(),
            analyzed,
            pages_processed,
            failures: Vec::new(),
        };

        // Seed the frontier on the first run
        if coordinator.frontier.is_empty() && coordinator.frontier.visited().is_empty() {
            coordinator.seed(&base_url);
        }

        Ok(coordinator)
    }

    /// Seeds the frontier with the base URL, subject to the robots gate
    fn seed(&mut self, base_url: &Url) {
        if self.robots.is_allowed(base_url) {
            self.frontier.enqueue(base_url, 0);
        } else {
            tracing::warn!("Seed URL {} disallowed by robots.txt", base_url);
            self.frontier
                .mark_visited(base_url.as_str(), VisitOutcome::Skipped);
            self.failures.push(UrlFailure {
                url: base_url.as_str().to_string(),
                reason: "disallowed by robots.txt".to_string(),
            });
        }
    }

    /// Runs the crawl to completion (or interruption)
    ///
    /// Per URL: dequeue, await the politeness delay (the only suspension
    /// point, cancellable by shutdown), fetch, extract text and links,
    /// enqueue fresh links, append to the current batch. The batch is
    /// flushed through the analysis pipeline at `batch-size` pages or
    /// frontier exhaustion, and a checkpoint is committed only after the
    /// batch's analyzed pages are durably collected.
    pub async fn run(mut self) -> Result<RunReport> {
        tracing::info!(
            "Starting crawl of {} (budget {} pages, batch size {})",
            self.base_url,
            self.config.crawler.max_pages,
            self.config.crawler.batch_size
        );

        let start_time = std::time::Instant::now();
        let mut interrupted = false;

        loop {
            if *self.shutdown.borrow() {
                interrupted = true;
                break;
            }

            if self.fetched_total() >= self.config.crawler.max_pages {
                tracing::info!("Page budget reached");
                break;
            }

            let entry = match self.frontier.dequeue() {
                Some(e) => e,
                None => {
                    tracing::info!("Frontier is empty, crawl complete");
                    break;
                }
            };

            // Politeness delay before the fetch; a shutdown request
            // cancels the wait, not the crawl state
            let delay = self.rate.next_delay(&self.host);
            let cancelled = tokio::select! {
                _ = tokio::time::sleep(delay) => false,
                _ = wait_for_shutdown(&mut self.shutdown) => true,
            };
            if cancelled {
                self.frontier.requeue_front(entry);
                interrupted = true;
                break;
            }

            self.process_entry(&entry).await;

            if self.batch.len() >= self.config.crawler.batch_size {
                self.flush_batch().await?;
            }
        }

        // Flush the partial batch and checkpoint before exiting; this
        // also covers the clean-shutdown path
        self.flush_batch().await?;

        let elapsed = start_time.elapsed();
        tracing::info!(
            "Crawl {}: {} pages processed in {:?}",
            if interrupted { "interrupted" } else { "finished" },
            self.pages_processed,
            elapsed
        );

        let groups = aggregate(&self.analyzed);

        if !interrupted {
            let groups = self.localize(groups.clone()).await;
            self.write_outputs(&groups)?;
        }

        let report = self.build_report(&groups, !interrupted);
        write_summary(&report, Path::new(&self.config.output.summary_path))?;

        tracing::info!(
            "Run summary: {} succeeded, {} abandoned, {} skipped ({} languages)",
            report.pages_succeeded,
            report.pages_abandoned,
            report.pages_skipped,
            report.language_counts.len()
        );

        Ok(report)
    }

    /// Pages fetched so far, committed or waiting in the current batch
    fn fetched_total(&self) -> u64 {
        self.pages_processed + self.batch.len() as u64
    }

    /// Processes a single frontier entry through the per-URL state
    /// machine: fetch, extract, enqueue links, append to batch
    async fn process_entry(&mut self, entry: &FrontierEntry) {
        let url = match Url::parse(&entry.url) {
            Ok(u) => u,
            Err(e) => {
                // Canonical URLs always parse; a failure here means the
                // checkpoint was edited by hand
                tracing::error!("Frontier entry '{}' is not a URL: {}", entry.url, e);
                self.record_failure(&entry.url, VisitOutcome::Abandoned, &e.to_string());
                return;
            }
        };

        tracing::debug!(
            "Fetching ({}/{}) {}",
            self.fetched_total() + 1,
            self.config.crawler.max_pages,
            url
        );

        let report = self.executor.fetch(&url).await;

        let is_error = report.rate_limited
            || matches!(
                report.outcome,
                FetchOutcome::Permanent {
                    reason: PermanentReason::RetriesExhausted(_)
                }
            );
        self.rate.record(&self.host, report.elapsed, is_error);
        if report.rate_limited {
            self.rate.penalize(&self.host);
        }

        match report.outcome {
            FetchOutcome::Success { status, body, .. } => {
                let parsed = parse_page(&body, &url);
                self.enqueue_links(&parsed.links, &url, entry.depth);

                self.batch.push(PageRecord {
                    url: entry.url.clone(),
                    title: parsed.title,
                    text: parsed.text,
                    status,
                    fetched_at: chrono::Utc::now().to_rfc3339(),
                    depth: entry.depth,
                    discovery_order: entry.discovery_order,
                });
                self.frontier
                    .mark_visited(&entry.url, VisitOutcome::Fetched);
            }

            FetchOutcome::Permanent { reason } if reason.is_rejection() => {
                tracing::info!("Skipping {}: {}", url, reason);
                self.record_failure(&entry.url, VisitOutcome::Skipped, &reason.to_string());
            }

            FetchOutcome::Permanent { reason } => {
                tracing::warn!("Abandoning {}: {}", url, reason);
                self.record_failure(&entry.url, VisitOutcome::Abandoned, &reason.to_string());
            }

            FetchOutcome::Retryable { reason } => {
                // The executor escalates retryable outcomes internally
                tracing::warn!("Abandoning {}: {}", url, reason);
                self.record_failure(&entry.url, VisitOutcome::Abandoned, &reason);
            }
        }
    }

    /// Normalizes discovered links and enqueues the fresh in-scope ones
    fn enqueue_links(&mut self, links: &[String], page_url: &Url, page_depth: u32) {
        for link in links {
            let canonical = match normalize_in_scope(link, page_url, &self.config.site) {
                Ok(url) => url,
                Err(rejection) => {
                    tracing::trace!("Dropping link {}: {}", link, rejection);
                    continue;
                }
            };

            if self.frontier.is_seen(canonical.as_str()) {
                continue;
            }

            if !self.robots.is_allowed(&canonical) {
                tracing::debug!("Not enqueueing {}: disallowed by robots.txt", canonical);
                continue;
            }

            self.frontier.enqueue(&canonical, page_depth + 1);
        }
    }

    /// Records a non-fatal per-URL failure
    fn record_failure(&mut self, url: &str, outcome: VisitOutcome, reason: &str) {
        self.frontier.mark_visited(url, outcome);
        self.failures.push(UrlFailure {
            url: url.to_string(),
            reason: reason.to_string(),
        });
    }

    /// Runs the current batch through the analysis pipeline and commits
    /// a checkpoint
    ///
    /// The checkpoint covers the batch's analyzed pages and the full
    /// crawl state in one transaction; a checkpoint write failure is
    /// fatal, since continuing past a lost checkpoint risks silent
    /// duplicate or missing work on resume.
    async fn flush_batch(&mut self) -> Result<()> {
        let batch = std::mem::take(&mut self.batch);

        if batch.is_empty() {
            let state = CrawlState::capture(&self.frontier, &self.rate, self.pages_processed);
            self.store
                .commit(&state, &[], &self.config_hash)
                .map_err(LinguaError::Checkpoint)?;
            return Ok(());
        }

        tracing::info!("Analyzing batch of {} pages", batch.len());
        let analyzed = self.pipeline.process(batch).await;

        self.pages_processed += analyzed.len() as u64;
        let state = CrawlState::capture(&self.frontier, &self.rate, self.pages_processed);
        self.store
            .commit(&state, &analyzed, &self.config_hash)
            .map_err(LinguaError::Checkpoint)?;

        self.analyzed.extend(analyzed);
        tracing::info!(
            "Checkpoint written: {} pages processed, {} pending",
            self.pages_processed,
            self.frontier.pending()
        );

        Ok(())
    }

    /// Translates group members into their group's language when enabled
    ///
    /// Only the rendered copies are rewritten; the stored records keep
    /// their original text. The "mixed" and "unknown" groups are left
    /// untranslated, as are pages whose analysis failed.
    async fn localize(
        &self,
        mut groups: BTreeMap<String, LanguageGroup>,
    ) -> BTreeMap<String, LanguageGroup> {
        if !self.config.analysis.translate {
            return groups;
        }

        for (language, group) in groups.iter_mut() {
            if language == MIXED_LANGUAGE || language == UNKNOWN_LANGUAGE {
                continue;
            }

            for page in &mut group.pages {
                if page.analysis.language == *language || page.analysis.is_unanalyzed() {
                    continue;
                }

                match self.analyzer.translate(&page.page.text, language).await {
                    Ok(translated) => {
                        tracing::debug!("Translated {} into {}", page.page.url, language);
                        page.page.text = translated;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Translation of {} into {} failed, keeping original: {}",
                            page.page.url,
                            language,
                            e
                        );
                    }
                }
            }
        }

        groups
    }

    /// Writes the per-language consolidated documents
    fn write_outputs(&self, groups: &BTreeMap<String, LanguageGroup>) -> Result<()> {
        let dir = Path::new(&self.config.output.output_dir);
        let base = self.base_url.as_str();

        let text_files = ConsolidatedTextWriter::new(base).write_groups(groups, dir)?;
        let document_files = PaginatedDocumentWriter::new(base).write_groups(groups, dir)?;

        tracing::info!(
            "Wrote {} text and {} paginated documents to {}",
            text_files.len(),
            document_files.len(),
            dir.display()
        );

        Ok(())
    }

    /// Builds the final run accounting
    fn build_report(
        &self,
        groups: &BTreeMap<String, LanguageGroup>,
        completed: bool,
    ) -> RunReport {
        let language_counts = groups
            .iter()
            .map(|(language, group)| (language.clone(), group.pages.len() as u64))
            .collect();

        RunReport {
            base_url: self.base_url.as_str().to_string(),
            completed,
            pages_succeeded: self.frontier.count_visited(VisitOutcome::Fetched),
            pages_abandoned: self.frontier.count_visited(VisitOutcome::Abandoned),
            pages_skipped: self.frontier.count_visited(VisitOutcome::Skipped),
            pages_unanalyzed: self
                .analyzed
                .iter()
                .filter(|p| p.analysis.is_unanalyzed())
                .count() as u64,
            frontier_remaining: self.frontier.pending() as u64,
            language_counts,
            failures: self.failures.clone(),
            finished_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Resolves once a shutdown has been requested
///
/// A dropped sender means shutdown can no longer be requested, so the
/// future never resolves in that case.
async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
