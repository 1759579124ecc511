//! Linguamap main entry point
//!
//! Command-line interface for the AI-assisted multilingual site
//! consolidator.

use anyhow::Context;
use clap::Parser;
use linguamap::analysis::AnalysisClient;
use linguamap::config::load_config_with_hash;
use linguamap::crawler::crawl;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Linguamap: an AI-assisted multilingual site consolidator
///
/// Linguamap crawls a single site within a page budget, analyzes every
/// page through an external content-analysis service, and assembles the
/// results into per-language consolidated documents.
#[derive(Parser, Debug)]
#[command(name = "linguamap")]
#[command(version = "1.0.0")]
#[command(about = "An AI-assisted multilingual site consolidator", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resume an interrupted crawl (default behavior)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start a fresh crawl, ignoring previous state
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "export_outputs"])]
    dry_run: bool,

    /// Show statistics from the checkpoint database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_outputs"])]
    stats: bool,

    /// Regenerate output documents from existing checkpoint data and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_outputs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_outputs {
        handle_export_outputs(&config)?;
    } else {
        handle_crawl(config, config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("linguamap=info,warn"),
            1 => EnvFilter::new("linguamap=debug,info"),
            2 => EnvFilter::new("linguamap=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows the plan
fn handle_dry_run(config: &linguamap::config::Config) {
    println!("=== Linguamap Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  Max page size: {} bytes", config.site.max_page_bytes);

    println!("\nCrawler:");
    println!("  Page budget: {}", config.crawler.max_pages);
    println!("  Batch size: {}", config.crawler.batch_size);
    println!("  Max retries: {}", config.crawler.max_retries);
    println!(
        "  Delay: {}ms base, clamped to [{}ms, {}ms]",
        config.crawler.base_delay_ms, config.crawler.min_delay_ms, config.crawler.max_delay_ms
    );

    println!("\nAnalysis:");
    println!("  Endpoint: {}", config.analysis.endpoint);
    println!("  Model: {}", config.analysis.model);
    println!("  Concurrency: {}", config.analysis.concurrency);
    println!("  Translate outputs: {}", config.analysis.translate);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Documents: {}", config.output.output_dir);
    println!("  Summary: {}", config.output.summary_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the checkpoint
fn handle_stats(config: &linguamap::config::Config) -> anyhow::Result<()> {
    use linguamap::frontier::VisitOutcome;
    use linguamap::storage::CheckpointStore;
    use std::path::Path;

    println!("Database: {}\n", config.output.database_path);

    let store = CheckpointStore::open(Path::new(&config.output.database_path))?;

    match store.load()? {
        Some((state, pages)) => {
            let count = |outcome: VisitOutcome| {
                state.visited.values().filter(|o| **o == outcome).count()
            };

            println!("Pages processed: {}", state.pages_processed);
            println!("Frontier pending: {}", state.frontier.len());
            println!("Visited: {} total", state.visited.len());
            println!("  fetched: {}", count(VisitOutcome::Fetched));
            println!("  skipped: {}", count(VisitOutcome::Skipped));
            println!("  abandoned: {}", count(VisitOutcome::Abandoned));

            let groups = linguamap::aggregate::aggregate(&pages);
            println!("\nAnalyzed pages by language:");
            for (language, group) in &groups {
                println!("  {}: {}", language, group.pages.len());
            }
        }
        None => println!("No checkpoint found"),
    }

    Ok(())
}

/// Handles the --export-outputs mode: regenerates documents from the
/// checkpoint without crawling (and without translation)
fn handle_export_outputs(config: &linguamap::config::Config) -> anyhow::Result<()> {
    use linguamap::output::{ConsolidatedTextWriter, OutputWriter, PaginatedDocumentWriter};
    use linguamap::storage::CheckpointStore;
    use std::path::Path;

    println!("=== Exporting Consolidated Documents ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}\n", config.output.output_dir);

    let store = CheckpointStore::open(Path::new(&config.output.database_path))?;
    let pages = store.load_analyzed_pages()?;

    if pages.is_empty() {
        println!("No analyzed pages in the checkpoint");
        return Ok(());
    }

    let groups = linguamap::aggregate::aggregate(&pages);
    let dir = Path::new(&config.output.output_dir);

    let mut written = ConsolidatedTextWriter::new(&config.site.base_url).write_groups(&groups, dir)?;
    written.extend(PaginatedDocumentWriter::new(&config.site.base_url).write_groups(&groups, dir)?);

    for path in &written {
        println!("✓ {}", path.display());
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: linguamap::config::Config,
    config_hash: String,
    fresh: bool,
) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
    } else {
        tracing::info!("Starting crawl (will resume if interrupted run exists)");
    }

    let analyzer = Arc::new(
        AnalysisClient::new(&config.analysis).context("analysis service unavailable")?,
    );

    // Ctrl-C flips the shutdown flag; the crawl finishes the in-flight
    // fetch, flushes the current batch, and checkpoints before exiting.
    // The task holds the sender for the life of the process.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested, finishing current batch");
            let _ = shutdown_tx.send(true);
        }
        std::future::pending::<()>().await;
    });

    let report = crawl(config, config_hash, analyzer, fresh, shutdown_rx).await?;

    println!(
        "\nCrawl {}: {} succeeded, {} abandoned, {} skipped",
        if report.completed { "completed" } else { "interrupted" },
        report.pages_succeeded,
        report.pages_abandoned,
        report.pages_skipped
    );
    for (language, count) in &report.language_counts {
        println!("  {}: {} pages", language, count);
    }

    Ok(())
}
