use crate::frontier::{Frontier, FrontierEntry, VisitOutcome};
use crate::state::rate::{HostStats, RateController};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Persisted crawl progress
///
/// A CrawlState on disk always reflects a consistent checkpoint: it is
/// written only after a batch fully completes (fetch + analysis), never
/// mid-batch. Reading it back rebuilds the exact pending queue, visited
/// set, and per-host rate statistics of the last checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlState {
    /// Every URL ever dequeued or skipped, with its outcome
    pub visited: BTreeMap<String, VisitOutcome>,

    /// Snapshot of the pending frontier queue, in order
    pub frontier: Vec<FrontierEntry>,

    /// Pages successfully processed so far (counted against the budget)
    pub pages_processed: u64,

    /// Next discovery order to assign
    pub next_discovery_order: u64,

    /// Per-host rate controller statistics
    pub host_stats: HashMap<String, HostStats>,
}

impl CrawlState {
    /// Captures the current progress of a running crawl
    pub fn capture(frontier: &Frontier, rate: &RateController, pages_processed: u64) -> Self {
        Self {
            visited: frontier.visited().clone(),
            frontier: frontier.queue_snapshot(),
            pages_processed,
            next_discovery_order: frontier.next_order(),
            host_stats: rate.stats().clone(),
        }
    }

    /// Rebuilds the in-memory frontier from this checkpoint
    pub fn restore_frontier(&self) -> Frontier {
        Frontier::from_snapshot(
            self.frontier.clone(),
            self.visited.clone(),
            self.next_discovery_order,
        )
    }
}
