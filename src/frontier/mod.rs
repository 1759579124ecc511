//! Crawl frontier: the queue of discovered-but-not-yet-fetched URLs plus
//! the visited-URL record
//!
//! The frontier keys exclusively on canonical URL strings. A URL is
//! enqueued at most once across the lifetime of a crawl; the visited map
//! and the queued set together enforce this.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};
use url::Url;

/// How a visited URL ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisitOutcome {
    /// Page was fetched and produced a page record
    Fetched,
    /// Page was skipped without fetching (robots, rejected content)
    Skipped,
    /// Fetching was abandoned after retries were exhausted
    Abandoned,
}

impl VisitOutcome {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::Skipped => "skipped",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "fetched" => Some(Self::Fetched),
            "skipped" => Some(Self::Skipped),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }
}

/// A URL waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierEntry {
    /// The canonical URL
    pub url: String,

    /// Link depth from the seed page
    pub depth: u32,

    /// Position in the global discovery sequence
    pub discovery_order: u64,
}

/// FIFO frontier of pending URLs plus the visited record
///
/// FIFO by discovery order gives breadth-first processing: shallow pages
/// are fetched before deep ones.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    queued: HashSet<String>,
    visited: BTreeMap<String, VisitOutcome>,
    next_order: u64,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a frontier from a checkpoint snapshot
    pub fn from_snapshot(
        queue: Vec<FrontierEntry>,
        visited: BTreeMap<String, VisitOutcome>,
        next_order: u64,
    ) -> Self {
        let queued = queue.iter().map(|e| e.url.clone()).collect();
        Self {
            queue: queue.into(),
            queued,
            visited,
            next_order,
        }
    }

    /// Adds a URL to the frontier unless its canonical form was already
    /// seen (visited or queued)
    ///
    /// Returns true if the URL was enqueued.
    pub fn enqueue(&mut self, url: &Url, depth: u32) -> bool {
        let key = url.as_str().to_string();

        if self.visited.contains_key(&key) || self.queued.contains(&key) {
            return false;
        }

        let entry = FrontierEntry {
            url: key.clone(),
            depth,
            discovery_order: self.next_order,
        };
        self.next_order += 1;
        self.queued.insert(key);
        self.queue.push_back(entry);
        true
    }

    /// Removes and returns the oldest pending entry
    pub fn dequeue(&mut self) -> Option<FrontierEntry> {
        let entry = self.queue.pop_front()?;
        self.queued.remove(&entry.url);
        Some(entry)
    }

    /// Puts a dequeued-but-unfetched entry back at the head of the queue
    ///
    /// Used when a shutdown signal arrives during the politeness delay,
    /// so the entry is fetched first on resume instead of being lost.
    pub fn requeue_front(&mut self, entry: FrontierEntry) {
        self.queued.insert(entry.url.clone());
        self.queue.push_front(entry);
    }

    /// Records the outcome for a URL so it is never enqueued again
    pub fn mark_visited(&mut self, url: &str, outcome: VisitOutcome) {
        self.visited.insert(url.to_string(), outcome);
    }

    /// Returns true if the URL has been visited or is waiting in the queue
    pub fn is_seen(&self, url: &str) -> bool {
        self.visited.contains_key(url) || self.queued.contains(url)
    }

    /// Number of pending entries
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if no entries are pending
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The visited map (url -> outcome)
    pub fn visited(&self) -> &BTreeMap<String, VisitOutcome> {
        &self.visited
    }

    /// Number of URLs visited with the given outcome
    pub fn count_visited(&self, outcome: VisitOutcome) -> u64 {
        self.visited.values().filter(|o| **o == outcome).count() as u64
    }

    /// Snapshot of the pending queue in order, for checkpointing
    pub fn queue_snapshot(&self) -> Vec<FrontierEntry> {
        self.queue.iter().cloned().collect()
    }

    /// The next discovery order that will be assigned
    pub fn next_order(&self) -> u64 {
        self.next_order
    }
}
