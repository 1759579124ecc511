use crate::config::CrawlerConfig;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// One observed request outcome
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Sample {
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,

    /// Whether the request ended in an error (timeout, 5xx, 429)
    pub error: bool,
}

/// Rolling per-host statistics behind the adaptive delay
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostStats {
    /// Most recent request samples, oldest first
    pub samples: VecDeque<Sample>,

    /// Current politeness delay in milliseconds (0 = not yet initialized)
    pub current_delay_ms: u64,
}

/// Computes the politeness delay before each fetch from recent latency
/// and error history
///
/// The delay starts at the configured base, grows additively while the
/// windowed error rate exceeds the threshold, and decays back toward the
/// base when the window is error-free and latency is low. It is always
/// clamped to the configured [min, max] range. The controller never stops
/// the crawl; it only slows it down.
#[derive(Debug)]
pub struct RateController {
    base_ms: u64,
    min_ms: u64,
    max_ms: u64,
    window: usize,
    threshold: f64,
    hosts: HashMap<String, HostStats>,
}

impl RateController {
    /// Creates a controller with no history
    pub fn new(config: &CrawlerConfig) -> Self {
        Self::from_stats(config, HashMap::new())
    }

    /// Restores a controller from checkpointed per-host statistics
    pub fn from_stats(config: &CrawlerConfig, hosts: HashMap<String, HostStats>) -> Self {
        Self {
            base_ms: config.base_delay_ms,
            min_ms: config.min_delay_ms,
            max_ms: config.max_delay_ms,
            window: config.error_window,
            threshold: config.error_threshold,
            hosts,
        }
    }

    /// Delay to wait before the next fetch to this host
    pub fn next_delay(&self, host: &str) -> Duration {
        let delay_ms = self
            .hosts
            .get(host)
            .filter(|s| s.current_delay_ms > 0)
            .map(|s| s.current_delay_ms)
            .unwrap_or(self.base_ms);

        Duration::from_millis(delay_ms.clamp(self.min_ms, self.max_ms))
    }

    /// Records one request outcome and adapts the host's delay
    pub fn record(&mut self, host: &str, latency: Duration, error: bool) {
        let base = self.base_ms;
        let window = self.window;
        let threshold = self.threshold;
        let (min, max) = (self.min_ms, self.max_ms);

        let stats = self.hosts.entry(host.to_string()).or_default();
        if stats.current_delay_ms == 0 {
            stats.current_delay_ms = base;
        }

        stats.samples.push_back(Sample {
            latency_ms: latency.as_millis() as u64,
            error,
        });
        while stats.samples.len() > window {
            stats.samples.pop_front();
        }

        let errors = stats.samples.iter().filter(|s| s.error).count();
        let error_rate = errors as f64 / stats.samples.len() as f64;

        if error_rate > threshold {
            stats.current_delay_ms = (stats.current_delay_ms + base).clamp(min, max);
        } else if errors == 0 && Self::latency_is_low(&stats.samples, base) {
            // Halve the excess over the base each healthy request
            let excess = stats.current_delay_ms.saturating_sub(base);
            stats.current_delay_ms = (base + excess / 2).clamp(min, max);
        }
    }

    /// Immediate delay bump for a host that answered 429
    pub fn penalize(&mut self, host: &str) {
        let base = self.base_ms;
        let (min, max) = (self.min_ms, self.max_ms);

        let stats = self.hosts.entry(host.to_string()).or_default();
        if stats.current_delay_ms == 0 {
            stats.current_delay_ms = base;
        }
        stats.current_delay_ms = (stats.current_delay_ms + base).clamp(min, max);
    }

    /// Per-host statistics for checkpointing
    pub fn stats(&self) -> &HashMap<String, HostStats> {
        &self.hosts
    }

    fn latency_is_low(samples: &VecDeque<Sample>, base_ms: u64) -> bool {
        if samples.is_empty() {
            return true;
        }
        let total: u64 = samples.iter().map(|s| s.latency_ms).sum();
        total / samples.len() as u64 <= base_ms
    }
}
