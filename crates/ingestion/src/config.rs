//! Loop configuration and per-source counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use contracts::{IngestionConfig, SourceId};

use crate::backoff::Backoff;

/// Settings shared by every source loop
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Pause after a successful read (zero = read back to back)
    pub poll_interval: Duration,

    /// Retry delay template, cloned into each loop
    pub backoff: Backoff,
}

impl LoopConfig {
    /// Derive from the `[ingestion]` config section
    pub fn from_config(config: &IngestionConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            backoff: Backoff::from_config(config),
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::from_config(&IngestionConfig::default())
    }
}

/// Counters for one source loop
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Successful reads (each one published)
    pub reads_ok: AtomicU64,

    /// Failed reads, panics and shape mismatches included
    pub read_failures: AtomicU64,

    /// Failures since the last successful read
    pub consecutive_failures: AtomicU64,

    /// Sequence of the last publish
    pub last_sequence: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a publish
    pub fn record_published(&self, sequence: u64) {
        self.reads_ok.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.last_sequence.store(sequence, Ordering::Relaxed);
    }

    /// Record a failed read; returns the consecutive failure count
    pub fn record_failure(&self) -> u64 {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Get snapshot
    pub fn snapshot(&self, source: SourceId) -> MetricsSnapshot {
        MetricsSnapshot {
            source,
            reads_ok: self.reads_ok.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            last_sequence: self.last_sequence.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`IngestionMetrics`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub source: SourceId,
    pub reads_ok: u64,
    pub read_failures: u64,
    pub consecutive_failures: u64,
    pub last_sequence: u64,
}
