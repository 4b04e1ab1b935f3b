//! Processed-marker store for idempotent consumers
//!
//! At-least-once delivery means every handler sees duplicates. A consumer
//! checks the marker before processing and sets it after the operation
//! commits; a duplicate delivery of the same key then becomes a no-op.
//! Markers expire after a retention window sized to cover plausible
//! redelivery latency.

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Keyed "already processed" markers with TTL-based retention
pub struct ProcessedMarkers {
    seen: DashMap<String, Instant>,
    retention: Duration,
}

impl ProcessedMarkers {
    /// Create a store with the given retention window
    pub fn new(retention: Duration) -> Self {
        Self {
            seen: DashMap::new(),
            retention,
        }
    }

    /// Check whether an operation key was already processed (and its
    /// marker has not yet expired)
    pub fn is_processed(&self, key: &str) -> bool {
        match self.seen.get(key) {
            Some(at) => at.elapsed() < self.retention,
            None => false,
        }
    }

    /// Record an operation key as processed
    pub fn mark(&self, key: impl Into<String>) {
        self.seen.insert(key.into(), Instant::now());
    }

    /// Drop expired markers; call periodically from a maintenance task
    pub fn purge_expired(&self) {
        let retention = self.retention;
        self.seen.retain(|_, at| at.elapsed() < retention);
    }

    /// Number of live markers (expired ones may still be counted until
    /// the next purge)
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for ProcessedMarkers {
    fn default() -> Self {
        // One day covers any plausible broker redelivery.
        Self::new(Duration::from_secs(24 * 60 * 60))
    }
}
