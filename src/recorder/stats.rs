//! Delivery counters for a recorder.
//!
//! Updated from the delivery path without taking the recorder's batch lock,
//! so hosts can poll them at any time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct RecorderStats {
    /// Batches handed to the recorder, including ignored ones
    batches_received: AtomicU64,
    /// Samples written to the data file
    samples_recorded: AtomicU64,
    /// Batches dropped because the recorder was not recording
    batches_ignored: AtomicU64,
    created_at: DateTime<Utc>,
}

impl RecorderStats {
    pub fn new() -> Self {
        Self {
            batches_received: AtomicU64::new(0),
            samples_recorded: AtomicU64::new(0),
            batches_ignored: AtomicU64::new(0),
            created_at: Utc::now(),
        }
    }

    pub(crate) fn record_batch_received(&self) {
        self.batches_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_samples(&self, count: u64) {
        self.samples_recorded.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_batch_ignored(&self) {
        self.batches_ignored.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            batches_received: self.batches_received.load(Ordering::Relaxed),
            samples_recorded: self.samples_recorded.load(Ordering::Relaxed),
            batches_ignored: self.batches_ignored.load(Ordering::Relaxed),
            created_at: self.created_at,
            age_secs: (Utc::now() - self.created_at).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Recorder Statistics:\n\
             - Batches received: {}\n\
             - Samples recorded: {}\n\
             - Batches ignored: {}\n\
             - Recorder age: {} seconds",
            stats.batches_received,
            stats.samples_recorded,
            stats.batches_ignored,
            stats.age_secs
        )
    }
}

impl Default for RecorderStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`RecorderStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub batches_received: u64,
    pub samples_recorded: u64,
    pub batches_ignored: u64,
    pub created_at: DateTime<Utc>,
    pub age_secs: u64,
}
