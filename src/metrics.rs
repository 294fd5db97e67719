//! Metrics for observing store and compaction activity.
//!
//! Compaction failures are contained per file and never crash the process,
//! so these counters are the channel through which they surface.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    /// Create a new counter initialized to 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter by 1.
    pub fn inc(&self) {
        self.add(1);
    }

    /// Add a value to the counter.
    pub fn add(&self, v: u64) {
        self.value.fetch_add(v, Ordering::Relaxed);
    }

    /// Get the current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A gauge that can go up or down.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    /// Create a new gauge initialized to 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the gauge to a specific value.
    pub fn set(&self, v: i64) {
        self.value.store(v, Ordering::Relaxed);
    }

    /// Get the current value.
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Metrics collected by a store instance.
#[derive(Debug, Default)]
pub struct StoreMetrics {
    /// Number of put operations.
    pub puts: Counter,
    /// Number of get operations.
    pub gets: Counter,
    /// Bytes appended to the value log.
    pub bytes_written: Counter,
    /// Bytes read back by gets.
    pub bytes_read: Counter,
    /// Completed compaction passes.
    pub compaction_passes: Counter,
    /// Records relocated to a higher level.
    pub records_rewritten: Counter,
    /// Stale records dropped by compaction.
    pub records_dropped: Counter,
    /// Bytes reclaimed by dropping stale records.
    pub bytes_reclaimed: Counter,
    /// Per-file compaction I/O failures (contained, not fatal).
    pub compaction_errors: Counter,
    /// Current logical store size.
    pub live_size: Gauge,
}

impl StoreMetrics {
    /// Create a fresh metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot all metrics into a plain summary.
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            puts: self.puts.get(),
            gets: self.gets.get(),
            bytes_written: self.bytes_written.get(),
            bytes_read: self.bytes_read.get(),
            compaction_passes: self.compaction_passes.get(),
            records_rewritten: self.records_rewritten.get(),
            records_dropped: self.records_dropped.get(),
            bytes_reclaimed: self.bytes_reclaimed.get(),
            compaction_errors: self.compaction_errors.get(),
            live_size: self.live_size.get(),
        }
    }
}

/// Point-in-time copy of all store metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSummary {
    pub puts: u64,
    pub gets: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
    pub compaction_passes: u64,
    pub records_rewritten: u64,
    pub records_dropped: u64,
    pub bytes_reclaimed: u64,
    pub compaction_errors: u64,
    pub live_size: i64,
}
