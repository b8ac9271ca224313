//! The metric sink boundary. Metric counters are the one piece of shared mutable state the core
//! touches, so they're routed through an atomic-counter abstraction the host supplies rather than
//! a process-wide singleton.

use ahash::AHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Name of the counter incremented once per element dropped as late.
pub const DROPPED_DUE_TO_LATENESS: &str = "droppedDueToLateness";
/// Name of the counter incremented once per element delivered to user code.
pub const PROCESSED_ELEMENTS: &str = "processedElements";

/// A named, monotonically-incrementing counter sink. Implementations must be safe to call from a
/// single logical thread of control per key; the core never calls a sink concurrently for the
/// same key, but a host may back several keys with the same sink instance.
pub trait MetricSink: Send + Sync {
    fn inc(&self, name: &str, n: u64);
}

/// A sink that discards every increment, used when `PipelineOptions::disable_metrics` is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricSink;

impl MetricSink for NoopMetricSink {
    fn inc(&self, _name: &str, _n: u64) {}
}

/// An in-memory sink backed by atomic counters, intended for tests and for hosts that just want a
/// snapshot at the end of a key's processing rather than a push to an external system.
#[derive(Debug, Default)]
pub struct CountingMetricSink {
    counters: Mutex<AHashMap<String, AtomicU64>>,
}

impl CountingMetricSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .unwrap()
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

impl MetricSink for CountingMetricSink {
    fn inc(&self, name: &str, n: u64) {
        let mut counters = self.counters.lock().unwrap();
        counters
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(n, Ordering::Relaxed);
    }
}
