//! Stats Module - Resize Monitoring
//!
//! Collects what the old generation can report about itself:
//! - Capacity and usage counters (generation and space)
//! - Resize counts (expansions, shrinks, failed expansions)
//! - Time spent resizing

pub mod counters;
pub mod timer;

pub use counters::{GenerationCounters, GenerationSnapshot, SpaceCounters, SpaceSnapshot};
pub use timer::GcTimer;

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// ResizeStats - running totals for resize activity
#[derive(Debug, Default)]
pub struct ResizeStats {
    expansions: AtomicU64,
    shrinks: AtomicU64,
    failed_expansions: AtomicU64,
    bytes_expanded: AtomicU64,
    bytes_shrunk: AtomicU64,
    resize_time_ns: AtomicU64,
}

/// Serializable view of `ResizeStats`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResizeSnapshot {
    pub expansions: u64,
    pub shrinks: u64,
    pub failed_expansions: u64,
    pub bytes_expanded: u64,
    pub bytes_shrunk: u64,
    pub resize_time_ns: u64,
}

impl ResizeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_expand(&self, bytes: usize, duration: Duration) {
        self.expansions.fetch_add(1, Ordering::Relaxed);
        self.bytes_expanded.fetch_add(bytes as u64, Ordering::Relaxed);
        self.add_time(duration);
    }

    pub fn record_shrink(&self, bytes: usize, duration: Duration) {
        self.shrinks.fetch_add(1, Ordering::Relaxed);
        self.bytes_shrunk.fetch_add(bytes as u64, Ordering::Relaxed);
        self.add_time(duration);
    }

    pub fn record_failed_expand(&self) {
        self.failed_expansions.fetch_add(1, Ordering::Relaxed);
    }

    fn add_time(&self, duration: Duration) {
        self.resize_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ResizeSnapshot {
        ResizeSnapshot {
            expansions: self.expansions.load(Ordering::Relaxed),
            shrinks: self.shrinks.load(Ordering::Relaxed),
            failed_expansions: self.failed_expansions.load(Ordering::Relaxed),
            bytes_expanded: self.bytes_expanded.load(Ordering::Relaxed),
            bytes_shrunk: self.bytes_shrunk.load(Ordering::Relaxed),
            resize_time_ns: self.resize_time_ns.load(Ordering::Relaxed),
        }
    }
}
