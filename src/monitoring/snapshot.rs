//! Bounded, time-pruned sample buffers

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Process memory figures captured on a leak-check tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub timestamp: DateTime<Utc>,
    pub heap_used: u64,
    pub heap_total: u64,
    pub rss: u64,
    pub external: u64,
}

impl MemorySnapshot {
    pub fn heap_used_mb(&self) -> f64 {
        self.heap_used as f64 / BYTES_PER_MB
    }

    pub fn rss_mb(&self) -> f64 {
        self.rss as f64 / BYTES_PER_MB
    }

    /// Heap used as a percentage of heap total; 0 when the total is unknown
    pub fn heap_utilization_pct(&self) -> f64 {
        if self.heap_total == 0 {
            return 0.0;
        }
        self.heap_used as f64 / self.heap_total as f64 * 100.0
    }
}

/// Request performance figures captured on a degradation-check tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub timestamp: DateTime<Utc>,
    pub avg_response_time_ms: f64,
    pub requests_per_second: f64,
    pub error_rate_pct: f64,
    pub memory_usage_mb: f64,
}

/// Holds the memory and performance histories
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    memory: VecDeque<MemorySnapshot>,
    performance: VecDeque<PerformanceSnapshot>,
    memory_retention: Duration,
    performance_capacity: usize,
}

impl SnapshotStore {
    /// `performance_capacity` is twice the comparison window size
    pub fn new(memory_retention: std::time::Duration, performance_capacity: usize) -> Self {
        Self {
            memory: VecDeque::new(),
            performance: VecDeque::with_capacity(performance_capacity),
            memory_retention: to_chrono(memory_retention),
            performance_capacity: performance_capacity.max(1),
        }
    }

    /// Append a memory sample and drop everything outside the retention window
    pub fn push_memory(&mut self, snapshot: MemorySnapshot) {
        self.memory.push_back(snapshot);
        self.prune_memory(snapshot.timestamp);
    }

    /// Append a performance sample, trimming the oldest beyond capacity
    pub fn push_performance(&mut self, snapshot: PerformanceSnapshot) {
        self.performance.push_back(snapshot);
        while self.performance.len() > self.performance_capacity {
            self.performance.pop_front();
        }
    }

    /// Drop memory samples older than the retention window relative to `now`
    pub fn prune_memory(&mut self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = self.cutoff(now) else {
            return 0;
        };
        let before = self.memory.len();
        self.memory.retain(|s| s.timestamp >= cutoff);
        before - self.memory.len()
    }

    /// Drop stale samples from both buffers; returns how many were removed
    pub fn prune_stale(&mut self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = self.cutoff(now) else {
            return 0;
        };
        let before = self.performance.len();
        self.performance.retain(|s| s.timestamp >= cutoff);
        self.prune_memory(now) + (before - self.performance.len())
    }

    fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        now.checked_sub_signed(self.memory_retention)
    }

    /// Change the performance capacity, trimming if it shrank
    pub fn set_performance_capacity(&mut self, capacity: usize) {
        self.performance_capacity = capacity.max(1);
        while self.performance.len() > self.performance_capacity {
            self.performance.pop_front();
        }
    }

    pub fn set_memory_retention(&mut self, retention: std::time::Duration) {
        self.memory_retention = to_chrono(retention);
    }

    /// The two most recent memory samples, oldest first
    pub fn last_two_memory(&self) -> Option<(&MemorySnapshot, &MemorySnapshot)> {
        let len = self.memory.len();
        if len < 2 {
            return None;
        }
        Some((&self.memory[len - 2], &self.memory[len - 1]))
    }

    /// Split off `(previous, recent)`: the last `window` samples and the
    /// `window` immediately before them. `None` until `2 * window` exist.
    pub fn performance_windows(
        &self,
        window: usize,
    ) -> Option<(Vec<PerformanceSnapshot>, Vec<PerformanceSnapshot>)> {
        let len = self.performance.len();
        if window == 0 || len < window * 2 {
            return None;
        }
        let previous = self.performance.range(len - 2 * window..len - window).copied().collect();
        let recent = self.performance.range(len - window..).copied().collect();
        Some((previous, recent))
    }

    pub fn latest_memory(&self) -> Option<&MemorySnapshot> {
        self.memory.back()
    }

    pub fn latest_performance(&self) -> Option<&PerformanceSnapshot> {
        self.performance.back()
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    pub fn performance_len(&self) -> usize {
        self.performance.len()
    }

    pub fn memory_snapshots(&self) -> impl Iterator<Item = &MemorySnapshot> {
        self.memory.iter()
    }

    pub fn performance_snapshots(&self) -> impl Iterator<Item = &PerformanceSnapshot> {
        self.performance.iter()
    }
}

fn to_chrono(duration: std::time::Duration) -> Duration {
    Duration::from_std(duration).unwrap_or(Duration::MAX)
}
