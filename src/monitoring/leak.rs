//! Memory leak detection
//!
//! Compares the two most recent memory samples, converts the deltas into
//! MB/min growth rates and debounces breaches: remediation is only requested
//! once `consecutive_checks` breaches have been seen in a row, after which the
//! counter starts over from zero.

use crate::config::LeakDetectionConfig;
use crate::monitoring::snapshot::{MemorySnapshot, SnapshotStore, BYTES_PER_MB};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Growth between two consecutive memory samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthRates {
    pub heap_growth_rate_mb_per_min: f64,
    pub rss_growth_rate_mb_per_min: f64,
    pub elapsed_minutes: f64,
}

impl GrowthRates {
    /// `None` when the samples are not strictly ordered in time
    pub fn between(previous: &MemorySnapshot, current: &MemorySnapshot) -> Option<Self> {
        let elapsed_ms = (current.timestamp - previous.timestamp).num_milliseconds();
        if elapsed_ms <= 0 {
            return None;
        }
        let elapsed_minutes = elapsed_ms as f64 / 60_000.0;

        let heap_delta_mb = (current.heap_used as f64 - previous.heap_used as f64) / BYTES_PER_MB;
        let rss_delta_mb = (current.rss as f64 - previous.rss as f64) / BYTES_PER_MB;

        Some(Self {
            heap_growth_rate_mb_per_min: heap_delta_mb / elapsed_minutes,
            rss_growth_rate_mb_per_min: rss_delta_mb / elapsed_minutes,
            elapsed_minutes,
        })
    }

    pub fn breaches(&self, config: &LeakDetectionConfig) -> bool {
        self.heap_growth_rate_mb_per_min > config.heap_growth_threshold_mb
            || self.rss_growth_rate_mb_per_min > config.memory_growth_threshold_mb
    }
}

/// Payload of a confirmed leak
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryLeakReport {
    pub rates: GrowthRates,
    pub consecutive_checks: u32,
    pub snapshot: MemorySnapshot,
}

/// Outcome of one leak check
#[derive(Debug, Clone, PartialEq)]
pub enum LeakCheck {
    /// Fewer than two usable samples; the counter is untouched
    InsufficientData,
    /// Growth within thresholds; the counter was reset
    Normal(GrowthRates),
    /// Growth above threshold but not yet confirmed
    Breach { rates: GrowthRates, consecutive: u32 },
    /// Debounce depth reached; the counter has already been reset
    LeakConfirmed(MemoryLeakReport),
}

#[derive(Debug, Default, Clone)]
pub struct MemoryLeakDetector {
    consecutive_increases: u32,
}

impl MemoryLeakDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn consecutive_increases(&self) -> u32 {
        self.consecutive_increases
    }

    pub fn reset(&mut self) {
        self.consecutive_increases = 0;
    }

    /// Evaluate the newest pair of samples in `store`
    pub fn evaluate(&mut self, store: &SnapshotStore, config: &LeakDetectionConfig) -> LeakCheck {
        let Some((previous, current)) = store.last_two_memory() else {
            return LeakCheck::InsufficientData;
        };
        let Some(rates) = GrowthRates::between(previous, current) else {
            return LeakCheck::InsufficientData;
        };

        if !rates.breaches(config) {
            self.consecutive_increases = 0;
            return LeakCheck::Normal(rates);
        }

        self.consecutive_increases += 1;
        debug!(
            heap_growth = rates.heap_growth_rate_mb_per_min,
            rss_growth = rates.rss_growth_rate_mb_per_min,
            consecutive = self.consecutive_increases,
            "Memory growth above threshold"
        );

        if self.consecutive_increases >= config.consecutive_checks {
            let report = MemoryLeakReport {
                rates,
                consecutive_checks: self.consecutive_increases,
                snapshot: *current,
            };
            self.consecutive_increases = 0;
            return LeakCheck::LeakConfirmed(report);
        }

        LeakCheck::Breach {
            rates,
            consecutive: self.consecutive_increases,
        }
    }
}
