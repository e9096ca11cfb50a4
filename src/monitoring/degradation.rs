//! Performance degradation detection
//!
//! Splits the performance history into two equal, adjacent windows and
//! compares their means. A regression has to be seen on
//! `consecutive_checks` evaluations in a row before it is confirmed.

use crate::config::DegradationConfig;
use crate::monitoring::snapshot::{PerformanceSnapshot, SnapshotStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Remediation tier chosen for a confirmed degradation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Standard,
    Aggressive,
}

impl Severity {
    pub fn is_aggressive(&self) -> bool {
        matches!(self, Severity::Aggressive)
    }
}

/// Means over one comparison window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowAverages {
    pub response_time_ms: f64,
    pub throughput_rps: f64,
    pub error_rate_pct: f64,
}

impl WindowAverages {
    pub fn of(window: &[PerformanceSnapshot]) -> Self {
        let count = window.len().max(1) as f64;
        Self {
            response_time_ms: window.iter().map(|s| s.avg_response_time_ms).sum::<f64>() / count,
            throughput_rps: window.iter().map(|s| s.requests_per_second).sum::<f64>() / count,
            error_rate_pct: window.iter().map(|s| s.error_rate_pct).sum::<f64>() / count,
        }
    }
}

/// Relative change between the previous and the recent window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendComparison {
    pub previous: WindowAverages,
    pub recent: WindowAverages,
    pub response_time_increase_pct: f64,
    pub throughput_decrease_pct: f64,
}

impl TrendComparison {
    pub fn between(previous: WindowAverages, recent: WindowAverages) -> Self {
        let response_time_increase_pct = if previous.response_time_ms == 0.0 {
            0.0
        } else {
            (recent.response_time_ms - previous.response_time_ms) / previous.response_time_ms
                * 100.0
        };

        let throughput_decrease_pct = if previous.throughput_rps == 0.0 {
            0.0
        } else {
            (previous.throughput_rps - recent.throughput_rps) / previous.throughput_rps * 100.0
        };

        Self {
            previous,
            recent,
            response_time_increase_pct,
            throughput_decrease_pct,
        }
    }

    pub fn is_degraded(&self, config: &DegradationConfig) -> bool {
        self.response_time_increase_pct > config.response_time_threshold_pct
            || self.throughput_decrease_pct > config.throughput_threshold_pct
    }

    pub fn severity(&self, config: &DegradationConfig) -> Severity {
        if self.response_time_increase_pct > config.aggressive_response_time_pct
            || self.throughput_decrease_pct > config.aggressive_throughput_pct
        {
            Severity::Aggressive
        } else {
            Severity::Standard
        }
    }
}

/// Payload of a confirmed degradation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationReport {
    pub comparison: TrendComparison,
    pub severity: Severity,
    pub consecutive_checks: u32,
}

/// Outcome of one degradation check
#[derive(Debug, Clone, PartialEq)]
pub enum DegradationCheck {
    /// Fewer than two full windows collected
    InsufficientData { collected: usize, required: usize },
    Healthy(TrendComparison),
    Degrading { comparison: TrendComparison, consecutive: u32 },
    /// Debounce depth reached; the counter has already been reset
    Confirmed(DegradationReport),
}

#[derive(Debug, Default, Clone)]
pub struct PerformanceDegradationDetector {
    consecutive_decreases: u32,
}

impl PerformanceDegradationDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn consecutive_decreases(&self) -> u32 {
        self.consecutive_decreases
    }

    pub fn reset(&mut self) {
        self.consecutive_decreases = 0;
    }

    pub fn evaluate(
        &mut self,
        store: &SnapshotStore,
        config: &DegradationConfig,
    ) -> DegradationCheck {
        let Some((previous, recent)) = store.performance_windows(config.window_size) else {
            return DegradationCheck::InsufficientData {
                collected: store.performance_len(),
                required: config.window_size * 2,
            };
        };

        let comparison =
            TrendComparison::between(WindowAverages::of(&previous), WindowAverages::of(&recent));

        if !comparison.is_degraded(config) {
            self.consecutive_decreases = 0;
            return DegradationCheck::Healthy(comparison);
        }

        self.consecutive_decreases += 1;
        debug!(
            response_time_increase_pct = comparison.response_time_increase_pct,
            throughput_decrease_pct = comparison.throughput_decrease_pct,
            consecutive = self.consecutive_decreases,
            "Performance regression observed"
        );

        if self.consecutive_decreases >= config.consecutive_checks {
            let report = DegradationReport {
                comparison,
                severity: comparison.severity(config),
                consecutive_checks: self.consecutive_decreases,
            };
            self.consecutive_decreases = 0;
            return DegradationCheck::Confirmed(report);
        }

        DegradationCheck::Degrading {
            comparison,
            consecutive: self.consecutive_decreases,
        }
    }
}
