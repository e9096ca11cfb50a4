//! Absolute-threshold watchdog
//!
//! Unlike the trend detectors this acts on a single sample: any ceiling breach
//! requests remediation, limited only by a cooldown shared across all causes.

use crate::config::AutoOptimizationConfig;
use crate::monitoring::snapshot::{MemorySnapshot, PerformanceSnapshot};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Latest figures the ceilings are checked against
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceReadings {
    pub memory_usage_mb: f64,
    pub heap_utilization_pct: f64,
    pub avg_response_time_ms: f64,
    pub error_rate_pct: f64,
}

impl ResourceReadings {
    /// Memory figures come from the memory sample when there is one, falling
    /// back to what the metrics provider reported. Missing data reads as zero.
    pub fn from_latest(
        memory: Option<&MemorySnapshot>,
        performance: Option<&PerformanceSnapshot>,
    ) -> Self {
        let memory_usage_mb = memory
            .map(|m| m.heap_used_mb())
            .or_else(|| performance.map(|p| p.memory_usage_mb))
            .unwrap_or(0.0);

        Self {
            memory_usage_mb,
            heap_utilization_pct: memory.map(|m| m.heap_utilization_pct()).unwrap_or(0.0),
            avg_response_time_ms: performance.map(|p| p.avg_response_time_ms).unwrap_or(0.0),
            error_rate_pct: performance.map(|p| p.error_rate_pct).unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CeilingBreach {
    MemoryUsage,
    HeapUtilization,
    ResponseTime,
    ErrorRate,
}

/// Every ceiling the readings exceed
pub fn ceiling_breaches(
    readings: &ResourceReadings,
    config: &AutoOptimizationConfig,
) -> Vec<CeilingBreach> {
    let mut breaches = Vec::new();
    if readings.memory_usage_mb > config.memory_ceiling_mb {
        breaches.push(CeilingBreach::MemoryUsage);
    }
    if readings.heap_utilization_pct > config.heap_utilization_ceiling_pct {
        breaches.push(CeilingBreach::HeapUtilization);
    }
    if readings.avg_response_time_ms > config.response_time_ceiling_ms {
        breaches.push(CeilingBreach::ResponseTime);
    }
    if readings.error_rate_pct > config.error_rate_ceiling_pct {
        breaches.push(CeilingBreach::ErrorRate);
    }
    breaches
}

pub fn should_optimize(readings: &ResourceReadings, config: &AutoOptimizationConfig) -> bool {
    !ceiling_breaches(readings, config).is_empty()
}

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerDecision {
    WithinLimits,
    /// A ceiling is breached but the previous remediation was too recent
    CoolingDown {
        breaches: Vec<CeilingBreach>,
        remaining: Duration,
    },
    /// Remediate now; the cooldown has been restarted
    Optimize {
        breaches: Vec<CeilingBreach>,
        aggressive: bool,
    },
}

#[derive(Debug, Default, Clone)]
pub struct AutoOptimizationTrigger {
    last_optimization_time: Option<DateTime<Utc>>,
}

impl AutoOptimizationTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_optimization_time(&self) -> Option<DateTime<Utc>> {
        self.last_optimization_time
    }

    pub fn evaluate(
        &mut self,
        readings: &ResourceReadings,
        config: &AutoOptimizationConfig,
        now: DateTime<Utc>,
    ) -> TriggerDecision {
        let breaches = ceiling_breaches(readings, config);
        if breaches.is_empty() {
            return TriggerDecision::WithinLimits;
        }

        let cooldown = Duration::from_std(config.cooldown).unwrap_or(Duration::MAX);
        if let Some(last) = self.last_optimization_time {
            let elapsed = now - last;
            if elapsed < cooldown {
                return TriggerDecision::CoolingDown {
                    breaches,
                    remaining: cooldown - elapsed,
                };
            }
        }

        self.last_optimization_time = Some(now);
        TriggerDecision::Optimize {
            breaches,
            aggressive: config.aggressive_mode,
        }
    }
}
