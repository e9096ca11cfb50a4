//! Point-in-time monitor status and recommendations

use crate::config::ReportingConfig;
use crate::monitoring::threshold::ResourceReadings;
use crate::optimization::remediation::RemediationStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const OPTIMAL_MESSAGE: &str = "System performance is optimal";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakDetectionStatus {
    pub enabled: bool,
    pub consecutive_increases: u32,
    pub snapshots: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationStatus {
    pub enabled: bool,
    pub consecutive_decreases: u32,
    pub snapshots: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceStatus {
    pub enabled: bool,
    pub passes: u64,
    pub task_failures: u64,
}

/// Running totals of what the monitor has detected
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionTotals {
    pub memory_leaks: u64,
    pub degradations: u64,
    pub threshold_optimizations: u64,
    pub collection_failures: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub generated_at: DateTime<Utc>,
    pub running: bool,
    pub leak_detection: LeakDetectionStatus,
    pub degradation: DegradationStatus,
    pub maintenance: MaintenanceStatus,
    pub readings: ResourceReadings,
    pub detections: DetectionTotals,
    pub remediation: RemediationStats,
    pub last_optimization_time: Option<DateTime<Utc>>,
    pub recommendations: Vec<String>,
}

impl MonitorStatus {
    pub fn is_optimal(&self) -> bool {
        self.recommendations.len() == 1 && self.recommendations[0] == OPTIMAL_MESSAGE
    }
}

/// Conditions that produce a recommendation, highest priority first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Recommendation {
    HighHeapUtilization,
    SuspectedMemoryLeak,
    HighMemoryUsage,
    HighErrorRate,
    SlowResponses,
    DegradingPerformance,
}

impl Recommendation {
    pub fn message(&self) -> &'static str {
        match self {
            Self::HighHeapUtilization => {
                "Heap utilization is high: review large allocations and cache sizes"
            }
            Self::SuspectedMemoryLeak => {
                "Memory is growing across consecutive checks: investigate a possible leak"
            }
            Self::HighMemoryUsage => {
                "Memory usage is high: consider purging caches or raising the memory budget"
            }
            Self::HighErrorRate => "Error rate is elevated: inspect recent failures",
            Self::SlowResponses => {
                "Average response time is high: profile slow requests and downstream calls"
            }
            Self::DegradingPerformance => {
                "Performance is trending down: watch for sustained degradation"
            }
        }
    }
}

/// Inputs the recommendation rules read
#[derive(Debug, Clone, Copy)]
pub struct StatusInputs<'a> {
    pub readings: &'a ResourceReadings,
    pub consecutive_increases: u32,
    pub consecutive_decreases: u32,
    pub limits: &'a ReportingConfig,
}

/// Deduplicated, priority-ordered recommendations
pub fn recommendations(inputs: &StatusInputs<'_>) -> Vec<Recommendation> {
    let readings = inputs.readings;
    let limits = inputs.limits;
    let mut found = Vec::new();

    if readings.heap_utilization_pct > limits.heap_utilization_pct {
        found.push(Recommendation::HighHeapUtilization);
    }
    if readings.memory_usage_mb > limits.memory_usage_mb {
        found.push(Recommendation::HighMemoryUsage);
    }
    if readings.avg_response_time_ms > limits.response_time_ms {
        found.push(Recommendation::SlowResponses);
    }
    if readings.error_rate_pct > limits.error_rate_pct {
        found.push(Recommendation::HighErrorRate);
    }
    if inputs.consecutive_increases > 0 {
        found.push(Recommendation::SuspectedMemoryLeak);
    }
    if inputs.consecutive_decreases > 0 {
        found.push(Recommendation::DegradingPerformance);
    }

    found.sort();
    found.dedup();
    found
}

/// Recommendation messages, or the single optimal message when none apply
pub fn recommendation_messages(inputs: &StatusInputs<'_>) -> Vec<String> {
    let found = recommendations(inputs);
    if found.is_empty() {
        return vec![OPTIMAL_MESSAGE.to_string()];
    }
    found.iter().map(|r| r.message().to_string()).collect()
}
