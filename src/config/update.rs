//! Partial configuration updates
//!
//! Every field is optional; unset fields keep their current value when the
//! update is merged into a [`MonitorConfig`](super::MonitorConfig).

use super::MonitorConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    pub leak_detection: Option<LeakDetectionUpdate>,
    pub degradation: Option<DegradationUpdate>,
    pub auto_optimization: Option<AutoOptimizationUpdate>,
    pub maintenance: Option<MaintenanceUpdate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeakDetectionUpdate {
    pub enabled: Option<bool>,
    #[serde(with = "humantime_serde")]
    pub check_interval: Option<Duration>,
    pub heap_growth_threshold_mb: Option<f64>,
    pub memory_growth_threshold_mb: Option<f64>,
    pub consecutive_checks: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DegradationUpdate {
    pub enabled: Option<bool>,
    #[serde(with = "humantime_serde")]
    pub check_interval: Option<Duration>,
    pub window_size: Option<usize>,
    pub response_time_threshold_pct: Option<f64>,
    pub throughput_threshold_pct: Option<f64>,
    pub consecutive_checks: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoOptimizationUpdate {
    pub enabled: Option<bool>,
    pub memory_ceiling_mb: Option<f64>,
    pub heap_utilization_ceiling_pct: Option<f64>,
    pub response_time_ceiling_ms: Option<f64>,
    pub error_rate_ceiling_pct: Option<f64>,
    pub aggressive_mode: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceUpdate {
    pub enabled: Option<bool>,
    #[serde(with = "humantime_serde")]
    pub interval: Option<Duration>,
    pub tasks: Option<MaintenanceTasksUpdate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceTasksUpdate {
    pub garbage_collection: Option<bool>,
    pub cache_cleanup: Option<bool>,
    pub connection_cleanup: Option<bool>,
    pub metric_pruning: Option<bool>,
    pub log_rotation: Option<bool>,
}

fn set<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

impl ConfigUpdate {
    /// Parse an update from JSON, e.g. a body posted by an admin endpoint
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn apply_to(&self, config: &mut MonitorConfig) {
        if let Some(leak) = &self.leak_detection {
            let target = &mut config.leak_detection;
            set(&mut target.enabled, &leak.enabled);
            set(&mut target.check_interval, &leak.check_interval);
            set(&mut target.heap_growth_threshold_mb, &leak.heap_growth_threshold_mb);
            set(&mut target.memory_growth_threshold_mb, &leak.memory_growth_threshold_mb);
            set(&mut target.consecutive_checks, &leak.consecutive_checks);
        }

        if let Some(degradation) = &self.degradation {
            let target = &mut config.degradation;
            set(&mut target.enabled, &degradation.enabled);
            set(&mut target.check_interval, &degradation.check_interval);
            set(&mut target.window_size, &degradation.window_size);
            set(
                &mut target.response_time_threshold_pct,
                &degradation.response_time_threshold_pct,
            );
            set(&mut target.throughput_threshold_pct, &degradation.throughput_threshold_pct);
            set(&mut target.consecutive_checks, &degradation.consecutive_checks);
        }

        if let Some(auto) = &self.auto_optimization {
            let target = &mut config.auto_optimization;
            set(&mut target.enabled, &auto.enabled);
            set(&mut target.memory_ceiling_mb, &auto.memory_ceiling_mb);
            set(
                &mut target.heap_utilization_ceiling_pct,
                &auto.heap_utilization_ceiling_pct,
            );
            set(&mut target.response_time_ceiling_ms, &auto.response_time_ceiling_ms);
            set(&mut target.error_rate_ceiling_pct, &auto.error_rate_ceiling_pct);
            set(&mut target.aggressive_mode, &auto.aggressive_mode);
        }

        if let Some(maintenance) = &self.maintenance {
            let target = &mut config.maintenance;
            set(&mut target.enabled, &maintenance.enabled);
            set(&mut target.interval, &maintenance.interval);
            if let Some(tasks) = &maintenance.tasks {
                let target = &mut target.tasks;
                set(&mut target.garbage_collection, &tasks.garbage_collection);
                set(&mut target.cache_cleanup, &tasks.cache_cleanup);
                set(&mut target.connection_cleanup, &tasks.connection_cleanup);
                set(&mut target.metric_pruning, &tasks.metric_pruning);
                set(&mut target.log_rotation, &tasks.log_rotation);
            }
        }
    }
}
