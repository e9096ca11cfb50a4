//! Configuration for the health monitor
//!
//! This module provides:
//! - TOML file loading with humantime durations (`"60s"`, `"5m"`)
//! - Environment variable overrides (`PERFWATCH_*`)
//! - Validation of intervals, window sizes and thresholds
//! - Partial updates merged at runtime (see [`ConfigUpdate`])

pub mod update;

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub use update::{
    AutoOptimizationUpdate, ConfigUpdate, DegradationUpdate, LeakDetectionUpdate,
    MaintenanceTasksUpdate, MaintenanceUpdate,
};

/// Main monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MonitorConfig {
    pub leak_detection: LeakDetectionConfig,
    pub degradation: DegradationConfig,
    pub auto_optimization: AutoOptimizationConfig,
    pub maintenance: MaintenanceConfig,
    pub reporting: ReportingConfig,
    pub collection: CollectionConfig,
    pub logging: LoggingConfig,
}

/// Memory leak detector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeakDetectionConfig {
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub check_interval: Duration,
    /// Heap growth (MB/min) that counts as a breach
    pub heap_growth_threshold_mb: f64,
    /// RSS growth (MB/min) that counts as a breach
    pub memory_growth_threshold_mb: f64,
    /// Consecutive breaches required before remediation
    pub consecutive_checks: u32,
}

impl Default for LeakDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval: Duration::from_secs(60),
            heap_growth_threshold_mb: 5.0,
            memory_growth_threshold_mb: 10.0,
            consecutive_checks: 3,
        }
    }
}

/// Performance degradation detector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DegradationConfig {
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub check_interval: Duration,
    /// Samples per comparison window; the buffer holds twice this
    pub window_size: usize,
    /// Response time increase (%) that counts as degradation
    pub response_time_threshold_pct: f64,
    /// Throughput decrease (%) that counts as degradation
    pub throughput_threshold_pct: f64,
    pub consecutive_checks: u32,
    /// Response time increase (%) above which remediation is aggressive
    pub aggressive_response_time_pct: f64,
    /// Throughput decrease (%) above which remediation is aggressive
    pub aggressive_throughput_pct: f64,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval: Duration::from_secs(30),
            window_size: 10,
            response_time_threshold_pct: 20.0,
            throughput_threshold_pct: 15.0,
            consecutive_checks: 2,
            aggressive_response_time_pct: 50.0,
            aggressive_throughput_pct: 30.0,
        }
    }
}

/// Absolute-threshold watchdog settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoOptimizationConfig {
    pub enabled: bool,
    pub memory_ceiling_mb: f64,
    pub heap_utilization_ceiling_pct: f64,
    pub response_time_ceiling_ms: f64,
    pub error_rate_ceiling_pct: f64,
    pub aggressive_mode: bool,
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,
}

impl Default for AutoOptimizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            memory_ceiling_mb: 400.0,
            heap_utilization_ceiling_pct: 85.0,
            response_time_ceiling_ms: 1000.0,
            error_rate_ceiling_pct: 2.0,
            aggressive_mode: false,
            cooldown: Duration::from_secs(60),
        }
    }
}

/// Maintenance scheduler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    pub tasks: MaintenanceTasks,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(300),
            tasks: MaintenanceTasks::default(),
        }
    }
}

/// Per-task enable flags for a maintenance pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceTasks {
    pub garbage_collection: bool,
    pub cache_cleanup: bool,
    pub connection_cleanup: bool,
    pub metric_pruning: bool,
    pub log_rotation: bool,
}

impl Default for MaintenanceTasks {
    fn default() -> Self {
        Self {
            garbage_collection: true,
            cache_cleanup: true,
            connection_cleanup: true,
            metric_pruning: true,
            log_rotation: false,
        }
    }
}

/// Thresholds the status report derives recommendations from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    pub heap_utilization_pct: f64,
    pub memory_usage_mb: f64,
    pub response_time_ms: f64,
    pub error_rate_pct: f64,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            heap_utilization_pct: 85.0,
            memory_usage_mb: 400.0,
            response_time_ms: 500.0,
            error_rate_pct: 1.0,
        }
    }
}

/// Sample collection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// A metrics provider slower than this counts as a collection failure
    #[serde(with = "humantime_serde")]
    pub provider_timeout: Duration,
    /// How long memory snapshots are retained
    #[serde(with = "humantime_serde")]
    pub memory_retention: Duration,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(5),
            memory_retention: Duration::from_secs(3600),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from a file, apply environment overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };

        config.override_from_env()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: MonitorConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Override configuration with environment variables
    pub fn override_from_env(&mut self) -> Result<()> {
        if let Ok(val) = env::var("PERFWATCH_LEAK_CHECK_INTERVAL") {
            self.leak_detection.check_interval = parse_duration(&val, "leak check interval")?;
        }

        if let Ok(val) = env::var("PERFWATCH_DEGRADATION_CHECK_INTERVAL") {
            self.degradation.check_interval =
                parse_duration(&val, "degradation check interval")?;
        }

        if let Ok(val) = env::var("PERFWATCH_MAINTENANCE_INTERVAL") {
            self.maintenance.interval = parse_duration(&val, "maintenance interval")?;
        }

        if let Ok(val) = env::var("PERFWATCH_AGGRESSIVE_MODE") {
            self.auto_optimization.aggressive_mode = val
                .parse()
                .map_err(|_| Error::Config("Invalid aggressive mode flag".to_string()))?;
        }

        if let Ok(val) = env::var("PERFWATCH_MEMORY_CEILING_MB") {
            self.auto_optimization.memory_ceiling_mb = val
                .parse()
                .map_err(|_| Error::Config("Invalid memory ceiling".to_string()))?;
        }

        if let Ok(val) = env::var("PERFWATCH_LOG_LEVEL") {
            self.logging.level = val;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.leak_detection.check_interval.is_zero() {
            return Err(Error::Config("Leak check interval must be > 0".to_string()));
        }

        if self.leak_detection.consecutive_checks == 0 {
            return Err(Error::Config(
                "Leak detection consecutive checks must be >= 1".to_string(),
            ));
        }

        if !non_negative(self.leak_detection.heap_growth_threshold_mb)
            || !non_negative(self.leak_detection.memory_growth_threshold_mb)
        {
            return Err(Error::Config(
                "Memory growth thresholds cannot be negative".to_string(),
            ));
        }

        if self.degradation.check_interval.is_zero() {
            return Err(Error::Config(
                "Degradation check interval must be > 0".to_string(),
            ));
        }

        if self.degradation.window_size == 0 {
            return Err(Error::Config("Window size must be >= 1".to_string()));
        }

        if self.degradation.consecutive_checks == 0 {
            return Err(Error::Config(
                "Degradation consecutive checks must be >= 1".to_string(),
            ));
        }

        let degradation = &self.degradation;
        if !non_negative(degradation.response_time_threshold_pct)
            || !non_negative(degradation.throughput_threshold_pct)
            || !non_negative(degradation.aggressive_response_time_pct)
            || !non_negative(degradation.aggressive_throughput_pct)
        {
            return Err(Error::Config(
                "Degradation thresholds cannot be negative".to_string(),
            ));
        }

        let ceilings = &self.auto_optimization;
        if !non_negative(ceilings.memory_ceiling_mb)
            || !non_negative(ceilings.response_time_ceiling_ms)
            || !non_negative(ceilings.error_rate_ceiling_pct)
        {
            return Err(Error::Config(
                "Auto-optimization ceilings cannot be negative".to_string(),
            ));
        }

        if !(0.0..=100.0).contains(&ceilings.heap_utilization_ceiling_pct) {
            return Err(Error::Config(
                "Heap utilization ceiling must be between 0 and 100%".to_string(),
            ));
        }

        if self.maintenance.interval.is_zero() {
            return Err(Error::Config("Maintenance interval must be > 0".to_string()));
        }

        if self.collection.memory_retention.is_zero() {
            return Err(Error::Config("Memory retention must be > 0".to_string()));
        }

        Ok(())
    }

    /// Merge a partial update into a copy of this configuration
    pub fn merged(&self, update: &ConfigUpdate) -> Self {
        let mut config = self.clone();
        update.apply_to(&mut config);
        config
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = self.to_toml()?;

        fs::write(path, contents)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn parse_duration(value: &str, what: &str) -> Result<Duration> {
    humantime_serde::re::humantime::parse_duration(value)
        .map_err(|e| Error::Config(format!("Invalid {}: {}", what, e)))
}

/// Finite and not below zero; rejects NaN
fn non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.leak_detection.check_interval, Duration::from_secs(60));
        assert_eq!(config.leak_detection.consecutive_checks, 3);
        assert_eq!(config.degradation.check_interval, Duration::from_secs(30));
        assert_eq!(config.degradation.window_size, 10);
        assert_eq!(config.degradation.consecutive_checks, 2);
        assert_eq!(config.auto_optimization.cooldown, Duration::from_secs(60));
        assert_eq!(config.maintenance.interval, Duration::from_secs(300));
        assert!(!config.maintenance.tasks.log_rotation);
    }

    #[test]
    fn test_rejects_nonsensical_values() {
        let mut config = MonitorConfig::default();
        config.degradation.window_size = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = MonitorConfig::default();
        config.leak_detection.consecutive_checks = 0;
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.auto_optimization.heap_utilization_ceiling_pct = 140.0;
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.maintenance.interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_nan_and_negative_thresholds() {
        let mut config = MonitorConfig::default();
        config.auto_optimization.error_rate_ceiling_pct = f64::NAN;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = MonitorConfig::default();
        config.leak_detection.heap_growth_threshold_mb = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.degradation.aggressive_response_time_pct = -1.0;
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.degradation.aggressive_throughput_pct = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.auto_optimization.heap_utilization_ceiling_pct = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[leak_detection]
check_interval = "2m"
consecutive_checks = 4

[maintenance.tasks]
log_rotation = true
"#
        )
        .unwrap();

        let config = MonitorConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.leak_detection.check_interval, Duration::from_secs(120));
        assert_eq!(config.leak_detection.consecutive_checks, 4);
        assert_eq!(config.leak_detection.heap_growth_threshold_mb, 5.0);
        assert!(config.maintenance.tasks.log_rotation);
        assert!(config.maintenance.tasks.cache_cleanup);
        assert_eq!(config.degradation, DegradationConfig::default());
    }

    #[test]
    fn test_toml_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perfwatch.toml");

        let mut config = MonitorConfig::default();
        config.auto_optimization.aggressive_mode = true;
        config.degradation.window_size = 5;
        config.save(&path).unwrap();

        let loaded = MonitorConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_unparseable_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "leak_detection = 12").unwrap();

        let err = MonitorConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
