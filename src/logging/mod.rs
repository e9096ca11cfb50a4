//! Logging setup
//!
//! The library emits structured `tracing` events; binaries call
//! [`init_logging`] once to install a subscriber.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Global logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    pub level: String,
    /// Include file and line numbers
    pub with_location: bool,
    /// Module-specific log levels
    pub module_levels: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut module_levels = BTreeMap::new();
        module_levels.insert("perfwatch::monitoring".to_string(), "info".to_string());
        module_levels.insert("perfwatch::optimization".to_string(), "info".to_string());

        Self {
            level: "info".to_string(),
            with_location: false,
            module_levels,
        }
    }
}

impl LoggingConfig {
    /// Build the filter; `RUST_LOG` takes precedence when set
    pub fn env_filter(&self) -> Result<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }

        let mut filter = EnvFilter::try_new(&self.level)
            .map_err(|e| Error::Config(format!("Invalid log level '{}': {}", self.level, e)))?;

        for (module, level) in &self.module_levels {
            let directive = format!("{}={}", module, level).parse().map_err(|e| {
                Error::Config(format!("Invalid log directive for {}: {}", module, e))
            })?;
            filter = filter.add_directive(directive);
        }

        Ok(filter)
    }
}

/// Install the global subscriber
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = config.env_filter()?;

    Registry::default()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(config.with_location)
                .with_line_number(config.with_location),
        )
        .try_init()
        .map_err(|e| Error::Config(format!("Logging already initialized: {}", e)))
}
