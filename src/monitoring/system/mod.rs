//! Host memory introspection
//!
//! Provides the heap / resident-set figures the leak detector samples.
//! Linux reads them from `/proc/self/status`; other platforms report a
//! platform error so the tick is skipped instead of acting on made-up numbers.

#[cfg(target_os = "linux")]
pub mod linux;

pub mod fallback;

use crate::error::Result;
use crate::monitoring::snapshot::{MemorySnapshot, BYTES_PER_MB};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw memory figures in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryReading {
    pub heap_used: u64,
    pub heap_total: u64,
    pub rss: u64,
    pub external: u64,
}

impl MemoryReading {
    pub fn rss_mb(&self) -> f64 {
        self.rss as f64 / BYTES_PER_MB
    }

    pub fn heap_used_mb(&self) -> f64 {
        self.heap_used as f64 / BYTES_PER_MB
    }

    pub fn at(self, timestamp: DateTime<Utc>) -> MemorySnapshot {
        MemorySnapshot {
            timestamp,
            heap_used: self.heap_used,
            heap_total: self.heap_total,
            rss: self.rss,
            external: self.external,
        }
    }
}

/// Source of process memory figures
pub trait MemoryIntrospector: Send + Sync {
    fn sample(&self) -> Result<MemoryReading>;

    fn platform_name(&self) -> &str;
}

/// Create the introspector for the current platform
pub fn create_introspector() -> Box<dyn MemoryIntrospector> {
    #[cfg(target_os = "linux")]
    {
        Box::new(linux::ProcessMemoryIntrospector::new())
    }

    #[cfg(not(target_os = "linux"))]
    {
        Box::new(fallback::UnsupportedIntrospector::new())
    }
}
