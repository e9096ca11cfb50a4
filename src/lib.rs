//! Perfwatch - adaptive resource and performance health monitoring
//!
//! A [`HealthMonitor`] watches the host process from three periodic tasks:
//! - leak check: samples memory and looks for sustained heap/RSS growth,
//!   then checks absolute resource ceilings
//! - degradation check: compares two windows of request metrics
//! - maintenance: periodic GC, cache and connection cleanup, metric pruning
//!
//! Confirmed problems trigger tiered remediation and are published as typed
//! [`MonitorEvent`]s.

pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod monitoring;
pub mod optimization;
pub mod utils;

pub use config::{ConfigUpdate, MonitorConfig};
pub use error::{Error, ErrorCategory, Result};
pub use logging::{init_logging, LoggingConfig};
pub use monitor::{HealthMonitor, HealthMonitorBuilder, LeakTick};
pub use monitoring::{
    EventBus, EventKind, MemoryIntrospector, MemoryReading, MetricsProvider, MonitorEvent,
    MonitorStatus, RequestMetrics, RequestStatsCollector, Subscription,
};
pub use optimization::{
    CacheRegistry, GarbageCollector, NoopGarbageCollector, Purgeable, ResourceReclaimer,
};
pub use utils::{Clock, ManualClock, SystemClock, TaskScheduler, TokioScheduler};
