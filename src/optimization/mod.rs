//! Remediation and housekeeping
//!
//! - [`remediation`]: tiered memory and performance optimization
//! - [`maintenance`]: periodic housekeeping passes
//! - [`cache_registry`]: a reclaimer over registered caches and pools

pub mod cache_registry;
pub mod maintenance;
pub mod remediation;

pub use cache_registry::{CacheRegistry, IdleConnectionPool, LogRotator, Purgeable};
pub use maintenance::{MaintenanceReport, MaintenanceRunner, MaintenanceTaskKind};
pub use remediation::{
    GarbageCollector, NoopGarbageCollector, RemediationContext, RemediationExecutor,
    RemediationStats, ResourceReclaimer, DEFERRED_GC_DELAYS,
};
