//! Sampling and detection
//!
//! Everything here is synchronous and side-effect free apart from the event
//! bus; the [`HealthMonitor`](crate::HealthMonitor) decides when to sample
//! and what to do with the verdicts.

pub mod degradation;
pub mod events;
pub mod leak;
pub mod metrics;
pub mod snapshot;
pub mod status;
pub mod system;
pub mod threshold;

pub use degradation::{
    DegradationCheck, DegradationReport, PerformanceDegradationDetector, Severity,
    TrendComparison, WindowAverages,
};
pub use events::{EventBus, EventKind, MonitorEvent, RemediationCause, Subscription};
pub use leak::{GrowthRates, LeakCheck, MemoryLeakDetector, MemoryLeakReport};
pub use metrics::{MetricsProvider, RequestMetrics, RequestStatsCollector};
pub use snapshot::{MemorySnapshot, PerformanceSnapshot, SnapshotStore};
pub use status::{DetectionTotals, MonitorStatus, Recommendation, OPTIMAL_MESSAGE};
pub use system::{create_introspector, MemoryIntrospector, MemoryReading};
pub use threshold::{
    ceiling_breaches, should_optimize, AutoOptimizationTrigger, CeilingBreach, ResourceReadings,
    TriggerDecision,
};
