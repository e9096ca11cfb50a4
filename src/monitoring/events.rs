//! Typed monitor events and the publish/subscribe bus that carries them

use crate::error::panic_message;
use crate::monitoring::degradation::DegradationReport;
use crate::monitoring::leak::MemoryLeakReport;
use crate::monitoring::threshold::CeilingBreach;
use crate::optimization::maintenance::MaintenanceTaskKind;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tracing::{error, trace};

/// What caused a remediation to run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RemediationCause {
    MemoryLeak,
    PerformanceDegradation,
    ThresholdBreach(Vec<CeilingBreach>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum MonitorEvent {
    MemoryLeak {
        timestamp: DateTime<Utc>,
        report: MemoryLeakReport,
    },
    PerformanceDegradation {
        timestamp: DateTime<Utc>,
        report: DegradationReport,
    },
    MemoryOptimized {
        timestamp: DateTime<Utc>,
        /// Heap bytes released, when it could be measured
        freed_bytes: Option<u64>,
    },
    PerformanceOptimized {
        timestamp: DateTime<Utc>,
        aggressive: bool,
        cause: RemediationCause,
    },
    MaintenanceCompleted {
        timestamp: DateTime<Utc>,
        tasks: Vec<MaintenanceTaskKind>,
        pruned_snapshots: usize,
        duration_ms: u64,
    },
    MaintenanceError {
        timestamp: DateTime<Utc>,
        task: MaintenanceTaskKind,
        error: String,
    },
    OptimizationError {
        timestamp: DateTime<Utc>,
        action: String,
        error: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    MemoryLeak,
    PerformanceDegradation,
    MemoryOptimized,
    PerformanceOptimized,
    MaintenanceCompleted,
    MaintenanceError,
    OptimizationError,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MemoryLeak => "memoryLeak",
            Self::PerformanceDegradation => "performanceDegradation",
            Self::MemoryOptimized => "memoryOptimized",
            Self::PerformanceOptimized => "performanceOptimized",
            Self::MaintenanceCompleted => "maintenanceCompleted",
            Self::MaintenanceError => "maintenanceError",
            Self::OptimizationError => "optimizationError",
        }
    }
}

impl MonitorEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MemoryLeak { .. } => EventKind::MemoryLeak,
            Self::PerformanceDegradation { .. } => EventKind::PerformanceDegradation,
            Self::MemoryOptimized { .. } => EventKind::MemoryOptimized,
            Self::PerformanceOptimized { .. } => EventKind::PerformanceOptimized,
            Self::MaintenanceCompleted { .. } => EventKind::MaintenanceCompleted,
            Self::MaintenanceError { .. } => EventKind::MaintenanceError,
            Self::OptimizationError { .. } => EventKind::OptimizationError,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::MemoryLeak { timestamp, .. }
            | Self::PerformanceDegradation { timestamp, .. }
            | Self::MemoryOptimized { timestamp, .. }
            | Self::PerformanceOptimized { timestamp, .. }
            | Self::MaintenanceCompleted { timestamp, .. }
            | Self::MaintenanceError { timestamp, .. }
            | Self::OptimizationError { timestamp, .. } => *timestamp,
        }
    }
}

type Listener = Arc<dyn Fn(&MonitorEvent) + Send + Sync>;

struct Registration {
    filter: Option<EventKind>,
    listener: Listener,
}

type Registry = RwLock<BTreeMap<u64, Registration>>;

/// Synchronous listeners plus a broadcast channel for async consumers
pub struct EventBus {
    listeners: Arc<Registry>,
    next_id: AtomicU64,
    sender: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            listeners: Arc::new(RwLock::new(BTreeMap::new())),
            next_id: AtomicU64::new(1),
            sender,
        }
    }

    /// Register a listener for every event
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&MonitorEvent) + Send + Sync + 'static,
    {
        self.register(None, Arc::new(listener))
    }

    /// Register a listener for one kind of event
    pub fn subscribe_to<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&MonitorEvent) + Send + Sync + 'static,
    {
        self.register(Some(kind), Arc::new(listener))
    }

    /// Receive events on an async channel; slow receivers lag rather than block
    pub fn receiver(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    fn register(&self, filter: Option<EventKind>, listener: Listener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .insert(id, Registration { filter, listener });
        Subscription {
            id,
            registry: Arc::downgrade(&self.listeners),
            active: true,
        }
    }

    /// Deliver an event to matching listeners and the broadcast channel.
    /// A panicking listener is logged and does not affect the others.
    pub fn emit(&self, event: MonitorEvent) {
        let kind = event.kind();
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .values()
            .filter(|r| r.filter.map_or(true, |f| f == kind))
            .map(|r| Arc::clone(&r.listener))
            .collect();

        trace!(event = kind.name(), listeners = listeners.len(), "Emitting event");

        for listener in listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                error!(
                    event = kind.name(),
                    "Event listener panicked: {}",
                    panic_message(panic.as_ref())
                );
            }
        }

        // No receivers is not an error
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Keeps a listener registered; dropping it unsubscribes
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
    active: bool,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.remove();
    }

    /// Keep the listener registered for the lifetime of the bus
    pub fn detach(mut self) {
        self.active = false;
    }

    fn remove(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(registry) = self.registry.upgrade() {
            registry.write().remove(&self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn optimized() -> MonitorEvent {
        MonitorEvent::MemoryOptimized {
            timestamp: Utc::now(),
            freed_bytes: Some(4 * 1024 * 1024),
        }
    }

    fn failed() -> MonitorEvent {
        MonitorEvent::OptimizationError {
            timestamp: Utc::now(),
            action: "cache_clear".to_string(),
            error: "cache locked".to_string(),
        }
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let bus = EventBus::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let subscription = bus.subscribe(move |event| sink.lock().push(event.name()));
        bus.emit(optimized());
        assert_eq!(*seen.lock(), vec!["memoryOptimized"]);

        subscription.unsubscribe();
        assert_eq!(bus.listener_count(), 0);
        bus.emit(optimized());
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_filtered_subscription() {
        let bus = EventBus::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let _subscription = bus.subscribe_to(EventKind::OptimizationError, move |event| {
            sink.lock().push(event.kind())
        });
        bus.emit(optimized());
        bus.emit(failed());
        assert_eq!(*seen.lock(), vec![EventKind::OptimizationError]);
    }

    #[test]
    fn test_drop_unsubscribes_and_detach_keeps() {
        let bus = EventBus::default();
        {
            let _scoped = bus.subscribe(|_| {});
            assert_eq!(bus.listener_count(), 1);
        }
        assert_eq!(bus.listener_count(), 0);

        bus.subscribe(|_| {}).detach();
        assert_eq!(bus.listener_count(), 1);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let bus = EventBus::default();
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);

        let _bad = bus.subscribe(|_| panic!("listener bug"));
        let _good = bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(optimized());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_broadcast_receiver() {
        let bus = EventBus::default();
        let mut receiver = bus.receiver();
        bus.emit(failed());

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.kind(), EventKind::OptimizationError);
    }

    #[test]
    fn test_event_serializes_with_name_tag() {
        let json = serde_json::to_value(optimized()).unwrap();
        assert_eq!(json["event"], "memoryOptimized");
    }
}
