//! Periodic maintenance passes
//!
//! A pass runs every enabled task in a fixed order. Tasks are isolated from
//! each other: a failing or panicking task is reported as a
//! `MaintenanceError` event and the remaining tasks still run.

use crate::config::MaintenanceTasks;
use crate::error::Result;
use crate::monitoring::events::{EventBus, MonitorEvent};
use crate::optimization::remediation::{guarded, GarbageCollector, ResourceReclaimer};
use crate::utils::clock::Clock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceTaskKind {
    GarbageCollection,
    CacheCleanup,
    ConnectionCleanup,
    MetricPruning,
    LogRotation,
}

impl MaintenanceTaskKind {
    /// Execution order within a pass
    pub const ALL: [MaintenanceTaskKind; 5] = [
        Self::GarbageCollection,
        Self::CacheCleanup,
        Self::MetricPruning,
        Self::ConnectionCleanup,
        Self::LogRotation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::GarbageCollection => "garbage_collection",
            Self::CacheCleanup => "cache_cleanup",
            Self::ConnectionCleanup => "connection_cleanup",
            Self::MetricPruning => "metric_pruning",
            Self::LogRotation => "log_rotation",
        }
    }

    pub fn is_enabled(&self, tasks: &MaintenanceTasks) -> bool {
        match self {
            Self::GarbageCollection => tasks.garbage_collection,
            Self::CacheCleanup => tasks.cache_cleanup,
            Self::ConnectionCleanup => tasks.connection_cleanup,
            Self::MetricPruning => tasks.metric_pruning,
            Self::LogRotation => tasks.log_rotation,
        }
    }
}

impl fmt::Display for MaintenanceTaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one maintenance pass
#[derive(Debug, Clone, PartialEq)]
pub struct MaintenanceReport {
    pub started_at: DateTime<Utc>,
    pub completed: Vec<MaintenanceTaskKind>,
    pub failed: Vec<(MaintenanceTaskKind, String)>,
    pub pruned_snapshots: usize,
    pub duration_ms: u64,
}

impl MaintenanceReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct MaintenanceRunner {
    reclaimer: Arc<dyn ResourceReclaimer>,
    collector: Arc<dyn GarbageCollector>,
    events: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    passes: AtomicU64,
    task_failures: AtomicU64,
}

impl MaintenanceRunner {
    pub fn new(
        reclaimer: Arc<dyn ResourceReclaimer>,
        collector: Arc<dyn GarbageCollector>,
        events: Arc<EventBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reclaimer,
            collector,
            events,
            clock,
            passes: AtomicU64::new(0),
            task_failures: AtomicU64::new(0),
        }
    }

    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    pub fn task_failures(&self) -> u64 {
        self.task_failures.load(Ordering::Relaxed)
    }

    /// Run one pass. `prune_metrics` drops samples older than the retention
    /// window as of the given instant and returns how many were removed.
    pub fn run_pass<F>(&self, tasks: &MaintenanceTasks, prune_metrics: F) -> MaintenanceReport
    where
        F: FnOnce(DateTime<Utc>) -> usize,
    {
        let started = Instant::now();
        let started_at = self.clock.now();
        let mut prune_metrics = Some(prune_metrics);
        let mut report = MaintenanceReport {
            started_at,
            completed: Vec::new(),
            failed: Vec::new(),
            pruned_snapshots: 0,
            duration_ms: 0,
        };

        for kind in MaintenanceTaskKind::ALL {
            if !kind.is_enabled(tasks) {
                continue;
            }

            let outcome = match kind {
                MaintenanceTaskKind::GarbageCollection => self.force_gc(),
                MaintenanceTaskKind::CacheCleanup => guarded(|| self.reclaimer.clear_caches()),
                MaintenanceTaskKind::ConnectionCleanup => {
                    guarded(|| self.reclaimer.cleanup_connections())
                }
                MaintenanceTaskKind::LogRotation => guarded(|| self.reclaimer.rotate_logs()),
                MaintenanceTaskKind::MetricPruning => match prune_metrics.take() {
                    Some(prune) => guarded(|| Ok(prune(started_at))).map(|pruned| {
                        report.pruned_snapshots = pruned;
                    }),
                    None => Ok(()),
                },
            };

            match outcome {
                Ok(()) => {
                    debug!(task = kind.name(), "Maintenance task completed");
                    report.completed.push(kind);
                }
                Err(e) => {
                    warn!(task = kind.name(), error = %e, "Maintenance task failed");
                    self.task_failures.fetch_add(1, Ordering::Relaxed);
                    self.events.emit(MonitorEvent::MaintenanceError {
                        timestamp: self.clock.now(),
                        task: kind,
                        error: e.to_string(),
                    });
                    report.failed.push((kind, e.to_string()));
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        self.passes.fetch_add(1, Ordering::Relaxed);

        if report.is_success() {
            info!(
                tasks = report.completed.len(),
                pruned = report.pruned_snapshots,
                duration_ms = report.duration_ms,
                "Maintenance pass completed"
            );
            self.events.emit(MonitorEvent::MaintenanceCompleted {
                timestamp: self.clock.now(),
                tasks: report.completed.clone(),
                pruned_snapshots: report.pruned_snapshots,
                duration_ms: report.duration_ms,
            });
        } else {
            warn!(failed = report.failed.len(), "Maintenance pass finished with failures");
        }

        report
    }

    fn force_gc(&self) -> Result<()> {
        if !self.collector.is_available() {
            debug!("Garbage collection unavailable, skipping");
            return Ok(());
        }
        guarded(|| self.collector.collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::monitoring::events::EventKind;
    use crate::optimization::remediation::NoopGarbageCollector;
    use crate::utils::clock::ManualClock;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct RecordingReclaimer {
        calls: Mutex<Vec<&'static str>>,
        panic_on_caches: bool,
    }

    impl ResourceReclaimer for RecordingReclaimer {
        fn clear_caches(&self) -> Result<()> {
            self.calls.lock().push("caches");
            if self.panic_on_caches {
                panic!("cache shard unavailable");
            }
            Ok(())
        }

        fn cleanup_connections(&self) -> Result<()> {
            self.calls.lock().push("connections");
            Ok(())
        }

        fn rotate_logs(&self) -> Result<()> {
            self.calls.lock().push("logs");
            Err(Error::Remediation("log directory missing".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingGc {
        calls: AtomicUsize,
    }

    impl GarbageCollector for CountingGc {
        fn collect(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn runner(
        reclaimer: Arc<RecordingReclaimer>,
        collector: Arc<dyn GarbageCollector>,
    ) -> (MaintenanceRunner, Arc<EventBus>) {
        let events = Arc::new(EventBus::default());
        let runner = MaintenanceRunner::new(
            reclaimer,
            collector,
            Arc::clone(&events),
            Arc::new(ManualClock::default()),
        );
        (runner, events)
    }

    fn collect_events(
        events: &EventBus,
    ) -> (Arc<Mutex<Vec<MonitorEvent>>>, crate::monitoring::events::Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, events.subscribe(move |event| sink.lock().push(event.clone())))
    }

    #[test]
    fn test_default_tasks_complete() {
        let reclaimer = Arc::new(RecordingReclaimer::default());
        let gc = Arc::new(CountingGc::default());
        let (runner, events) = runner(Arc::clone(&reclaimer), gc.clone());
        let (seen, _sub) = collect_events(&events);

        let report = runner.run_pass(&MaintenanceTasks::default(), |_| 7);

        assert!(report.is_success());
        assert_eq!(report.pruned_snapshots, 7);
        assert_eq!(
            report.completed,
            vec![
                MaintenanceTaskKind::GarbageCollection,
                MaintenanceTaskKind::CacheCleanup,
                MaintenanceTaskKind::MetricPruning,
                MaintenanceTaskKind::ConnectionCleanup,
            ]
        );
        // log rotation is off by default
        assert_eq!(*reclaimer.calls.lock(), vec!["caches", "connections"]);
        assert_eq!(gc.calls.load(Ordering::SeqCst), 1);

        let kinds: Vec<EventKind> = seen.lock().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec![EventKind::MaintenanceCompleted]);
        assert_eq!(runner.passes(), 1);
    }

    #[test]
    fn test_failed_task_is_isolated() {
        let reclaimer = Arc::new(RecordingReclaimer {
            panic_on_caches: true,
            ..Default::default()
        });
        let (runner, events) = runner(Arc::clone(&reclaimer), Arc::new(NoopGarbageCollector));
        let (seen, _sub) = collect_events(&events);
        let tasks = MaintenanceTasks {
            log_rotation: true,
            ..Default::default()
        };

        let report = runner.run_pass(&tasks, |_| 0);

        assert!(!report.is_success());
        assert_eq!(
            *reclaimer.calls.lock(),
            vec!["caches", "connections", "logs"]
        );
        let failed: Vec<MaintenanceTaskKind> = report.failed.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            failed,
            vec![MaintenanceTaskKind::CacheCleanup, MaintenanceTaskKind::LogRotation]
        );

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|e| e.kind() == EventKind::MaintenanceError));
        match &seen[0] {
            MonitorEvent::MaintenanceError { task, error, .. } => {
                assert_eq!(*task, MaintenanceTaskKind::CacheCleanup);
                assert!(error.contains("cache shard unavailable"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(runner.task_failures(), 2);
    }

    #[test]
    fn test_disabled_tasks_are_skipped() {
        let reclaimer = Arc::new(RecordingReclaimer::default());
        let (runner, _events) = runner(Arc::clone(&reclaimer), Arc::new(NoopGarbageCollector));
        let tasks = MaintenanceTasks {
            garbage_collection: false,
            cache_cleanup: false,
            connection_cleanup: false,
            metric_pruning: false,
            log_rotation: false,
        };

        let mut pruned = false;
        let report = runner.run_pass(&tasks, |_| {
            pruned = true;
            0
        });

        assert!(report.completed.is_empty());
        assert!(!pruned);
        assert!(reclaimer.calls.lock().is_empty());
    }

    #[test]
    fn test_task_kind_serializes_snake_case() {
        let json = serde_json::to_string(&MaintenanceTaskKind::MetricPruning).unwrap();
        assert_eq!(json, "\"metric_pruning\"");
        assert_eq!(MaintenanceTaskKind::LogRotation.to_string(), "log_rotation");
    }
}
