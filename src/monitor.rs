//! The health monitor
//!
//! Owns the sample store, both trend detectors and the threshold trigger, and
//! drives them from three periodic tasks:
//!
//! - **leak check**: samples process memory, runs the leak detector and the
//!   absolute-ceiling trigger
//! - **degradation check**: pulls request metrics and compares windows
//! - **maintenance**: runs the enabled housekeeping tasks
//!
//! Detector state sits behind one mutex that is never held across an await
//! or while calling out to collaborators. Task handles sit behind a separate
//! lifecycle lock so `update_config` and `stop` cannot interleave.

use crate::config::{ConfigUpdate, MonitorConfig};
use crate::error::{Error, Result};
use crate::monitoring::degradation::{DegradationCheck, PerformanceDegradationDetector};
use crate::monitoring::events::{
    EventBus, EventKind, MonitorEvent, RemediationCause, Subscription,
};
use crate::monitoring::leak::{LeakCheck, MemoryLeakDetector};
use crate::monitoring::metrics::MetricsProvider;
use crate::monitoring::snapshot::{PerformanceSnapshot, SnapshotStore};
use crate::monitoring::status::{
    recommendation_messages, DegradationStatus, DetectionTotals, LeakDetectionStatus,
    MaintenanceStatus, MonitorStatus, StatusInputs,
};
use crate::monitoring::system::{create_introspector, MemoryIntrospector};
use crate::monitoring::threshold::{AutoOptimizationTrigger, ResourceReadings, TriggerDecision};
use crate::optimization::cache_registry::CacheRegistry;
use crate::optimization::maintenance::{MaintenanceReport, MaintenanceRunner};
use crate::optimization::remediation::{
    GarbageCollector, NoopGarbageCollector, RemediationContext, RemediationExecutor,
    ResourceReclaimer,
};
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::task::{PeriodicTask, TaskHandle, TaskScheduler, TokioScheduler};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

pub const LEAK_CHECK_TASK: &str = "leak-check";
pub const DEGRADATION_CHECK_TASK: &str = "degradation-check";
pub const MAINTENANCE_TASK: &str = "maintenance";

struct DetectorState {
    store: SnapshotStore,
    leak: MemoryLeakDetector,
    degradation: PerformanceDegradationDetector,
    trigger: AutoOptimizationTrigger,
}

#[derive(Default)]
struct Totals {
    memory_leaks: AtomicU64,
    degradations: AtomicU64,
    threshold_optimizations: AtomicU64,
    collection_failures: AtomicU64,
}

impl Totals {
    fn snapshot(&self) -> DetectionTotals {
        DetectionTotals {
            memory_leaks: self.memory_leaks.load(Ordering::Relaxed),
            degradations: self.degradations.load(Ordering::Relaxed),
            threshold_optimizations: self.threshold_optimizations.load(Ordering::Relaxed),
            collection_failures: self.collection_failures.load(Ordering::Relaxed),
        }
    }
}

/// What one leak-check tick did
#[derive(Debug, Clone, PartialEq)]
pub struct LeakTick {
    /// `None` when the sample could not be taken or leak detection is off
    pub check: Option<LeakCheck>,
    /// `None` when auto-optimization is off
    pub trigger: Option<TriggerDecision>,
}

pub struct HealthMonitor {
    config: RwLock<MonitorConfig>,
    state: Mutex<DetectorState>,
    provider: Arc<dyn MetricsProvider>,
    memory: Arc<dyn MemoryIntrospector>,
    scheduler: Arc<dyn TaskScheduler>,
    events: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    executor: RemediationExecutor,
    maintenance: MaintenanceRunner,
    totals: Totals,
    tasks: Mutex<Vec<TaskHandle>>,
    running: AtomicBool,
}

impl HealthMonitor {
    pub fn builder(config: MonitorConfig) -> HealthMonitorBuilder {
        HealthMonitorBuilder::new(config)
    }

    /// Start the periodic checks. Calling it on a running monitor is a no-op.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let mut tasks = self.tasks.lock();
        if self.running.load(Ordering::SeqCst) {
            debug!("Health monitor already running");
            return Ok(());
        }

        let config = self.config.read().clone();
        self.spawn_tasks(&config, &mut tasks);
        self.running.store(true, Ordering::SeqCst);

        info!(
            tasks = tasks.len(),
            platform = self.memory.platform_name(),
            "Health monitor started"
        );
        Ok(())
    }

    /// Cancel the periodic checks. Deferred collection passes already
    /// dispatched still run. Safe to call repeatedly.
    pub fn stop(&self) {
        let mut tasks = self.tasks.lock();
        let cancelled = tasks.len();
        for handle in tasks.drain(..) {
            handle.cancel();
        }
        if self.running.swap(false, Ordering::SeqCst) {
            info!(cancelled, "Health monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> MonitorConfig {
        self.config.read().clone()
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&MonitorEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    pub fn subscribe_to<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&MonitorEvent) + Send + Sync + 'static,
    {
        self.events.subscribe_to(kind, listener)
    }

    /// Apply a partial configuration update.
    ///
    /// The merged configuration is validated first; an invalid update leaves
    /// the monitor untouched. Otherwise every periodic task is cancelled and,
    /// if the monitor was running, restarted with the new intervals.
    pub fn update_config(self: &Arc<Self>, update: ConfigUpdate) -> Result<()> {
        let mut tasks = self.tasks.lock();

        let current = self.config.read().clone();
        let next = current.merged(&update);
        next.validate()?;

        for handle in tasks.drain(..) {
            handle.cancel();
        }

        {
            let mut state = self.state.lock();
            state
                .store
                .set_performance_capacity(next.degradation.window_size * 2);
            state
                .store
                .set_memory_retention(next.collection.memory_retention);
            if next.degradation.window_size != current.degradation.window_size {
                state.degradation.reset();
            }
        }

        *self.config.write() = next.clone();

        if self.running.load(Ordering::SeqCst) {
            self.spawn_tasks(&next, &mut tasks);
        }

        info!(restarted = tasks.len(), "Configuration updated");
        Ok(())
    }

    fn spawn_tasks(self: &Arc<Self>, config: &MonitorConfig, tasks: &mut Vec<TaskHandle>) {
        if config.leak_detection.enabled || config.auto_optimization.enabled {
            let task = self.periodic(|monitor| {
                async move {
                    monitor.run_leak_check();
                }
                .boxed()
            });
            tasks.push(self.scheduler.spawn_periodic(
                LEAK_CHECK_TASK,
                config.leak_detection.check_interval,
                task,
            ));
        }

        // the ceilings read response time and error rate from these samples
        if config.degradation.enabled || config.auto_optimization.enabled {
            let task = self.periodic(|monitor| {
                async move {
                    monitor.run_degradation_check().await;
                }
                .boxed()
            });
            tasks.push(self.scheduler.spawn_periodic(
                DEGRADATION_CHECK_TASK,
                config.degradation.check_interval,
                task,
            ));
        }

        if config.maintenance.enabled {
            let task = self.periodic(|monitor| {
                async move {
                    monitor.run_maintenance();
                }
                .boxed()
            });
            tasks.push(self.scheduler.spawn_periodic(
                MAINTENANCE_TASK,
                config.maintenance.interval,
                task,
            ));
        }
    }

    /// Wrap a tick body so the task only holds a weak reference
    fn periodic<F>(self: &Arc<Self>, body: F) -> PeriodicTask
    where
        F: Fn(Arc<Self>) -> futures::future::BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let weak: Weak<Self> = Arc::downgrade(self);
        Arc::new(move || match weak.upgrade() {
            Some(monitor) => body(monitor),
            None => futures::future::ready(()).boxed(),
        })
    }

    /// One leak-check tick: sample memory, run the leak detector, then the
    /// absolute-ceiling trigger. A failed memory sample skips only the leak
    /// detector; the ceilings still see the latest stored readings.
    pub fn run_leak_check(&self) -> LeakTick {
        let config = self.config.read().clone();
        let now = self.clock.now();

        let reading = match self.memory.sample() {
            Ok(reading) => Some(reading),
            Err(e) => {
                self.totals.collection_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    error = %e,
                    category = ?e.category(),
                    "Memory sample failed, skipping leak check"
                );
                None
            }
        };

        let (check, trigger) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            let check = match reading {
                Some(reading) => {
                    state.store.push_memory(reading.at(now));
                    config
                        .leak_detection
                        .enabled
                        .then(|| state.leak.evaluate(&state.store, &config.leak_detection))
                }
                None => None,
            };

            let trigger = config.auto_optimization.enabled.then(|| {
                let readings = ResourceReadings::from_latest(
                    state.store.latest_memory(),
                    state.store.latest_performance(),
                );
                state.trigger.evaluate(&readings, &config.auto_optimization, now)
            });

            (check, trigger)
        };

        if let Some(LeakCheck::LeakConfirmed(report)) = &check {
            self.totals.memory_leaks.fetch_add(1, Ordering::Relaxed);
            warn!(
                heap_growth_mb_per_min = report.rates.heap_growth_rate_mb_per_min,
                rss_growth_mb_per_min = report.rates.rss_growth_rate_mb_per_min,
                consecutive = report.consecutive_checks,
                "Memory leak detected"
            );
            self.events.emit(MonitorEvent::MemoryLeak {
                timestamp: now,
                report: report.clone(),
            });
            self.executor.optimize_memory_usage();
        }

        match &trigger {
            Some(TriggerDecision::Optimize {
                breaches,
                aggressive,
            }) => {
                self.totals
                    .threshold_optimizations
                    .fetch_add(1, Ordering::Relaxed);
                info!(breaches = ?breaches, aggressive, "Resource ceiling breached");
                self.executor.optimize_performance(
                    *aggressive,
                    RemediationCause::ThresholdBreach(breaches.clone()),
                );
            }
            Some(TriggerDecision::CoolingDown {
                breaches,
                remaining,
            }) => {
                debug!(
                    breaches = ?breaches,
                    remaining_secs = remaining.num_seconds(),
                    "Ceiling breached during cooldown"
                );
            }
            _ => {}
        }

        LeakTick { check, trigger }
    }

    /// One degradation-check tick. Returns `None` when the metrics could not
    /// be collected; the counters are left untouched in that case.
    pub async fn run_degradation_check(&self) -> Option<DegradationCheck> {
        let config = self.config.read().clone();

        let metrics = match tokio::time::timeout(
            config.collection.provider_timeout,
            self.provider.current_metrics(),
        )
        .await
        {
            Ok(Ok(metrics)) => metrics,
            Ok(Err(e)) => {
                self.collection_failed(&e);
                return None;
            }
            Err(_) => {
                self.collection_failed(&Error::Timeout(format!(
                    "Metrics provider did not answer within {:?}",
                    config.collection.provider_timeout
                )));
                return None;
            }
        };

        let now = self.clock.now();
        let check = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            state.store.push_performance(PerformanceSnapshot {
                timestamp: now,
                avg_response_time_ms: metrics.avg_response_time_ms,
                requests_per_second: metrics.requests_per_second,
                error_rate_pct: metrics.error_rate_pct,
                memory_usage_mb: metrics.memory_usage_mb,
            });

            if !config.degradation.enabled {
                return None;
            }
            state.degradation.evaluate(&state.store, &config.degradation)
        };

        if let DegradationCheck::Confirmed(report) = &check {
            self.totals.degradations.fetch_add(1, Ordering::Relaxed);
            warn!(
                response_time_increase_pct = report.comparison.response_time_increase_pct,
                throughput_decrease_pct = report.comparison.throughput_decrease_pct,
                severity = ?report.severity,
                "Performance degradation detected"
            );
            self.events.emit(MonitorEvent::PerformanceDegradation {
                timestamp: now,
                report: report.clone(),
            });
            self.executor.optimize_performance(
                report.severity.is_aggressive(),
                RemediationCause::PerformanceDegradation,
            );
        }

        Some(check)
    }

    /// One maintenance pass over the enabled tasks
    pub fn run_maintenance(&self) -> MaintenanceReport {
        let tasks = self.config.read().maintenance.tasks.clone();
        self.maintenance
            .run_pass(&tasks, |now| self.state.lock().store.prune_stale(now))
    }

    /// Current detector state and recommendations; has no side effects
    pub fn get_status(&self) -> MonitorStatus {
        let config = self.config.read().clone();

        let (readings, leak_detection, degradation, last_optimization_time) = {
            let state = self.state.lock();
            (
                ResourceReadings::from_latest(
                    state.store.latest_memory(),
                    state.store.latest_performance(),
                ),
                LeakDetectionStatus {
                    enabled: config.leak_detection.enabled,
                    consecutive_increases: state.leak.consecutive_increases(),
                    snapshots: state.store.memory_len(),
                },
                DegradationStatus {
                    enabled: config.degradation.enabled,
                    consecutive_decreases: state.degradation.consecutive_decreases(),
                    snapshots: state.store.performance_len(),
                },
                state.trigger.last_optimization_time(),
            )
        };

        let recommendations = recommendation_messages(&StatusInputs {
            readings: &readings,
            consecutive_increases: leak_detection.consecutive_increases,
            consecutive_decreases: degradation.consecutive_decreases,
            limits: &config.reporting,
        });

        MonitorStatus {
            generated_at: self.clock.now(),
            running: self.is_running(),
            leak_detection,
            degradation,
            maintenance: MaintenanceStatus {
                enabled: config.maintenance.enabled,
                passes: self.maintenance.passes(),
                task_failures: self.maintenance.task_failures(),
            },
            readings,
            detections: self.totals.snapshot(),
            remediation: self.executor.stats(),
            last_optimization_time,
            recommendations,
        }
    }

    fn collection_failed(&self, error: &Error) {
        self.totals.collection_failures.fetch_add(1, Ordering::Relaxed);
        warn!(
            error = %error,
            category = ?error.category(),
            "Metrics collection failed, skipping tick"
        );
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        for handle in self.tasks.get_mut().drain(..) {
            handle.cancel();
        }
    }
}

/// Assembles a [`HealthMonitor`] from its collaborators
pub struct HealthMonitorBuilder {
    config: MonitorConfig,
    provider: Option<Arc<dyn MetricsProvider>>,
    memory: Option<Arc<dyn MemoryIntrospector>>,
    reclaimer: Option<Arc<dyn ResourceReclaimer>>,
    collector: Option<Arc<dyn GarbageCollector>>,
    scheduler: Option<Arc<dyn TaskScheduler>>,
    events: Option<Arc<EventBus>>,
    clock: Option<Arc<dyn Clock>>,
}

impl HealthMonitorBuilder {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            provider: None,
            memory: None,
            reclaimer: None,
            collector: None,
            scheduler: None,
            events: None,
            clock: None,
        }
    }

    /// Required: where request metrics come from
    pub fn metrics_provider(mut self, provider: Arc<dyn MetricsProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Defaults to the platform introspector
    pub fn memory_introspector(mut self, memory: Arc<dyn MemoryIntrospector>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Defaults to an empty [`CacheRegistry`]
    pub fn reclaimer(mut self, reclaimer: Arc<dyn ResourceReclaimer>) -> Self {
        self.reclaimer = Some(reclaimer);
        self
    }

    /// Defaults to [`NoopGarbageCollector`]
    pub fn garbage_collector(mut self, collector: Arc<dyn GarbageCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Defaults to the current tokio runtime
    pub fn scheduler(mut self, scheduler: Arc<dyn TaskScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<Arc<HealthMonitor>> {
        self.config.validate()?;

        let provider = self
            .provider
            .ok_or_else(|| Error::Config("A metrics provider is required".to_string()))?;
        let scheduler: Arc<dyn TaskScheduler> = match self.scheduler {
            Some(scheduler) => scheduler,
            None => Arc::new(TokioScheduler::current()?),
        };
        let memory: Arc<dyn MemoryIntrospector> =
            self.memory.unwrap_or_else(|| Arc::from(create_introspector()));
        let reclaimer = self
            .reclaimer
            .unwrap_or_else(|| Arc::new(CacheRegistry::new()));
        let collector = self
            .collector
            .unwrap_or_else(|| Arc::new(NoopGarbageCollector));
        let events = self.events.unwrap_or_default();
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let executor = RemediationExecutor::new(RemediationContext {
            reclaimer: Arc::clone(&reclaimer),
            collector: Arc::clone(&collector),
            memory: Arc::clone(&memory),
            scheduler: Arc::clone(&scheduler),
            events: Arc::clone(&events),
            clock: Arc::clone(&clock),
        });
        let maintenance = MaintenanceRunner::new(
            reclaimer,
            collector,
            Arc::clone(&events),
            Arc::clone(&clock),
        );

        let store = SnapshotStore::new(
            self.config.collection.memory_retention,
            self.config.degradation.window_size * 2,
        );

        Ok(Arc::new(HealthMonitor {
            config: RwLock::new(self.config),
            state: Mutex::new(DetectorState {
                store,
                leak: MemoryLeakDetector::new(),
                degradation: PerformanceDegradationDetector::new(),
                trigger: AutoOptimizationTrigger::new(),
            }),
            provider,
            memory,
            scheduler,
            events,
            clock,
            executor,
            maintenance,
            totals: Totals::default(),
            tasks: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        }))
    }
}
