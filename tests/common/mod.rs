//! Fakes and a harness for driving a monitor deterministically

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use perfwatch::{
    Error, EventBus, GarbageCollector, HealthMonitor, ManualClock, MemoryIntrospector,
    MemoryReading, MetricsProvider, MonitorConfig, MonitorEvent, RequestMetrics,
    ResourceReclaimer, Result, Subscription, TokioScheduler,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const MB: u64 = 1024 * 1024;

/// Reports a scripted heap size per sample, repeating the last one
pub struct ScriptedMemory {
    heap_mb: Mutex<VecDeque<u64>>,
    last: Mutex<u64>,
    heap_total_mb: u64,
    failing: AtomicBool,
}

impl ScriptedMemory {
    pub fn new(heap_total_mb: u64) -> Self {
        Self {
            heap_mb: Mutex::new(VecDeque::new()),
            last: Mutex::new(64),
            heap_total_mb,
            failing: AtomicBool::new(false),
        }
    }

    pub fn push(&self, heap_mb: u64) {
        self.heap_mb.lock().push_back(heap_mb);
    }

    /// Make every sample fail, as on a platform without introspection
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl MemoryIntrospector for ScriptedMemory {
    fn sample(&self) -> Result<MemoryReading> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Platform("memory introspection unavailable".to_string()));
        }
        let mut last = self.last.lock();
        if let Some(next) = self.heap_mb.lock().pop_front() {
            *last = next;
        }
        Ok(MemoryReading {
            heap_used: *last * MB,
            heap_total: self.heap_total_mb * MB,
            rss: *last * MB,
            external: 0,
        })
    }

    fn platform_name(&self) -> &str {
        "scripted"
    }
}

#[derive(Clone, Copy)]
pub enum MetricsBehaviour {
    Answer,
    Fail,
    Hang,
}

/// Serves queued request metrics, repeating the last one
pub struct ScriptedMetrics {
    queue: Mutex<VecDeque<RequestMetrics>>,
    last: Mutex<RequestMetrics>,
    behaviour: Mutex<MetricsBehaviour>,
    pub calls: AtomicUsize,
}

impl ScriptedMetrics {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            last: Mutex::new(metrics(100.0, 50.0, 0.1)),
            behaviour: Mutex::new(MetricsBehaviour::Answer),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, metrics: RequestMetrics) {
        self.queue.lock().push_back(metrics);
    }

    pub fn push_many(&self, count: usize, metrics: RequestMetrics) {
        for _ in 0..count {
            self.push(metrics);
        }
    }

    pub fn set_behaviour(&self, behaviour: MetricsBehaviour) {
        *self.behaviour.lock() = behaviour;
    }
}

#[async_trait]
impl MetricsProvider for ScriptedMetrics {
    async fn current_metrics(&self) -> Result<RequestMetrics> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behaviour = *self.behaviour.lock();
        match behaviour {
            MetricsBehaviour::Fail => Err(Error::Collection("metrics endpoint down".to_string())),
            MetricsBehaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::Collection("unreachable".to_string()))
            }
            MetricsBehaviour::Answer => {
                let mut last = self.last.lock();
                if let Some(next) = self.queue.lock().pop_front() {
                    *last = next;
                }
                Ok(*last)
            }
        }
    }
}

pub fn metrics(
    avg_response_time_ms: f64,
    requests_per_second: f64,
    error_rate_pct: f64,
) -> RequestMetrics {
    RequestMetrics {
        avg_response_time_ms,
        requests_per_second,
        error_rate_pct,
        memory_usage_mb: 0.0,
    }
}

#[derive(Default)]
pub struct CountingGc {
    pub calls: AtomicUsize,
}

impl CountingGc {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GarbageCollector for CountingGc {
    fn collect(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct CountingReclaimer {
    pub cache_clears: AtomicUsize,
    pub connection_cleanups: AtomicUsize,
}

impl ResourceReclaimer for CountingReclaimer {
    fn clear_caches(&self) -> Result<()> {
        self.cache_clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn cleanup_connections(&self) -> Result<()> {
        self.connection_cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Records every event published on a bus
pub struct EventLog {
    events: Arc<Mutex<Vec<MonitorEvent>>>,
    _subscription: Subscription,
}

impl EventLog {
    pub fn attach(bus: &EventBus) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let subscription = bus.subscribe(move |event| sink.lock().push(event.clone()));
        Self {
            events,
            _subscription: subscription,
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|e| e.name()).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name() == name).count()
    }

    pub fn all(&self) -> Vec<MonitorEvent> {
        self.events.lock().clone()
    }
}

/// A monitor wired to fakes and a manual clock
pub struct Harness {
    pub monitor: Arc<HealthMonitor>,
    pub memory: Arc<ScriptedMemory>,
    pub metrics: Arc<ScriptedMetrics>,
    pub gc: Arc<CountingGc>,
    pub reclaimer: Arc<CountingReclaimer>,
    pub clock: Arc<ManualClock>,
    pub events: EventLog,
}

impl Harness {
    /// Must be called from inside a tokio runtime
    pub fn new(config: MonitorConfig) -> Self {
        let memory = Arc::new(ScriptedMemory::new(1024));
        let metrics = Arc::new(ScriptedMetrics::new());
        let gc = Arc::new(CountingGc::default());
        let reclaimer = Arc::new(CountingReclaimer::default());
        let clock = Arc::new(ManualClock::default());

        let monitor = HealthMonitor::builder(config)
            .metrics_provider(metrics.clone())
            .memory_introspector(memory.clone())
            .garbage_collector(gc.clone())
            .reclaimer(reclaimer.clone())
            .scheduler(Arc::new(TokioScheduler::current().unwrap()))
            .clock(clock.clone())
            .build()
            .unwrap();
        let events = EventLog::attach(&monitor.events());

        Self {
            monitor,
            memory,
            metrics,
            gc,
            reclaimer,
            clock,
            events,
        }
    }

    /// Advance the manual clock by a minute and run one leak check
    pub fn leak_tick_after_minute(&self) -> perfwatch::LeakTick {
        self.clock.advance_secs(60);
        self.monitor.run_leak_check()
    }
}
