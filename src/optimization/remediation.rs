//! Tiered self-remediation
//!
//! Standard remediation purges caches, requests a collection pass and cleans
//! up idle connections. Aggressive remediation additionally schedules two
//! deferred collection passes for heaps a single pass does not fully reclaim.
//! Every action is best-effort: failures are logged and published as
//! `OptimizationError` events, never returned to the caller.

use crate::error::{panic_message, Error, Result};
use crate::monitoring::events::{EventBus, MonitorEvent, RemediationCause};
use crate::monitoring::system::MemoryIntrospector;
use crate::utils::clock::Clock;
use crate::utils::task::TaskScheduler;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Freed memory below this is not worth a log line
const MIN_REPORTED_FREED_BYTES: u64 = 1024 * 1024;

/// Delays of the extra collection passes in aggressive mode
pub const DEFERRED_GC_DELAYS: [Duration; 2] = [Duration::from_secs(1), Duration::from_secs(2)];

/// Host-side resources the monitor may purge
pub trait ResourceReclaimer: Send + Sync {
    fn clear_caches(&self) -> Result<()>;

    fn cleanup_connections(&self) -> Result<()>;

    fn rotate_logs(&self) -> Result<()> {
        Ok(())
    }
}

/// Optional manual collection capability
pub trait GarbageCollector: Send + Sync {
    fn collect(&self) -> Result<()>;

    /// Whether collection requests do anything on this host
    fn is_available(&self) -> bool {
        true
    }
}

/// Default for hosts without manual collection
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopGarbageCollector;

impl GarbageCollector for NoopGarbageCollector {
    fn collect(&self) -> Result<()> {
        Ok(())
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Counters of remediation activity since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationStats {
    pub memory_optimizations: u64,
    pub performance_optimizations: u64,
    pub gc_requests: u64,
    pub deferred_gc_scheduled: u64,
    pub failures: u64,
}

#[derive(Debug, Default)]
struct AtomicStats {
    memory_optimizations: AtomicU64,
    performance_optimizations: AtomicU64,
    gc_requests: AtomicU64,
    deferred_gc_scheduled: AtomicU64,
    failures: AtomicU64,
}

/// Collaborators the executor acts through
#[derive(Clone)]
pub struct RemediationContext {
    pub reclaimer: Arc<dyn ResourceReclaimer>,
    pub collector: Arc<dyn GarbageCollector>,
    pub memory: Arc<dyn MemoryIntrospector>,
    pub scheduler: Arc<dyn TaskScheduler>,
    pub events: Arc<EventBus>,
    pub clock: Arc<dyn Clock>,
}

pub struct RemediationExecutor {
    ctx: RemediationContext,
    stats: Arc<AtomicStats>,
}

impl RemediationExecutor {
    pub fn new(ctx: RemediationContext) -> Self {
        Self {
            ctx,
            stats: Arc::new(AtomicStats::default()),
        }
    }

    pub fn stats(&self) -> RemediationStats {
        RemediationStats {
            memory_optimizations: self.stats.memory_optimizations.load(Ordering::Relaxed),
            performance_optimizations: self.stats.performance_optimizations.load(Ordering::Relaxed),
            gc_requests: self.stats.gc_requests.load(Ordering::Relaxed),
            deferred_gc_scheduled: self.stats.deferred_gc_scheduled.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
        }
    }

    /// Purge caches, then request a collection pass. Returns false if a step failed.
    pub fn optimize_memory_usage(&self) -> bool {
        let before = self.ctx.memory.sample().ok();

        if let Err(e) = guarded(|| self.ctx.reclaimer.clear_caches()) {
            self.report_failure("cache_clear", &e);
            return false;
        }

        if let Err(e) = self.request_gc() {
            self.report_failure("garbage_collection", &e);
            return false;
        }

        let after = self.ctx.memory.sample().ok();
        let freed_bytes = match (before, after) {
            (Some(before), Some(after)) => Some(before.heap_used.saturating_sub(after.heap_used)),
            _ => None,
        };

        match freed_bytes {
            Some(freed) if freed >= MIN_REPORTED_FREED_BYTES => {
                info!(freed_mb = freed / (1024 * 1024), "Memory optimization freed heap");
            }
            _ => debug!("Memory optimization completed"),
        }

        self.stats.memory_optimizations.fetch_add(1, Ordering::Relaxed);
        self.ctx.events.emit(MonitorEvent::MemoryOptimized {
            timestamp: self.ctx.clock.now(),
            freed_bytes,
        });
        true
    }

    /// Memory optimization, deferred collection passes when aggressive, and
    /// connection cleanup. Returns false if a step failed.
    pub fn optimize_performance(&self, aggressive: bool, cause: RemediationCause) -> bool {
        info!(aggressive, cause = ?cause, "Running performance optimization");

        let memory_ok = self.optimize_memory_usage();

        if aggressive {
            self.schedule_deferred_gc();
        }

        if let Err(e) = guarded(|| self.ctx.reclaimer.cleanup_connections()) {
            self.report_failure("connection_cleanup", &e);
            return false;
        }

        self.stats.performance_optimizations.fetch_add(1, Ordering::Relaxed);
        self.ctx.events.emit(MonitorEvent::PerformanceOptimized {
            timestamp: self.ctx.clock.now(),
            aggressive,
            cause,
        });
        memory_ok
    }

    fn request_gc(&self) -> Result<()> {
        if !self.ctx.collector.is_available() {
            return Ok(());
        }
        self.stats.gc_requests.fetch_add(1, Ordering::Relaxed);
        guarded(|| self.ctx.collector.collect())
    }

    fn schedule_deferred_gc(&self) {
        if !self.ctx.collector.is_available() {
            debug!("No garbage collector available, skipping deferred passes");
            return;
        }

        for delay in DEFERRED_GC_DELAYS {
            let collector = Arc::clone(&self.ctx.collector);
            let events = Arc::clone(&self.ctx.events);
            let clock = Arc::clone(&self.ctx.clock);
            let stats = Arc::clone(&self.stats);

            let pass = async move {
                stats.gc_requests.fetch_add(1, Ordering::Relaxed);
                if let Err(e) = guarded(|| collector.collect()) {
                    stats.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "Deferred garbage collection failed");
                    events.emit(MonitorEvent::OptimizationError {
                        timestamp: clock.now(),
                        action: "deferred_garbage_collection".to_string(),
                        error: e.to_string(),
                    });
                }
            };

            // Not tracked: stop() leaves dispatched passes to finish
            let _ = self
                .ctx
                .scheduler
                .spawn_delayed("deferred-gc", delay, pass.boxed());
            self.stats.deferred_gc_scheduled.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn report_failure(&self, action: &str, error: &Error) {
        self.stats.failures.fetch_add(1, Ordering::Relaxed);
        warn!(action, error = %error, "Remediation step failed");
        self.ctx.events.emit(MonitorEvent::OptimizationError {
            timestamp: self.ctx.clock.now(),
            action: action.to_string(),
            error: error.to_string(),
        });
    }
}

/// Run a collaborator call, turning a panic into an error
pub(crate) fn guarded<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|panic| Err(Error::TaskPanicked(panic_message(panic.as_ref()))))
}
