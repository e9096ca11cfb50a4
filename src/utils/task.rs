//! Task scheduling with panic handling
//!
//! The monitor never talks to the runtime directly. It asks a [`TaskScheduler`]
//! for periodic and delayed tasks and keeps the returned [`TaskHandle`]s so it
//! can cancel them on reconfiguration or shutdown.

use crate::error::{panic_message, Error, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error};

/// Body of a periodic task, invoked once per tick
pub type PeriodicTask = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Runtime-agnostic source of periodic and delayed tasks
pub trait TaskScheduler: Send + Sync {
    /// Run `task` every `period`, first after one full period has elapsed
    fn spawn_periodic(&self, name: &str, period: Duration, task: PeriodicTask) -> TaskHandle;

    /// Run `task` once after `delay`
    fn spawn_delayed(&self, name: &str, delay: Duration, task: BoxFuture<'static, ()>)
        -> TaskHandle;
}

/// Handle to a scheduled task. Dropping it does not cancel the task.
#[derive(Debug)]
pub struct TaskHandle {
    name: String,
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cancel the task; a tick already running is interrupted at its next await
    pub fn cancel(&self) {
        debug!(task = %self.name, "Cancelling task");
        self.join.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// [`TaskScheduler`] backed by a tokio runtime
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Use the runtime the caller is running on
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| Error::Platform(format!("No tokio runtime available: {}", e)))?;
        Ok(Self { handle })
    }

    pub fn with_handle(handle: Handle) -> Self {
        Self { handle }
    }
}

impl TaskScheduler for TokioScheduler {
    fn spawn_periodic(&self, name: &str, period: Duration, task: PeriodicTask) -> TaskHandle {
        let task_name = name.to_string();

        let join = self.handle.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                if let Err(panic) = AssertUnwindSafe(task()).catch_unwind().await {
                    error!(
                        task = %task_name,
                        "Periodic task panicked: {}",
                        panic_message(panic.as_ref())
                    );
                }
            }
        });

        debug!(task = %name, period_ms = period.as_millis() as u64, "Started periodic task");
        TaskHandle {
            name: name.to_string(),
            join,
        }
    }

    fn spawn_delayed(
        &self,
        name: &str,
        delay: Duration,
        task: BoxFuture<'static, ()>,
    ) -> TaskHandle {
        let task_name = name.to_string();

        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;

            if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                error!(
                    task = %task_name,
                    "Delayed task panicked: {}",
                    panic_message(panic.as_ref())
                );
            }
        });

        TaskHandle {
            name: name.to_string(),
            join,
        }
    }
}
