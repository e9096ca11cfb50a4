//! Runtime plumbing shared by the monitor

pub mod clock;
pub mod task;

pub use clock::{Clock, ManualClock, SystemClock};
pub use task::{PeriodicTask, TaskHandle, TaskScheduler, TokioScheduler};
