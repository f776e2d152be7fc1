//! Fixed-priority periodic task scheduling for the ASI worker.
//!
//! Eight cooperating tasks run at declared periods under fixed real-time
//! priorities. Each task owns one [`PeriodicTimer`] driven by absolute
//! monotonic deadlines; the wait is chunked so the global shutdown flag is
//! observed at least every 100 ms. A task body that runs longer than
//! 1.2 × its period is reported as an overrun. Task panics are caught by
//! the per-task supervision wrapper, which respawns the task from its
//! factory; a task that terminates abnormally more than
//! [`RESTART_LIMIT`] times within [`RESTART_WINDOW`] takes the whole
//! worker down so the parent process can restart it.
//!
//! # RT-Safety
//!
//! - `wait_for_tick` is O(1) and allocation-free in the steady state
//! - Task spawning and RT setup happen during initialization only
//! - Shutdown is cooperative and bounded by the 100 ms wait chunk

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod error;
pub mod rt_setup;
pub mod runner;
pub mod supervisor;
pub mod task;
pub mod timer;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(not(target_os = "linux"))]
mod fallback;

pub use error::{SchedulerError, SchedulerResult};
pub use rt_setup::RtSetup;
pub use runner::{TaskExit, TaskSet, WorkerVerdict};
pub use supervisor::{LogObserver, RestartWindow, SchedulerObserver};
pub use task::{PeriodicTask, TaskSpec};
pub use timer::{PeriodicTimer, TimerMetrics, Wake};

use std::time::Duration;

/// Longest interval between shutdown-flag checks while waiting for a tick.
pub const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Abnormal terminations tolerated per task within [`RESTART_WINDOW`].
pub const RESTART_LIMIT: u32 = 5;

/// Sliding window over which [`RESTART_LIMIT`] applies.
pub const RESTART_WINDOW: Duration = Duration::from_secs(5);

/// Overrun budget for a task body: 1.2 × its period.
pub fn overrun_budget(period: Duration) -> Duration {
    period * 6 / 5
}
