//! Error types for the scheduler crate.

use thiserror::Error;

/// Scheduler setup and lifecycle errors.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The OS refused to spawn the task thread.
    #[error("failed to spawn task `{task}`")]
    SpawnFailed {
        /// Task name from its spec.
        task: &'static str,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// A task exhausted its restart budget.
    #[error("task `{task}` exceeded its restart budget")]
    RestartBudgetExhausted {
        /// Task name from its spec.
        task: &'static str,
    },
}

/// A specialized `Result` for scheduler operations.
pub type SchedulerResult<T = ()> = Result<T, SchedulerError>;
