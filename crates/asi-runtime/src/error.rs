//! Error types for runtime initialization.

use thiserror::Error;

/// Worker runtime errors.
///
/// These surface only during initialization and shutdown; in steady
/// state, anomalies become events instead of errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Storage could not be established.
    #[error("storage initialization failed")]
    Storage(#[from] asi_state::StateError),
    /// A task thread could not be spawned.
    #[error("scheduler initialization failed")]
    Scheduler(#[from] asi_scheduler::SchedulerError),
    /// The event log could not be opened.
    #[error("event log initialization failed")]
    EventLog(#[source] std::io::Error),
}

/// A specialized `Result` for runtime operations.
pub type RuntimeResult<T = ()> = Result<T, RuntimeError>;
