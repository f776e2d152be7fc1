//! Error types for event operations.

use thiserror::Error;

/// Event queue and taxonomy errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EventError {
    /// An event code outside the enumerated range was rejected.
    #[error("unknown event code {0:#06x}")]
    UnknownCode(u16),
}

/// A specialized `Result` for event operations.
pub type EventResult<T> = core::result::Result<T, EventError>;
