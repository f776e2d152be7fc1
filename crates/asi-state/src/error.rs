//! Error types for state containers and persistence.

use thiserror::Error;

/// State container and storage errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// A bounded queue rejected a push.
    #[error("queue full (capacity {capacity})")]
    QueueFull {
        /// Queue capacity.
        capacity: usize,
    },
    /// The cycle tracker rejected a new instance.
    #[error("cycle tracker full (capacity {capacity})")]
    TrackerFull {
        /// Tracker capacity.
        capacity: usize,
    },
    /// A calibration buffer rejected a new entry.
    #[error("calibration buffer full (capacity {capacity})")]
    CalibBufferFull {
        /// Buffer capacity.
        capacity: usize,
    },
    /// Raw vehicle speed failed range validation.
    #[error("vehicle speed out of range: raw {raw}")]
    SpeedOutOfRange {
        /// Offending raw fixed-point value.
        raw: u16,
    },
    /// Raw gear position failed range validation.
    #[error("gear position out of range: raw {raw}")]
    GearOutOfRange {
        /// Offending raw value.
        raw: u8,
    },
    /// Storage I/O failed.
    #[error("storage i/o failed")]
    Io(#[from] std::io::Error),
    /// Snapshot encoding failed.
    #[error("snapshot encode failed: {0}")]
    Encode(String),
    /// Snapshot decoding failed.
    #[error("snapshot decode failed: {0}")]
    Decode(String),
}

/// A specialized `Result` for state operations.
pub type StateResult<T = ()> = Result<T, StateError>;
