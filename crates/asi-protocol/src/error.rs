//! Error types for frame decoding and dictionary lookup.

use thiserror::Error;

use crate::types::MessageClass;

/// Frame decode and validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The receive buffer was not exactly one frame.
    #[error("frame must be {expected} bytes, got {actual}")]
    WrongSize {
        /// Required frame size.
        expected: usize,
        /// Size actually received.
        actual: usize,
    },
    /// The wire type code does not name a message class.
    #[error("unknown wire type code {0:#06x}")]
    UnknownTypeCode(u16),
    /// The length field is not in the class's admissible set.
    #[error("length {length} not admissible for {class:?}")]
    LengthNotAllowed {
        /// Class the frame claimed.
        class: MessageClass,
        /// Offending length field.
        length: u16,
    },
    /// Header CRC does not match the computed CRC.
    #[error("crc mismatch: header {header:#06x}, computed {computed:#06x}")]
    CrcMismatch {
        /// CRC carried in the header.
        header: u16,
        /// CRC computed over the protected fields.
        computed: u16,
    },
    /// The message id is not in the dictionary.
    #[error("unknown message id {0:#06x}")]
    UnknownId(u16),
}

/// A specialized `Result` for protocol operations.
pub type ProtocolResult<T> = core::result::Result<T, FrameError>;
