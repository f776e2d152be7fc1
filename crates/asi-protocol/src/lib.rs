//! Wire frame codec, CRC, and message dictionary for the ASI runtime.
//!
//! This crate is intentionally I/O-free and allocation-free on hot paths.
//! It provides pure functions and types that can be tested and fuzzed
//! without sockets or scheduler plumbing:
//!
//! - the fixed 26-byte little-endian TLV frame ([`Frame`])
//! - CRC-16-CCITT over `sequence‖id‖value` ([`crc16`])
//! - the five message classes with their wire type codes and admissible
//!   length sets ([`MessageClass`])
//! - the immutable dictionary of the 22 logical message roles and their
//!   per-role integrity profiles ([`MessageRole`], [`IntegrityProfile`])
//!
//! Validation is deliberately split into small steps (size, type code,
//! length, CRC, dictionary) so the receive path can report each failure
//! class as its own event.

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod crc16;
pub mod dictionary;
pub mod error;
pub mod frame;
pub mod ids;
pub mod types;

pub use crc16::frame_crc;
pub use dictionary::{IntegrityProfile, MessageRole, ROLE_COUNT};
pub use error::{FrameError, ProtocolResult};
pub use frame::{FRAME_LEN, Frame};
pub use types::{ClearCondition, Disposition, MessageClass, Origin, Peer, SequenceSource};
