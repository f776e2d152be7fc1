//! The fixed 26-byte little-endian wire frame.
//!
//! Layout (offsets in bytes):
//!
//! | Offset | Field | Width |
//! |---|---|---|
//! | 0 | type | u16 |
//! | 2 | length | u16 |
//! | 4 | crc | u16 |
//! | 6 | rolling_counter | u16 |
//! | 8 | timestamp_s | u32 |
//! | 12 | sequence | u16 |
//! | 14 | id | u16 |
//! | 16 | value | 8 bytes |

use crate::crc16::frame_crc;
use crate::error::FrameError;
use crate::types::MessageClass;

/// Exact size of a wire frame in bytes.
pub const FRAME_LEN: usize = 26;

/// One decoded wire frame.
///
/// The type field is kept as the decoded [`MessageClass`]; `decode`
/// rejects unknown type codes outright, so an in-memory frame always has
/// a meaningful class. Length and CRC validation are separate steps
/// ([`Frame::check_length`], [`Frame::check_crc`]) because the receive
/// path reports each failure as a distinct event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Message class (wire type field).
    pub class: MessageClass,
    /// Used length of `value`, in bytes.
    pub length: u16,
    /// CRC over `sequence‖id‖value` as carried in the header.
    pub crc: u16,
    /// Per-role rolling counter.
    pub rolling_counter: u16,
    /// Sender wall-clock timestamp, unix seconds.
    pub timestamp_s: u32,
    /// Sequence number.
    pub sequence: u16,
    /// Message id.
    pub id: u16,
    /// Payload bytes; bytes past `length` are zero on the wire.
    pub value: [u8; 8],
}

impl Frame {
    /// Build a frame with the CRC already computed and sealed in.
    ///
    /// Rolling counter and timestamp start at zero; the transmit path
    /// stamps them just before encoding.
    pub fn sealed(class: MessageClass, id: u16, sequence: u16, length: u16, value: [u8; 8]) -> Self {
        Self {
            class,
            length,
            crc: frame_crc(sequence, id, &value),
            rolling_counter: 0,
            timestamp_s: 0,
            sequence,
            id,
            value,
        }
    }

    /// Recompute and store the CRC after mutating protected fields.
    pub fn reseal(&mut self) {
        self.crc = frame_crc(self.sequence, self.id, &self.value);
    }

    /// CRC over the protected fields as they currently stand.
    pub fn computed_crc(&self) -> u16 {
        frame_crc(self.sequence, self.id, &self.value)
    }

    /// Check the header CRC against the protected fields.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::CrcMismatch`] when they differ.
    pub fn check_crc(&self) -> Result<(), FrameError> {
        let computed = self.computed_crc();
        if computed == self.crc {
            Ok(())
        } else {
            Err(FrameError::CrcMismatch {
                header: self.crc,
                computed,
            })
        }
    }

    /// Check the length field against the class's admissible set.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::LengthNotAllowed`] when it is not.
    pub fn check_length(&self) -> Result<(), FrameError> {
        if self.class.is_length_allowed(self.length) {
            Ok(())
        } else {
            Err(FrameError::LengthNotAllowed {
                class: self.class,
                length: self.length,
            })
        }
    }

    /// Encode to the 26-byte wire form.
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut out = [0u8; FRAME_LEN];
        out[0..2].copy_from_slice(&self.class.wire_code().to_le_bytes());
        out[2..4].copy_from_slice(&self.length.to_le_bytes());
        out[4..6].copy_from_slice(&self.crc.to_le_bytes());
        out[6..8].copy_from_slice(&self.rolling_counter.to_le_bytes());
        out[8..12].copy_from_slice(&self.timestamp_s.to_le_bytes());
        out[12..14].copy_from_slice(&self.sequence.to_le_bytes());
        out[14..16].copy_from_slice(&self.id.to_le_bytes());
        out[16..24].copy_from_slice(&self.value);
        out
    }

    /// Decode a 26-byte wire record.
    ///
    /// Structural checks only: size and type code. Length and CRC are
    /// validated by their own steps so callers can distinguish the
    /// failures.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::WrongSize`] for buffers that are not exactly
    /// one frame and [`FrameError::UnknownTypeCode`] for unrecognised
    /// type fields.
    pub fn decode(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() != FRAME_LEN {
            return Err(FrameError::WrongSize {
                expected: FRAME_LEN,
                actual: data.len(),
            });
        }

        let word = |at: usize| u16::from_le_bytes([data[at], data[at + 1]]);
        let class = MessageClass::from_wire_code(word(0))?;

        let mut value = [0u8; 8];
        value.copy_from_slice(&data[16..24]);

        Ok(Self {
            class,
            length: word(2),
            crc: word(4),
            rolling_counter: word(6),
            timestamp_s: u32::from_le_bytes([data[8], data[9], data[10], data[11]]),
            sequence: word(12),
            id: word(14),
            value,
        })
    }
}
