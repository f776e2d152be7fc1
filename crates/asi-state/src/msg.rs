//! The one element type flowing through the message queues.

use asi_protocol::{Frame, MessageClass};
use serde::{Deserialize, Serialize};

/// A validated message payload plus its routing identity.
///
/// This is what the incoming, approved, and safe-state queues carry, and
/// what the calibration buffers store for later comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessMsgData {
    /// Message id.
    pub id: u16,
    /// Sequence number the message carried.
    pub sequence: u16,
    /// Message class.
    pub class: MessageClass,
    /// Used length of `value`, in bytes.
    pub length: u16,
    /// Payload bytes.
    pub value: [u8; 8],
}

impl ProcessMsgData {
    /// Extract the queue payload from a decoded frame.
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            id: frame.id,
            sequence: frame.sequence,
            class: frame.class,
            length: frame.length,
            value: frame.value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_frame_copies_identity_and_payload() {
        let frame = Frame::sealed(
            MessageClass::ActionRequest,
            0x0007,
            42,
            8,
            [1, 2, 3, 4, 5, 6, 7, 8],
        );
        let msg = ProcessMsgData::from_frame(&frame);
        assert_eq!(msg.id, 0x0007);
        assert_eq!(msg.sequence, 42);
        assert_eq!(msg.class, MessageClass::ActionRequest);
        assert_eq!(msg.length, 8);
        assert_eq!(msg.value, [1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
