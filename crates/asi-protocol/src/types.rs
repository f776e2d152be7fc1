//! Message classes, origins, and action-notification dispositions.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// The five wire message classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageClass {
    /// Action request from the VAM.
    ActionRequest,
    /// Vehicle status report from the CM.
    StatusFromCm,
    /// Acknowledgement of a previously sent message.
    Ack,
    /// Notification published by the ASI.
    Notification,
    /// Calibration data echoed back by the CM.
    CalibReadback,
}

impl MessageClass {
    /// Wire type code carried in the frame header.
    pub fn wire_code(self) -> u16 {
        match self {
            MessageClass::ActionRequest => 0xFF11,
            MessageClass::StatusFromCm => 0xFF22,
            MessageClass::Ack => 0xFF33,
            MessageClass::Notification => 0xFF44,
            MessageClass::CalibReadback => 0xFF55,
        }
    }

    /// Parse a wire type code.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::UnknownTypeCode`] for codes outside the
    /// five-class set.
    pub fn from_wire_code(code: u16) -> Result<Self, FrameError> {
        match code {
            0xFF11 => Ok(MessageClass::ActionRequest),
            0xFF22 => Ok(MessageClass::StatusFromCm),
            0xFF33 => Ok(MessageClass::Ack),
            0xFF44 => Ok(MessageClass::Notification),
            0xFF55 => Ok(MessageClass::CalibReadback),
            other => Err(FrameError::UnknownTypeCode(other)),
        }
    }

    /// Admissible values of the frame length field for this class.
    pub fn allowed_lengths(self) -> &'static [u16] {
        match self {
            MessageClass::ActionRequest | MessageClass::CalibReadback => &[2, 4, 8],
            MessageClass::StatusFromCm => &[2, 4],
            MessageClass::Ack | MessageClass::Notification => &[1],
        }
    }

    /// True if `length` is admissible for this class.
    pub fn is_length_allowed(self, length: u16) -> bool {
        self.allowed_lengths().contains(&length)
    }
}

/// Which side of the bus a role originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Vehicle Automation Module.
    Vam,
    /// Control Module.
    Cm,
    /// The interlock itself.
    Asi,
}

/// One of the two peers the interlock talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Peer {
    /// Vehicle Automation Module (upstream requester).
    Vam,
    /// Control Module (downstream controller).
    Cm,
}

impl Peer {
    /// Dense index for two-element per-peer tables.
    pub fn index(self) -> usize {
        match self {
            Peer::Vam => 0,
            Peer::Cm => 1,
        }
    }

    /// Both peers, in table order.
    pub fn both() -> [Peer; 2] {
        [Peer::Vam, Peer::Cm]
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::Vam => f.write_str("VAM"),
            Peer::Cm => f.write_str("CM"),
        }
    }
}

/// Where the sequence field of an outgoing frame comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceSource {
    /// The ASI sequence register for the role.
    Asi,
    /// Echo of the sequence the peer sent.
    Peer,
}

/// What clears a tracked message instance before it times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClearCondition {
    /// A matching acknowledgement arrived.
    Ack,
    /// A matching calibration readback arrived.
    Readback,
    /// The next cyclic arrival refreshes the entry.
    Cyclic,
}

/// Disposition codes carried in action notifications to the VAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Request passed validation and was forwarded to the CM.
    ApprovedRequest,
    /// Request was dropped by the rate limiter.
    RateLimiterDrop,
    /// Response deadline expired.
    TimeoutLimit,
    /// Transmit to the peer failed.
    TransmissionFailed,
    /// Calibration readback matched what was sent.
    ReadbackMatch,
    /// Calibration readback differed from what was sent.
    ReadbackMismatch,
    /// Request named an unknown or inapplicable action.
    InvalidAction,
    /// Request failed precondition evaluation.
    PreconditionFail,
}

impl Disposition {
    /// Stable one-byte wire code, carried in the notification value.
    pub fn code(self) -> u8 {
        match self {
            Disposition::ApprovedRequest => 0x01,
            Disposition::RateLimiterDrop => 0x02,
            Disposition::TimeoutLimit => 0x03,
            Disposition::TransmissionFailed => 0x04,
            Disposition::ReadbackMatch => 0x05,
            Disposition::ReadbackMismatch => 0x06,
            Disposition::InvalidAction => 0x07,
            Disposition::PreconditionFail => 0x08,
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Disposition::ApprovedRequest => "approved_request",
            Disposition::RateLimiterDrop => "rate_limiter_drop",
            Disposition::TimeoutLimit => "timeout_limit",
            Disposition::TransmissionFailed => "transmission_failed",
            Disposition::ReadbackMatch => "match",
            Disposition::ReadbackMismatch => "mismatch",
            Disposition::InvalidAction => "invalid_action",
            Disposition::PreconditionFail => "precondition_fail",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes_round_trip() {
        for class in [
            MessageClass::ActionRequest,
            MessageClass::StatusFromCm,
            MessageClass::Ack,
            MessageClass::Notification,
            MessageClass::CalibReadback,
        ] {
            assert_eq!(MessageClass::from_wire_code(class.wire_code()), Ok(class));
        }
    }

    #[test]
    fn test_unknown_wire_code_rejected() {
        assert_eq!(
            MessageClass::from_wire_code(0x1234),
            Err(FrameError::UnknownTypeCode(0x1234))
        );
    }

    #[test]
    fn test_allowed_lengths() {
        assert!(MessageClass::ActionRequest.is_length_allowed(2));
        assert!(MessageClass::ActionRequest.is_length_allowed(8));
        assert!(!MessageClass::ActionRequest.is_length_allowed(1));
        assert!(!MessageClass::ActionRequest.is_length_allowed(3));
        assert!(MessageClass::StatusFromCm.is_length_allowed(4));
        assert!(!MessageClass::StatusFromCm.is_length_allowed(8));
        assert!(MessageClass::Ack.is_length_allowed(1));
        assert!(!MessageClass::Ack.is_length_allowed(2));
        assert!(MessageClass::Notification.is_length_allowed(1));
    }

    #[test]
    fn test_disposition_codes_distinct() {
        let codes = [
            Disposition::ApprovedRequest,
            Disposition::RateLimiterDrop,
            Disposition::TimeoutLimit,
            Disposition::TransmissionFailed,
            Disposition::ReadbackMatch,
            Disposition::ReadbackMismatch,
            Disposition::InvalidAction,
            Disposition::PreconditionFail,
        ]
        .map(Disposition::code);
        for (i, a) in codes.iter().enumerate() {
            for b in codes.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
