//! The immutable message dictionary and per-role integrity profiles.
//!
//! The dictionary is a bijection between the 22 logical roles and their
//! numeric ids, partitioned into VAM-origin, CM-origin, and ASI-origin
//! groups. It is pure data; nothing here mutates after initialisation.

use asi_events::EventId;
use serde::{Deserialize, Serialize};

use crate::error::FrameError;
use crate::ids::{action_request, control_module, interlock};
use crate::types::{ClearCondition, MessageClass, Origin, SequenceSource};

/// Number of declared roles.
pub const ROLE_COUNT: usize = 22;

/// Response deadline for acknowledged sends, in 25 ms cycles.
pub const ACK_TIMEOUT_CYCLES: u16 = 35;

/// Response deadline for calibration readbacks, in cycles.
pub const CALIB_TIMEOUT_CYCLES: u16 = 50;

/// Arrival deadline for cyclic CM status, in cycles.
pub const CYCLIC_TIMEOUT_CYCLES: u16 = 25;

/// The 22 logical message roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageRole {
    /// Engage automated driving (VAM action request).
    EngageAutomation,
    /// Disengage automated driving (VAM action request).
    DisengageAutomation,
    /// Select a target gear (VAM action request).
    SetTargetGear,
    /// Select a target speed (VAM action request).
    SetTargetSpeed,
    /// Apply service brake (VAM action request).
    ApplyBrake,
    /// Release service brake (VAM action request).
    ReleaseBrake,
    /// Adjust steering angle (VAM action request).
    SteeringAdjust,
    /// Sound the horn (VAM action request).
    ActivateHorn,
    /// Exterior lamp control (VAM action request).
    LampControl,
    /// Wiper control (VAM action request).
    WiperControl,
    /// Hazard light control (VAM action request).
    HazardControl,
    /// Acknowledgement from the CM.
    Ack,
    /// Cyclic gear position status from the CM.
    Prndl,
    /// Cyclic vehicle speed status from the CM.
    VehicleSpeed,
    /// Cyclic rain sensor status from the CM.
    RainSensor,
    /// Calibration readback echo from the CM.
    CalibReadback,
    /// Critical ECU failure report from the CM.
    CriticalFail,
    /// Non-critical ECU failure report from the CM.
    NonCriticalFail,
    /// Calibration request the ASI sends to the CM.
    CalibRequest,
    /// Startup-test progress notification the ASI sends.
    StartupTestNotification,
    /// Periodic status notification the ASI sends.
    StatusNotification,
    /// Action-request disposition notification the ASI sends to the VAM.
    ActionNotification,
}

const ALL_ROLES: [MessageRole; ROLE_COUNT] = [
    MessageRole::EngageAutomation,
    MessageRole::DisengageAutomation,
    MessageRole::SetTargetGear,
    MessageRole::SetTargetSpeed,
    MessageRole::ApplyBrake,
    MessageRole::ReleaseBrake,
    MessageRole::SteeringAdjust,
    MessageRole::ActivateHorn,
    MessageRole::LampControl,
    MessageRole::WiperControl,
    MessageRole::HazardControl,
    MessageRole::Ack,
    MessageRole::Prndl,
    MessageRole::VehicleSpeed,
    MessageRole::RainSensor,
    MessageRole::CalibReadback,
    MessageRole::CriticalFail,
    MessageRole::NonCriticalFail,
    MessageRole::CalibRequest,
    MessageRole::StartupTestNotification,
    MessageRole::StatusNotification,
    MessageRole::ActionNotification,
];

impl MessageRole {
    /// Iterate over every declared role.
    pub fn all() -> impl Iterator<Item = MessageRole> {
        ALL_ROLES.iter().copied()
    }

    /// The role's numeric message id.
    pub fn id(self) -> u16 {
        match self {
            MessageRole::EngageAutomation => action_request::ENGAGE_AUTOMATION,
            MessageRole::DisengageAutomation => action_request::DISENGAGE_AUTOMATION,
            MessageRole::SetTargetGear => action_request::SET_TARGET_GEAR,
            MessageRole::SetTargetSpeed => action_request::SET_TARGET_SPEED,
            MessageRole::ApplyBrake => action_request::APPLY_BRAKE,
            MessageRole::ReleaseBrake => action_request::RELEASE_BRAKE,
            MessageRole::SteeringAdjust => action_request::STEERING_ADJUST,
            MessageRole::ActivateHorn => action_request::ACTIVATE_HORN,
            MessageRole::LampControl => action_request::LAMP_CONTROL,
            MessageRole::WiperControl => action_request::WIPER_CONTROL,
            MessageRole::HazardControl => action_request::HAZARD_CONTROL,
            MessageRole::Ack => control_module::ACK,
            MessageRole::Prndl => control_module::PRNDL,
            MessageRole::VehicleSpeed => control_module::VEHICLE_SPEED,
            MessageRole::RainSensor => control_module::RAIN_SENSOR,
            MessageRole::CalibReadback => control_module::CALIB_READBACK,
            MessageRole::CriticalFail => control_module::CRITICAL_FAIL,
            MessageRole::NonCriticalFail => control_module::NON_CRITICAL_FAIL,
            MessageRole::CalibRequest => interlock::CALIB_REQUEST,
            MessageRole::StartupTestNotification => interlock::STARTUP_TEST_NOTIFICATION,
            MessageRole::StatusNotification => interlock::STATUS_NOTIFICATION,
            MessageRole::ActionNotification => interlock::ACTION_NOTIFICATION,
        }
    }

    /// Dictionary lookup by id.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::UnknownId`] for ids outside the dictionary.
    pub fn from_id(id: u16) -> Result<Self, FrameError> {
        ALL_ROLES
            .iter()
            .copied()
            .find(|role| role.id() == id)
            .ok_or(FrameError::UnknownId(id))
    }

    /// Dense index into per-role tables (counter registers).
    pub fn index(self) -> usize {
        // ALL_ROLES is the declaration order, so position always exists.
        ALL_ROLES
            .iter()
            .position(|role| *role == self)
            .unwrap_or(0)
    }

    /// The role's message class.
    pub fn class(self) -> MessageClass {
        match self {
            MessageRole::EngageAutomation
            | MessageRole::DisengageAutomation
            | MessageRole::SetTargetGear
            | MessageRole::SetTargetSpeed
            | MessageRole::ApplyBrake
            | MessageRole::ReleaseBrake
            | MessageRole::SteeringAdjust
            | MessageRole::ActivateHorn
            | MessageRole::LampControl
            | MessageRole::WiperControl
            | MessageRole::HazardControl => MessageClass::ActionRequest,
            MessageRole::Ack => MessageClass::Ack,
            MessageRole::Prndl
            | MessageRole::VehicleSpeed
            | MessageRole::RainSensor
            | MessageRole::CriticalFail
            | MessageRole::NonCriticalFail => MessageClass::StatusFromCm,
            MessageRole::CalibReadback => MessageClass::CalibReadback,
            MessageRole::CalibRequest => MessageClass::CalibReadback,
            MessageRole::StartupTestNotification
            | MessageRole::StatusNotification
            | MessageRole::ActionNotification => MessageClass::Notification,
        }
    }

    /// Which side originates this role.
    pub fn origin(self) -> Origin {
        match self {
            MessageRole::EngageAutomation
            | MessageRole::DisengageAutomation
            | MessageRole::SetTargetGear
            | MessageRole::SetTargetSpeed
            | MessageRole::ApplyBrake
            | MessageRole::ReleaseBrake
            | MessageRole::SteeringAdjust
            | MessageRole::ActivateHorn
            | MessageRole::LampControl
            | MessageRole::WiperControl
            | MessageRole::HazardControl => Origin::Vam,
            MessageRole::Ack
            | MessageRole::Prndl
            | MessageRole::VehicleSpeed
            | MessageRole::RainSensor
            | MessageRole::CalibReadback
            | MessageRole::CriticalFail
            | MessageRole::NonCriticalFail => Origin::Cm,
            MessageRole::CalibRequest
            | MessageRole::StartupTestNotification
            | MessageRole::StatusNotification
            | MessageRole::ActionNotification => Origin::Asi,
        }
    }

    /// True for the eleven VAM action-request roles.
    pub fn is_action_request(self) -> bool {
        self.class() == MessageClass::ActionRequest
    }

    /// The peer an outgoing frame of this role is transmitted to:
    /// notifications go to the VAM, everything else to the CM.
    pub fn tx_peer(self) -> crate::types::Peer {
        use crate::types::Peer;
        if self.class() == MessageClass::Notification {
            Peer::Vam
        } else {
            Peer::Cm
        }
    }

    /// The peer socket frames of this role arrive on, if any.
    pub fn rx_peer(self) -> Option<crate::types::Peer> {
        use crate::types::Peer;
        match self.origin() {
            Origin::Vam => Some(Peer::Vam),
            Origin::Cm => Some(Peer::Cm),
            Origin::Asi => None,
        }
    }

    /// The role's integrity profile.
    pub fn profile(self) -> IntegrityProfile {
        match self {
            // Forwarded action requests await a CM acknowledgement.
            MessageRole::EngageAutomation
            | MessageRole::DisengageAutomation
            | MessageRole::SetTargetGear
            | MessageRole::SetTargetSpeed
            | MessageRole::ApplyBrake
            | MessageRole::ReleaseBrake
            | MessageRole::SteeringAdjust
            | MessageRole::ActivateHorn
            | MessageRole::LampControl
            | MessageRole::WiperControl
            | MessageRole::HazardControl => IntegrityProfile {
                timeout_cycles: ACK_TIMEOUT_CYCLES,
                track_cycles: true,
                track_action_timer: true,
                check_type_length: true,
                check_crc: true,
                check_rolling_counter: true,
                check_sequence: true,
                is_cyclic: false,
                sequence_source: SequenceSource::Peer,
                clear_on: Some(ClearCondition::Ack),
                timeout_event: Some(EventId::AckLoss),
            },
            MessageRole::Ack => IntegrityProfile {
                timeout_cycles: 0,
                track_cycles: false,
                track_action_timer: false,
                check_type_length: true,
                check_crc: true,
                check_rolling_counter: true,
                check_sequence: true,
                is_cyclic: false,
                sequence_source: SequenceSource::Peer,
                clear_on: None,
                timeout_event: None,
            },
            MessageRole::Prndl | MessageRole::VehicleSpeed | MessageRole::RainSensor => {
                IntegrityProfile {
                    timeout_cycles: CYCLIC_TIMEOUT_CYCLES,
                    track_cycles: true,
                    track_action_timer: false,
                    check_type_length: true,
                    check_crc: true,
                    check_rolling_counter: true,
                    check_sequence: false,
                    is_cyclic: true,
                    sequence_source: SequenceSource::Peer,
                    clear_on: Some(ClearCondition::Cyclic),
                    timeout_event: Some(EventId::VehicleStatusTimeout),
                }
            }
            MessageRole::CalibReadback => IntegrityProfile {
                timeout_cycles: 0,
                track_cycles: false,
                track_action_timer: false,
                check_type_length: true,
                check_crc: true,
                check_rolling_counter: true,
                check_sequence: true,
                is_cyclic: false,
                sequence_source: SequenceSource::Peer,
                clear_on: None,
                timeout_event: None,
            },
            // Failure reports are routed straight to the event queue.
            MessageRole::CriticalFail | MessageRole::NonCriticalFail => IntegrityProfile {
                timeout_cycles: 0,
                track_cycles: false,
                track_action_timer: false,
                check_type_length: true,
                check_crc: true,
                check_rolling_counter: false,
                check_sequence: false,
                is_cyclic: false,
                sequence_source: SequenceSource::Peer,
                clear_on: None,
                timeout_event: None,
            },
            MessageRole::CalibRequest => IntegrityProfile {
                timeout_cycles: CALIB_TIMEOUT_CYCLES,
                track_cycles: true,
                track_action_timer: false,
                check_type_length: true,
                check_crc: true,
                check_rolling_counter: true,
                check_sequence: true,
                is_cyclic: false,
                sequence_source: SequenceSource::Asi,
                clear_on: Some(ClearCondition::Readback),
                timeout_event: Some(EventId::CalReadbackTimeout),
            },
            MessageRole::StartupTestNotification => IntegrityProfile {
                timeout_cycles: ACK_TIMEOUT_CYCLES,
                track_cycles: true,
                track_action_timer: false,
                check_type_length: true,
                check_crc: true,
                check_rolling_counter: true,
                check_sequence: true,
                is_cyclic: false,
                sequence_source: SequenceSource::Asi,
                clear_on: Some(ClearCondition::Ack),
                timeout_event: Some(EventId::MsgTimeout),
            },
            MessageRole::StatusNotification | MessageRole::ActionNotification => {
                IntegrityProfile {
                    timeout_cycles: 0,
                    track_cycles: false,
                    track_action_timer: false,
                    check_type_length: true,
                    check_crc: true,
                    check_rolling_counter: true,
                    check_sequence: false,
                    is_cyclic: false,
                    sequence_source: SequenceSource::Asi,
                    clear_on: None,
                    timeout_event: None,
                }
            }
        }
    }
}

/// Per-role integrity behaviour, indexed by [`MessageRole`].
///
/// `timeout_cycles == 0` means the role never times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityProfile {
    /// Response deadline in 25 ms cycles; `0` disables tracking deadlines.
    pub timeout_cycles: u16,
    /// Whether sends of (or cyclic registration for) this role create a
    /// tracked instance.
    pub track_cycles: bool,
    /// Whether RX of this role stamps a pending action timer.
    pub track_action_timer: bool,
    /// Validate the type/length pair on RX.
    pub check_type_length: bool,
    /// Validate the header CRC on RX.
    pub check_crc: bool,
    /// Validate the rolling-counter delta on RX.
    pub check_rolling_counter: bool,
    /// Validate the sequence on clear-matching.
    pub check_sequence: bool,
    /// Cyclic roles refresh a standing tracked entry instead of clearing
    /// a one-shot one.
    pub is_cyclic: bool,
    /// Where outgoing frames of this role get their sequence field.
    pub sequence_source: SequenceSource,
    /// What clears a tracked instance of this role.
    pub clear_on: Option<ClearCondition>,
    /// Event raised when the tracked instance times out.
    pub timeout_event: Option<EventId>,
}
