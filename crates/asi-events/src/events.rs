//! Event identifiers and severity ranking.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EventError, EventResult};

/// Number of enumerated events.
pub const EVENT_COUNT: usize = 26;

/// Severity of an event, ordered `Minor < Normal < Critical`.
///
/// Severity decides both queue priority and the side effect the fault
/// manager runs: critical events notify the state machine (latching the
/// critical fault flag), normal events notify the external system, minor
/// events are log-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Informational; no callback.
    Minor,
    /// Operational anomaly; notifies the external system.
    Normal,
    /// Safety-relevant; latches the critical fault flag.
    Critical,
}

/// Every event the interlock can raise.
///
/// Wire/storage codes are stable; [`EventId::from_code`] rejects anything
/// outside the enumerated range instead of carrying a sentinel variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventId {
    /// Worker initialization finished.
    InitComplete,
    /// Connection to a peer was lost.
    LossComm,
    /// Three consecutive CRC mismatches on one role.
    MsgCrcCheck,
    /// Rolling-counter delta out of the accepted window, three times.
    RollCount,
    /// Wire type/length pair not admissible for the message class.
    MsgTypeLength,
    /// Expected acknowledgement never arrived.
    AckLoss,
    /// Acknowledgement arrived carrying a failure payload.
    AckUnsuccess,
    /// Vehicle status payload failed range validation.
    VehicleStatusInvalid,
    /// Cyclic vehicle status stopped arriving.
    VehicleStatusTimeout,
    /// Calibration readback differed from what was sent.
    CalReadbackError,
    /// Calibration readback never arrived.
    CalReadbackTimeout,
    /// A received frame was discarded before routing.
    MsgLoss,
    /// Action request denied by precondition evaluation.
    ActionReqDenied,
    /// Action request referenced an unknown or inapplicable action.
    ActionReqInvalid,
    /// Action request processing exceeded its 50 ms budget.
    ActionRequestProcessTimeout,
    /// Peer reported a non-critical ECU failure.
    EcuNonCriticalFail,
    /// A periodic task terminated abnormally and was respawned.
    TaskRestart,
    /// Reconnect attempts for a peer were exhausted this tick.
    ConnRetryExhausted,
    /// A tracked message exceeded its response deadline.
    MsgTimeout,
    /// Precondition list could not be evaluated.
    PrecondListError,
    /// Action list lookup failed structurally.
    ActionListError,
    /// Shared-state storage could not be established at startup.
    StartupMemError,
    /// Startup test sequence terminated without passing.
    SutTerm,
    /// Peer reported a critical ECU failure.
    EcuCriticalFail,
    /// A task body overran 1.2x its period.
    Overrun,
    /// The state machine observed an illegal transition.
    SmTransition,
}

/// All events, in stable code order.
const ALL_EVENTS: [EventId; EVENT_COUNT] = [
    EventId::InitComplete,
    EventId::LossComm,
    EventId::MsgCrcCheck,
    EventId::RollCount,
    EventId::MsgTypeLength,
    EventId::AckLoss,
    EventId::AckUnsuccess,
    EventId::VehicleStatusInvalid,
    EventId::VehicleStatusTimeout,
    EventId::CalReadbackError,
    EventId::CalReadbackTimeout,
    EventId::MsgLoss,
    EventId::ActionReqDenied,
    EventId::ActionReqInvalid,
    EventId::ActionRequestProcessTimeout,
    EventId::EcuNonCriticalFail,
    EventId::TaskRestart,
    EventId::ConnRetryExhausted,
    EventId::MsgTimeout,
    EventId::PrecondListError,
    EventId::ActionListError,
    EventId::StartupMemError,
    EventId::SutTerm,
    EventId::EcuCriticalFail,
    EventId::Overrun,
    EventId::SmTransition,
];

impl EventId {
    /// Stable numeric code, used on disk and in log lines.
    pub fn code(self) -> u16 {
        match ALL_EVENTS.iter().position(|e| *e == self) {
            Some(idx) => idx as u16 + 1,
            None => 0,
        }
    }

    /// Parse a stable code back into an event.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::UnknownCode`] for codes outside the
    /// enumerated range.
    pub fn from_code(code: u16) -> EventResult<Self> {
        let idx = usize::from(code.wrapping_sub(1));
        ALL_EVENTS
            .get(idx)
            .copied()
            .ok_or(EventError::UnknownCode(code))
    }

    /// Dense index into per-event tables such as occurrence counters.
    pub fn index(self) -> usize {
        usize::from(self.code()) - 1
    }

    /// Iterate over every enumerated event in code order.
    pub fn all() -> impl Iterator<Item = EventId> {
        ALL_EVENTS.iter().copied()
    }

    /// Severity ranking of this event.
    pub fn severity(self) -> Severity {
        match self {
            EventId::InitComplete | EventId::LossComm => Severity::Minor,
            EventId::MsgCrcCheck
            | EventId::RollCount
            | EventId::MsgTypeLength
            | EventId::AckLoss
            | EventId::AckUnsuccess
            | EventId::VehicleStatusInvalid
            | EventId::VehicleStatusTimeout
            | EventId::CalReadbackError
            | EventId::CalReadbackTimeout
            | EventId::MsgLoss
            | EventId::ActionReqDenied
            | EventId::ActionReqInvalid
            | EventId::ActionRequestProcessTimeout
            | EventId::EcuNonCriticalFail
            | EventId::TaskRestart
            | EventId::ConnRetryExhausted => Severity::Normal,
            EventId::MsgTimeout
            | EventId::PrecondListError
            | EventId::ActionListError
            | EventId::StartupMemError
            | EventId::SutTerm
            | EventId::EcuCriticalFail
            | EventId::Overrun
            | EventId::SmTransition => Severity::Critical,
        }
    }

    /// True for events that latch the critical fault flag.
    pub fn is_critical(self) -> bool {
        self.severity() == Severity::Critical
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventId::InitComplete => "INIT_COMPLETE",
            EventId::LossComm => "INFO_LOSS_COMM",
            EventId::MsgCrcCheck => "FAULT_MSG_CRC_CHECK",
            EventId::RollCount => "FAULT_ROLL_COUNT",
            EventId::MsgTypeLength => "FAULT_MSG_TYPE_LENGTH",
            EventId::AckLoss => "INFO_ACK_LOSS",
            EventId::AckUnsuccess => "INFO_ACK_UNSUCCESS",
            EventId::VehicleStatusInvalid => "INFO_VEHICLE_STATUS_INVALID_INFO_ERROR",
            EventId::VehicleStatusTimeout => "INFO_VEHICLE_STATUS_TIMEOUT",
            EventId::CalReadbackError => "FAULT_CAL_READBACK_ERROR",
            EventId::CalReadbackTimeout => "FAULT_CAL_READBACK_TIMEOUT",
            EventId::MsgLoss => "INFO_MSG_LOSS",
            EventId::ActionReqDenied => "INFO_ACTION_REQ_DENIED",
            EventId::ActionReqInvalid => "INFO_ACTION_REQ_INVALID",
            EventId::ActionRequestProcessTimeout => "INFO_ACTION_REQUEST_PROCESS_TIMEOUT",
            EventId::EcuNonCriticalFail => "FAULT_ECU_NON_CRITICAL_FAIL",
            EventId::TaskRestart => "FAULT_TASK_RESTART",
            EventId::ConnRetryExhausted => "INFO_CONN_RETRY_EXHAUSTED",
            EventId::MsgTimeout => "FAULT_MSG_TIMEOUT",
            EventId::PrecondListError => "FAULT_PRECOND_LIST_ERROR",
            EventId::ActionListError => "FAULT_ACTION_LIST_ERROR",
            EventId::StartupMemError => "FAULT_STARTUP_MEM_ERROR",
            EventId::SutTerm => "FAULT_SUT_TERM",
            EventId::EcuCriticalFail => "FAULT_ECU_CRITICAL_FAIL",
            EventId::Overrun => "FAULT_OVERRUN",
            EventId::SmTransition => "FAULT_SM_TRANSITION_ERROR",
        };
        f.write_str(name)
    }
}
