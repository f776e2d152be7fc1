//! Action-request approval interface and the shipped precondition
//! evaluator.
//!
//! The precondition rules themselves are collaborator business logic;
//! the runtime only fixes the interface, the 50 ms processing budget,
//! and the bookkeeping contract (the pending timing entry is removed
//! whether approval succeeds or fails).

use std::time::Duration;

use asi_protocol::MessageRole;
use asi_state::{AsiState, GearPosition, ProcessMsgData, VehicleCache};

/// Processing budget from RX of an action request to its approval.
pub const ACTION_REQUEST_BUDGET: Duration = Duration::from_millis(50);

/// Result of evaluating one action request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// Forward to the CM.
    Ok,
    /// A precondition on vehicle state failed.
    PreconditionFail,
    /// The request names an unknown or inapplicable action.
    InvalidAction,
    /// The processing budget was already spent.
    Timeout,
}

/// Evaluates action requests against current vehicle state.
pub trait ActionApprover: Send {
    /// Evaluate one request. The budget check has already happened; this
    /// sees only in-budget requests.
    fn evaluate(
        &mut self,
        msg: &ProcessMsgData,
        vehicle: &VehicleCache,
        state: AsiState,
    ) -> ApprovalOutcome;
}

/// The shipped approver: structural checks plus a small precondition
/// table over the cached vehicle state.
#[derive(Debug, Default)]
pub struct PreconditionApprover;

impl PreconditionApprover {
    /// Create the default approver.
    pub fn new() -> Self {
        Self
    }
}

impl ActionApprover for PreconditionApprover {
    fn evaluate(
        &mut self,
        msg: &ProcessMsgData,
        vehicle: &VehicleCache,
        state: AsiState,
    ) -> ApprovalOutcome {
        let Ok(role) = MessageRole::from_id(msg.id) else {
            return ApprovalOutcome::InvalidAction;
        };
        if !role.is_action_request() {
            return ApprovalOutcome::InvalidAction;
        }

        if state != AsiState::NormalOperation {
            return ApprovalOutcome::PreconditionFail;
        }

        match role {
            // Engaging automation needs live vehicle status.
            MessageRole::EngageAutomation => {
                if vehicle.speed_outdated || vehicle.gear_outdated {
                    ApprovalOutcome::PreconditionFail
                } else {
                    ApprovalOutcome::Ok
                }
            }
            // Gear changes only from standstill with a live speed source.
            MessageRole::SetTargetGear => {
                if vehicle.speed_outdated || vehicle.speed_kph > 0.5 {
                    ApprovalOutcome::PreconditionFail
                } else {
                    ApprovalOutcome::Ok
                }
            }
            // Speed targets need a live speed source and a forward gear.
            MessageRole::SetTargetSpeed => {
                if vehicle.speed_outdated
                    || !matches!(vehicle.gear, GearPosition::Drive | GearPosition::Low)
                {
                    ApprovalOutcome::PreconditionFail
                } else {
                    ApprovalOutcome::Ok
                }
            }
            // Brake and signalling requests carry no vehicle precondition.
            _ => ApprovalOutcome::Ok,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asi_protocol::MessageClass;
    use asi_protocol::ids::action_request;

    fn request(id: u16) -> ProcessMsgData {
        ProcessMsgData {
            id,
            sequence: 1,
            class: MessageClass::ActionRequest,
            length: 2,
            value: [0; 8],
        }
    }

    fn live_vehicle() -> VehicleCache {
        let mut vehicle = VehicleCache::new();
        vehicle.update_speed(0).expect("speed");
        vehicle.update_gear(0).expect("gear");
        vehicle
    }

    #[test]
    fn test_unknown_id_is_invalid_action() {
        let mut approver = PreconditionApprover::new();
        let outcome = approver.evaluate(
            &request(0x4242),
            &live_vehicle(),
            AsiState::NormalOperation,
        );
        assert_eq!(outcome, ApprovalOutcome::InvalidAction);
    }

    #[test]
    fn test_non_action_role_is_invalid_action() {
        let mut approver = PreconditionApprover::new();
        let outcome = approver.evaluate(
            &request(MessageRole::Prndl.id()),
            &live_vehicle(),
            AsiState::NormalOperation,
        );
        assert_eq!(outcome, ApprovalOutcome::InvalidAction);
    }

    #[test]
    fn test_not_in_normal_operation_fails_precondition() {
        let mut approver = PreconditionApprover::new();
        let outcome = approver.evaluate(
            &request(action_request::ACTIVATE_HORN),
            &live_vehicle(),
            AsiState::StartupTest,
        );
        assert_eq!(outcome, ApprovalOutcome::PreconditionFail);
    }

    #[test]
    fn test_horn_request_approved() {
        let mut approver = PreconditionApprover::new();
        let outcome = approver.evaluate(
            &request(action_request::ACTIVATE_HORN),
            &live_vehicle(),
            AsiState::NormalOperation,
        );
        assert_eq!(outcome, ApprovalOutcome::Ok);
    }

    #[test]
    fn test_gear_change_rejected_while_moving() {
        let mut approver = PreconditionApprover::new();
        let mut vehicle = live_vehicle();
        vehicle.update_speed(5000).expect("speed");

        let outcome = approver.evaluate(
            &request(action_request::SET_TARGET_GEAR),
            &vehicle,
            AsiState::NormalOperation,
        );
        assert_eq!(outcome, ApprovalOutcome::PreconditionFail);
    }

    #[test]
    fn test_engage_rejected_with_outdated_status() {
        let mut approver = PreconditionApprover::new();
        let mut vehicle = live_vehicle();
        vehicle.mark_speed_outdated();

        let outcome = approver.evaluate(
            &request(action_request::ENGAGE_AUTOMATION),
            &vehicle,
            AsiState::NormalOperation,
        );
        assert_eq!(outcome, ApprovalOutcome::PreconditionFail);
    }
}
