//! Approver: consume the incoming queue, enforce the processing budget,
//! approve or deny.

use std::sync::Arc;

use asi_events::EventId;
use asi_protocol::Disposition;
use asi_scheduler::{PeriodicTask, TaskSpec};
use asi_state::SharedState;
use parking_lot::Mutex;
use tracing::debug;

use crate::approver::{ACTION_REQUEST_BUDGET, ActionApprover, ApprovalOutcome};
use crate::report::{action_notification, enqueue_notification, raise_event};

use super::APPROVER_TASK;

/// Shared handle to the evaluator, so a respawned task incarnation
/// keeps whatever state the evaluator carries.
pub type SharedApprover = Arc<Mutex<Box<dyn ActionApprover>>>;

/// The approval task.
pub struct ApproverTask {
    shared: SharedState,
    approver: SharedApprover,
}

impl std::fmt::Debug for ApproverTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApproverTask").finish_non_exhaustive()
    }
}

impl ApproverTask {
    /// Create the task over the shared region and an evaluator.
    pub fn new(shared: SharedState, approver: SharedApprover) -> Self {
        Self { shared, approver }
    }
}

impl PeriodicTask for ApproverTask {
    fn spec(&self) -> TaskSpec {
        APPROVER_TASK
    }

    fn tick(&mut self) {
        // Drain one request per tick, copying the vehicle cache out under
        // the same lock.
        let (msg, vehicle) = {
            let mut common = self.shared.common.lock();
            let Some(msg) = common.incoming.pop_front() else {
                return;
            };
            (msg, common.vehicle)
        };

        let state = { self.shared.machine.lock().state };

        // The pending timing entry is removed whether approval succeeds
        // or fails.
        let pending = {
            self.shared
                .common
                .lock()
                .pending_actions
                .take(msg.id, msg.sequence)
        };

        let outcome = match pending {
            Some(received_at) if received_at.elapsed() > ACTION_REQUEST_BUDGET => {
                ApprovalOutcome::Timeout
            }
            _ => self.approver.lock().evaluate(&msg, &vehicle, state),
        };

        match outcome {
            ApprovalOutcome::Ok => {
                let pushed = { self.shared.common.lock().approved.push_back(msg) };
                if pushed.is_err() {
                    debug!(id = msg.id, "approved queue full, request dropped");
                    raise_event(&self.shared, EventId::MsgLoss);
                }
            }
            ApprovalOutcome::PreconditionFail => {
                debug!(id = msg.id, sequence = msg.sequence, "precondition failed");
                raise_event(&self.shared, EventId::ActionReqDenied);
                enqueue_notification(
                    &self.shared,
                    action_notification(msg.id, Disposition::PreconditionFail),
                );
            }
            ApprovalOutcome::InvalidAction => {
                debug!(id = msg.id, sequence = msg.sequence, "invalid action");
                raise_event(&self.shared, EventId::ActionReqInvalid);
                enqueue_notification(
                    &self.shared,
                    action_notification(msg.id, Disposition::InvalidAction),
                );
            }
            ApprovalOutcome::Timeout => {
                debug!(id = msg.id, sequence = msg.sequence, "processing budget spent");
                raise_event(&self.shared, EventId::ActionRequestProcessTimeout);
                enqueue_notification(
                    &self.shared,
                    action_notification(msg.id, Disposition::TimeoutLimit),
                );
            }
        }
    }
}
