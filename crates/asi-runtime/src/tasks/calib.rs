//! Calibration readback verifier: compare what was sent against what
//! the CM echoed.

use asi_events::EventId;
use asi_protocol::Disposition;
use asi_scheduler::{PeriodicTask, TaskSpec};
use asi_state::SharedState;
use tracing::debug;

use crate::report::{action_notification, enqueue_notification, raise_event};

use super::CALIB_TASK;

#[derive(Debug, Clone, Copy)]
struct Verdict {
    msg_id: u16,
    sequence: u16,
    matched: bool,
}

/// The calibration readback verifier task.
#[derive(Debug)]
pub struct CalibVerifierTask {
    shared: SharedState,
    verdicts: Vec<Verdict>,
}

impl CalibVerifierTask {
    /// Create the task over the shared region.
    pub fn new(shared: SharedState) -> Self {
        Self {
            shared,
            verdicts: Vec::with_capacity(8),
        }
    }
}

impl PeriodicTask for CalibVerifierTask {
    fn spec(&self) -> TaskSpec {
        CALIB_TASK
    }

    fn tick(&mut self) {
        self.verdicts.clear();

        // Compare and remove under the one calibration lock; the events
        // and notifications are raised after it is released.
        {
            let mut calib = self.shared.calib.lock();
            if calib.copy.is_empty() || calib.readback.is_empty() {
                return;
            }

            // Tail to head so removals cannot skip entries.
            for idx in (0..calib.copy.len()).rev() {
                let Some(sent) = calib.copy.get(idx).copied() else {
                    continue;
                };
                let Some(echoed) = calib.readback.remove_matching(sent.id, sent.sequence) else {
                    continue;
                };

                // Both entries are removed regardless of the verdict.
                let _ = calib.copy.remove_at(idx);

                let compare = usize::from(sent.length).min(sent.value.len());
                let matched = sent.value[..compare] == echoed.value[..compare];
                self.verdicts.push(Verdict {
                    msg_id: sent.id,
                    sequence: sent.sequence,
                    matched,
                });
            }
        }

        for verdict in &self.verdicts {
            if verdict.matched {
                debug!(
                    id = verdict.msg_id,
                    sequence = verdict.sequence,
                    "calibration readback matched"
                );
                enqueue_notification(
                    &self.shared,
                    action_notification(verdict.msg_id, Disposition::ReadbackMatch),
                );
            } else {
                debug!(
                    id = verdict.msg_id,
                    sequence = verdict.sequence,
                    "calibration readback mismatched"
                );
                raise_event(&self.shared, EventId::CalReadbackError);
                enqueue_notification(
                    &self.shared,
                    action_notification(verdict.msg_id, Disposition::ReadbackMismatch),
                );
            }
        }
    }
}
