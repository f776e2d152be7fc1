//! CycleCountUpdater: the 25 ms heartbeat of the integrity tracker.

use asi_events::EventId;
use asi_protocol::{ClearCondition, Disposition, MessageRole};
use asi_scheduler::{PeriodicTask, TaskSpec};
use asi_state::{SharedState, TimeoutAction};
use tracing::debug;

use crate::report::{
    action_notification, enqueue_notification, enqueue_status_notification, raise_event,
};

use super::CYCLE_TASK;

/// Cycles between periodic status notifications (20 × 25 ms = 500 ms).
pub const STATUS_NOTIFICATION_CYCLES: u16 = 20;

/// What one timed-out tracked entry requires once the tracker lock is
/// released.
#[derive(Debug, Clone, Copy)]
struct TimeoutWork {
    msg_id: u16,
    sequence: u16,
    role: MessageRole,
    clear_condition: ClearCondition,
    event: Option<EventId>,
}

/// The cycle-count updater task.
#[derive(Debug)]
pub struct CycleCountUpdaterTask {
    shared: SharedState,
    work: Vec<TimeoutWork>,
}

impl CycleCountUpdaterTask {
    /// Create the task over the shared region.
    pub fn new(shared: SharedState) -> Self {
        Self {
            shared,
            work: Vec::with_capacity(8),
        }
    }
}

impl PeriodicTask for CycleCountUpdaterTask {
    fn spec(&self) -> TaskSpec {
        CYCLE_TASK
    }

    fn tick(&mut self) {
        // 1. Advance the global cycle counter.
        let counter = {
            let mut common = self.shared.common.lock();
            common.cycle_counter = common.cycle_counter.wrapping_add(1);
            common.cycle_counter
        };

        // 2. Periodic status notification every 500 ms.
        if counter % STATUS_NOTIFICATION_CYCLES == 0 {
            enqueue_status_notification(&self.shared);
        }

        // 3. Age tracked entries tail to head, collecting timeout work to
        // run after the tracker lock is released.
        self.work.clear();
        {
            let mut tracker = self.shared.tracker.lock();
            let work = &mut self.work;
            tracker.track.age_all(|entry| {
                let profile = entry.role.profile();
                if profile.timeout_cycles == 0
                    || entry.elapsed_response_cycles < profile.timeout_cycles
                {
                    return TimeoutAction::Keep;
                }

                work.push(TimeoutWork {
                    msg_id: entry.msg_id,
                    sequence: entry.sequence,
                    role: entry.role,
                    clear_condition: entry.clear_condition,
                    event: profile.timeout_event,
                });

                // PRNDL and vehicle-speed keep their standing entries so
                // the next cycle still monitors them.
                if matches!(entry.role, MessageRole::Prndl | MessageRole::VehicleSpeed) {
                    TimeoutAction::ResetAndKeep
                } else {
                    TimeoutAction::Remove
                }
            });
        }

        // 4. Run the collected timeout work, one monitor at a time.
        for work in &self.work {
            debug!(
                id = work.msg_id,
                sequence = work.sequence,
                role = ?work.role,
                "tracked message timed out"
            );

            if let Some(event) = work.event {
                raise_event(&self.shared, event);
            }

            if work.role.is_action_request() {
                enqueue_notification(
                    &self.shared,
                    action_notification(work.msg_id, Disposition::TimeoutLimit),
                );
            }

            if work.clear_condition == ClearCondition::Readback {
                let mut calib = self.shared.calib.lock();
                let _ = calib.copy.remove_matching(work.msg_id, work.sequence);
                let _ = calib.readback.remove_matching(work.msg_id, work.sequence);
            }

            match work.role {
                MessageRole::Prndl => self.shared.common.lock().vehicle.mark_gear_outdated(),
                MessageRole::VehicleSpeed => {
                    self.shared.common.lock().vehicle.mark_speed_outdated();
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asi_protocol::ids;
    use asi_state::{AsiState, MsgIntegrityData};

    fn task() -> CycleCountUpdaterTask {
        let shared = SharedState::new();
        shared.machine.lock().state = AsiState::NormalOperation;
        CycleCountUpdaterTask::new(shared)
    }

    #[test]
    fn test_counter_advances_every_tick() {
        let mut task = task();
        task.tick();
        task.tick();
        assert_eq!(task.shared.common.lock().cycle_counter, 2);
    }

    #[test]
    fn test_status_notification_every_twenty_cycles() {
        let mut task = task();
        for _ in 0..STATUS_NOTIFICATION_CYCLES {
            task.tick();
        }
        let common = task.shared.common.lock();
        assert_eq!(common.approved.len(), 1);
        assert_eq!(
            common.approved.front().map(|m| m.id),
            Some(ids::interlock::STATUS_NOTIFICATION)
        );
    }

    #[test]
    fn test_ack_timeout_raises_event_and_notification() {
        let mut task = task();
        task.shared
            .tracker
            .lock()
            .track
            .insert(MsgIntegrityData::new(
                ids::action_request::ACTIVATE_HORN,
                42,
                MessageRole::ActivateHorn,
            ))
            .expect("insert");

        // 35 cycles to the ack deadline.
        for _ in 0..35 {
            task.tick();
        }

        assert!(task.shared.tracker.lock().track.is_empty());
        assert!(task.shared.fault.lock().queue.contains(EventId::AckLoss));

        let common = task.shared.common.lock();
        let notification = common
            .approved
            .iter()
            .find(|m| m.id == ids::interlock::ACTION_NOTIFICATION)
            .expect("action notification");
        assert_eq!(notification.value[0], Disposition::TimeoutLimit.code());
    }

    #[test]
    fn test_cyclic_prndl_keeps_entry_and_marks_outdated() {
        let mut task = task();
        task.shared
            .tracker
            .lock()
            .track
            .insert(MsgIntegrityData::new(
                ids::control_module::PRNDL,
                0,
                MessageRole::Prndl,
            ))
            .expect("insert");
        task.shared
            .common
            .lock()
            .vehicle
            .update_gear(0)
            .expect("gear");

        for _ in 0..25 {
            task.tick();
        }

        // Entry kept, counter reset, cache flagged.
        let tracker = task.shared.tracker.lock();
        let entry = tracker.track.iter().next().expect("entry kept");
        assert_eq!(entry.elapsed_response_cycles, 0);
        drop(tracker);

        assert!(task.shared.common.lock().vehicle.gear_outdated);
        assert!(
            task.shared
                .fault
                .lock()
                .queue
                .contains(EventId::VehicleStatusTimeout)
        );
    }

    #[test]
    fn test_calib_timeout_garbage_collects_buffers() {
        use asi_protocol::MessageClass;
        use asi_state::ProcessMsgData;

        let mut task = task();
        task.shared
            .tracker
            .lock()
            .track
            .insert(MsgIntegrityData::new(
                ids::interlock::CALIB_REQUEST,
                7,
                MessageRole::CalibRequest,
            ))
            .expect("insert");
        {
            let mut calib = task.shared.calib.lock();
            let entry = ProcessMsgData {
                id: ids::interlock::CALIB_REQUEST,
                sequence: 7,
                class: MessageClass::CalibReadback,
                length: 8,
                value: [1; 8],
            };
            calib.copy.push(entry).expect("copy");
            calib.readback.push(entry).expect("readback");
        }

        for _ in 0..50 {
            task.tick();
        }

        let calib = task.shared.calib.lock();
        assert!(calib.copy.is_empty());
        assert!(calib.readback.is_empty());
        drop(calib);
        assert!(
            task.shared
                .fault
                .lock()
                .queue
                .contains(EventId::CalReadbackTimeout)
        );
    }
}
