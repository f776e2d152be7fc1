//! RX: poll the peer sockets, validate, route.

use std::time::Instant;

use asi_events::EventId;
use asi_protocol::{Frame, MessageClass, MessageRole, Peer, ids};
use asi_scheduler::{PeriodicTask, TaskSpec};
use asi_state::{AsiState, LinkState, ProcessMsgData, SharedState, registers::rolling_delta};
use tracing::{debug, trace};

use crate::report::raise_event;
use crate::socket::{RecvOutcome, SharedSocket};

use super::RX_TASK;

/// Consecutive failures after which CRC and rolling-counter errors
/// escalate to events.
pub const ERROR_ESCALATION_THRESHOLD: u8 = 3;

/// Admissible rolling-counter advance per received frame.
pub const ROLLING_DELTA_RANGE: core::ops::RangeInclusive<u16> = 1..=3;

/// The receive task.
#[derive(Debug)]
pub struct RxTask {
    shared: SharedState,
    sockets: [SharedSocket; 2],
}

impl RxTask {
    /// Create the task over the shared region and both peer sockets
    /// (indexed by [`Peer::index`]).
    pub fn new(shared: SharedState, sockets: [SharedSocket; 2]) -> Self {
        Self { shared, sockets }
    }

    fn poll_peer(&mut self, peer: Peer) {
        // In Safe State the VAM no longer gets a say.
        let state = { self.shared.machine.lock().state };
        if state == AsiState::SafeState && peer == Peer::Vam {
            return;
        }

        let link = { self.shared.common.lock().connections[peer.index()].state };
        if link != LinkState::Connected {
            return;
        }

        let outcome = { self.sockets[peer.index()].lock().try_recv_record() };
        match outcome {
            RecvOutcome::WouldBlock => {}
            RecvOutcome::Closed => {
                debug!(%peer, "peer closed the stream");
                self.shared.common.lock().connections[peer.index()]
                    .set_state(LinkState::Disconnected);
            }
            RecvOutcome::Error(err) => {
                debug!(%peer, %err, "receive failed");
                self.shared.common.lock().connections[peer.index()].set_state(LinkState::Error);
            }
            RecvOutcome::Short(n) => {
                debug!(%peer, bytes = n, "short record discarded");
                raise_event(&self.shared, EventId::MsgLoss);
            }
            RecvOutcome::Data(buf) => self.process_record(peer, &buf),
        }
    }

    fn process_record(&mut self, peer: Peer, buf: &[u8]) {
        let frame = match Frame::decode(buf) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(%peer, %err, "record failed structural validation");
                raise_event(&self.shared, EventId::MsgTypeLength);
                return;
            }
        };

        // Action requests start their 50 ms processing clock at receive
        // time, before any further validation.
        if frame.class == MessageClass::ActionRequest {
            self.shared
                .common
                .lock()
                .pending_actions
                .insert(frame.id, frame.sequence, Instant::now());
        }

        if frame.check_length().is_err() {
            debug!(%peer, id = frame.id, length = frame.length, "length not admissible");
            raise_event(&self.shared, EventId::MsgTypeLength);
            return;
        }

        if let Err(err) = frame.check_crc() {
            debug!(%peer, id = frame.id, %err, "crc mismatch");
            if let Ok(role) = MessageRole::from_id(frame.id) {
                let escalate = {
                    let mut rx = self.shared.rx.lock();
                    let slot = &mut rx.crc_errors[role.index()];
                    *slot = slot.saturating_add(1);
                    if *slot >= ERROR_ESCALATION_THRESHOLD {
                        *slot = 0;
                        true
                    } else {
                        false
                    }
                };
                if escalate {
                    raise_event(&self.shared, EventId::MsgCrcCheck);
                }
            }
            return;
        }

        let role = match MessageRole::from_id(frame.id) {
            Ok(role) => role,
            Err(err) => {
                debug!(%peer, %err, "id not in dictionary");
                raise_event(&self.shared, EventId::MsgLoss);
                return;
            }
        };

        // A clean frame resets the consecutive-error counters for its
        // role.
        {
            let mut rx = self.shared.rx.lock();
            rx.crc_errors[role.index()] = 0;
        }

        // Failure reports short-circuit everything else.
        match role {
            MessageRole::CriticalFail => {
                raise_event(&self.shared, EventId::EcuCriticalFail);
                return;
            }
            MessageRole::NonCriticalFail => {
                raise_event(&self.shared, EventId::EcuNonCriticalFail);
                return;
            }
            _ => {}
        }

        let profile = role.profile();

        if profile.check_rolling_counter && !self.rolling_counter_ok(role, &frame) {
            return;
        }

        self.update_tracking(role, &frame);
        self.route(peer, role, &frame);
    }

    /// Validate the rolling-counter delta, recording the new value on
    /// success and escalating on the third consecutive failure.
    fn rolling_counter_ok(&mut self, role: MessageRole, frame: &Frame) -> bool {
        let accepted = {
            let mut common = self.shared.common.lock();
            let last = common.registers.rx_rolling(role);
            let delta = rolling_delta(last, frame.rolling_counter);
            if ROLLING_DELTA_RANGE.contains(&delta) {
                common.registers.set_rx_rolling(role, frame.rolling_counter);
                true
            } else {
                trace!(?role, last, received = frame.rolling_counter, "rolling counter skip");
                false
            }
        };

        if accepted {
            self.shared.rx.lock().roll_errors[role.index()] = 0;
            return true;
        }

        let escalate = {
            let mut rx = self.shared.rx.lock();
            let slot = &mut rx.roll_errors[role.index()];
            *slot = slot.saturating_add(1);
            if *slot >= ERROR_ESCALATION_THRESHOLD {
                *slot = 0;
                true
            } else {
                false
            }
        };
        if escalate {
            raise_event(&self.shared, EventId::RollCount);
        }
        false
    }

    /// Clear or refresh the tracked instance this frame answers.
    fn update_tracking(&mut self, role: MessageRole, frame: &Frame) {
        let profile = role.profile();

        if profile.is_cyclic {
            let refreshed = { self.shared.tracker.lock().track.refresh_cyclic(frame.id) };
            if !refreshed {
                trace!(id = frame.id, "cyclic arrival without a standing entry");
            }
            return;
        }

        match frame.class {
            MessageClass::Ack => {
                let acked_id = u16::from_le_bytes([frame.value[1], frame.value[2]]);
                let check_sequence = MessageRole::from_id(acked_id)
                    .map(|acked| acked.profile().check_sequence)
                    .unwrap_or(true);
                let cleared = {
                    self.shared.tracker.lock().track.clear_matching(
                        acked_id,
                        frame.sequence,
                        asi_protocol::ClearCondition::Ack,
                        check_sequence,
                    )
                };
                if cleared.is_none() {
                    debug!(acked_id, sequence = frame.sequence, "ack for nothing tracked");
                }
            }
            MessageClass::CalibReadback => {
                let _ = self.shared.tracker.lock().track.clear_matching(
                    ids::interlock::CALIB_REQUEST,
                    frame.sequence,
                    asi_protocol::ClearCondition::Readback,
                    true,
                );
            }
            _ => {}
        }
    }

    /// Save the payload where it belongs.
    fn route(&mut self, peer: Peer, role: MessageRole, frame: &Frame) {
        match frame.class {
            MessageClass::ActionRequest => {
                let pushed = {
                    self.shared
                        .common
                        .lock()
                        .incoming
                        .push_back(ProcessMsgData::from_frame(frame))
                };
                if pushed.is_err() {
                    debug!(id = frame.id, "incoming queue full, request dropped");
                    raise_event(&self.shared, EventId::MsgLoss);
                }
            }
            MessageClass::StatusFromCm => {
                let update = {
                    let mut common = self.shared.common.lock();
                    match role {
                        MessageRole::Prndl => common.vehicle.update_gear(frame.value[0]),
                        MessageRole::VehicleSpeed => {
                            let raw = u16::from_le_bytes([frame.value[0], frame.value[1]]);
                            common.vehicle.update_speed(raw)
                        }
                        MessageRole::RainSensor => {
                            common.vehicle.update_rain(frame.value[0]);
                            Ok(())
                        }
                        _ => Ok(()),
                    }
                };
                if let Err(err) = update {
                    debug!(%peer, %err, "vehicle status rejected");
                    raise_event(&self.shared, EventId::VehicleStatusInvalid);
                }
            }
            MessageClass::Ack => {
                if frame.value[0] == 1 {
                    raise_event(&self.shared, EventId::AckUnsuccess);
                }
            }
            MessageClass::CalibReadback => {
                // Readback entries are keyed by the request id they echo
                // so the copy/readback match is on identical (id, seq).
                let mut entry = ProcessMsgData::from_frame(frame);
                entry.id = ids::interlock::CALIB_REQUEST;
                let pushed = { self.shared.calib.lock().readback.push(entry) };
                if pushed.is_err() {
                    debug!("readback buffer full, echo dropped");
                    raise_event(&self.shared, EventId::MsgLoss);
                }
            }
            MessageClass::Notification => {
                trace!(%peer, id = frame.id, "peer notification ignored");
            }
        }
    }
}

impl PeriodicTask for RxTask {
    fn spec(&self) -> TaskSpec {
        RX_TASK
    }

    fn tick(&mut self) {
        for peer in Peer::both() {
            self.poll_peer(peer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    use crate::socket::PeerSocket;

    fn harness() -> RxTask {
        let shared = SharedState::new();
        shared.machine.lock().state = AsiState::NormalOperation;
        let vam = Arc::new(Mutex::new(PeerSocket::new(
            Peer::Vam,
            "127.0.0.1:1".parse().expect("addr"),
        )));
        let cm = Arc::new(Mutex::new(PeerSocket::new(
            Peer::Cm,
            "127.0.0.1:2".parse().expect("addr"),
        )));
        RxTask::new(shared, [vam, cm])
    }

    fn action_frame(sequence: u16) -> Frame {
        let mut frame = Frame::sealed(
            MessageClass::ActionRequest,
            ids::action_request::ACTIVATE_HORN,
            sequence,
            8,
            [1, 0, 0, 0, 0, 0, 0, 0],
        );
        frame.rolling_counter = 1;
        frame
    }

    #[test]
    fn test_valid_action_request_lands_in_incoming_queue() {
        let mut task = harness();
        task.process_record(Peer::Vam, &action_frame(42).encode());

        let common = task.shared.common.lock();
        assert_eq!(common.incoming.len(), 1);
        assert_eq!(common.incoming.front().map(|m| m.sequence), Some(42));
        // The processing clock started.
        drop(common);
        assert!(
            task.shared
                .common
                .lock()
                .pending_actions
                .take(ids::action_request::ACTIVATE_HORN, 42)
                .is_some()
        );
    }

    #[test]
    fn test_crc_failure_escalates_on_third_consecutive() {
        let mut task = harness();
        let mut frame = action_frame(1);
        frame.crc ^= 0xFFFF;

        for _ in 0..2 {
            task.process_record(Peer::Vam, &frame.encode());
            assert!(!task.shared.fault.lock().queue.contains(EventId::MsgCrcCheck));
        }
        task.process_record(Peer::Vam, &frame.encode());
        assert!(task.shared.fault.lock().queue.contains(EventId::MsgCrcCheck));

        // Nothing was routed.
        assert!(task.shared.common.lock().incoming.is_empty());
    }

    #[test]
    fn test_length_violation_raises_type_length() {
        let mut task = harness();
        let mut frame = action_frame(1);
        frame.length = 3;

        task.process_record(Peer::Vam, &frame.encode());
        assert!(
            task.shared
                .fault
                .lock()
                .queue
                .contains(EventId::MsgTypeLength)
        );
    }

    #[test]
    fn test_rolling_counter_window() {
        let mut task = harness();

        // Delta 1: accepted.
        task.process_record(Peer::Vam, &action_frame(1).encode());
        assert_eq!(task.shared.common.lock().incoming.len(), 1);

        // Delta 3 from the last recorded value: accepted.
        let mut frame = action_frame(2);
        frame.rolling_counter = 4;
        task.process_record(Peer::Vam, &frame.encode());
        assert_eq!(task.shared.common.lock().incoming.len(), 2);

        // Delta 0: rejected.
        let mut frame = action_frame(3);
        frame.rolling_counter = 4;
        task.process_record(Peer::Vam, &frame.encode());
        assert_eq!(task.shared.common.lock().incoming.len(), 2);

        // Delta 4: rejected.
        let mut frame = action_frame(4);
        frame.rolling_counter = 8;
        task.process_record(Peer::Vam, &frame.encode());
        assert_eq!(task.shared.common.lock().incoming.len(), 2);
    }

    #[test]
    fn test_rolling_counter_escalates_on_third_failure() {
        let mut task = harness();
        for sequence in 0..3 {
            let mut frame = action_frame(sequence);
            frame.rolling_counter = 500; // far outside the window
            task.process_record(Peer::Vam, &frame.encode());
        }
        assert!(task.shared.fault.lock().queue.contains(EventId::RollCount));
    }

    #[test]
    fn test_critical_fail_raises_and_stops() {
        let mut task = harness();
        let mut frame = Frame::sealed(
            MessageClass::StatusFromCm,
            ids::control_module::CRITICAL_FAIL,
            1,
            2,
            [0; 8],
        );
        frame.rolling_counter = 1;

        task.process_record(Peer::Cm, &frame.encode());
        assert!(
            task.shared
                .fault
                .lock()
                .queue
                .contains(EventId::EcuCriticalFail)
        );
    }

    #[test]
    fn test_speed_update_and_range_rejection() {
        let mut task = harness();

        let mut frame = Frame::sealed(
            MessageClass::StatusFromCm,
            ids::control_module::VEHICLE_SPEED,
            1,
            2,
            [0xA0, 0x0F, 0, 0, 0, 0, 0, 0], // 4000 raw = 40.00 km/h
        );
        frame.rolling_counter = 1;
        task.process_record(Peer::Cm, &frame.encode());
        assert!((task.shared.common.lock().vehicle.speed_kph - 40.0).abs() < 1e-4);

        // 40001 raw is just over 400.00 km/h.
        let mut frame = Frame::sealed(
            MessageClass::StatusFromCm,
            ids::control_module::VEHICLE_SPEED,
            2,
            2,
            [0x41, 0x9C, 0, 0, 0, 0, 0, 0],
        );
        frame.rolling_counter = 2;
        task.process_record(Peer::Cm, &frame.encode());
        assert!(
            task.shared
                .fault
                .lock()
                .queue
                .contains(EventId::VehicleStatusInvalid)
        );
        assert!((task.shared.common.lock().vehicle.speed_kph - 40.0).abs() < 1e-4);
    }

    #[test]
    fn test_ack_clears_tracked_entry_and_flags_unsuccess() {
        use asi_state::MsgIntegrityData;

        let mut task = harness();
        task.shared
            .tracker
            .lock()
            .track
            .insert(MsgIntegrityData::new(
                ids::action_request::ACTIVATE_HORN,
                7,
                MessageRole::ActivateHorn,
            ))
            .expect("insert");

        let mut value = [0u8; 8];
        value[0] = 1; // unsuccessful
        value[1..3].copy_from_slice(&ids::action_request::ACTIVATE_HORN.to_le_bytes());
        let mut ack = Frame::sealed(MessageClass::Ack, ids::control_module::ACK, 7, 1, value);
        ack.rolling_counter = 1;

        task.process_record(Peer::Cm, &ack.encode());

        assert!(task.shared.tracker.lock().track.is_empty());
        assert!(task.shared.fault.lock().queue.contains(EventId::AckUnsuccess));
    }

    #[test]
    fn test_readback_is_normalized_and_buffered() {
        let mut task = harness();
        let mut frame = Frame::sealed(
            MessageClass::CalibReadback,
            ids::control_module::CALIB_READBACK,
            9,
            8,
            [5; 8],
        );
        frame.rolling_counter = 1;

        task.process_record(Peer::Cm, &frame.encode());

        let calib = task.shared.calib.lock();
        assert_eq!(calib.readback.len(), 1);
        assert!(calib.readback.find(ids::interlock::CALIB_REQUEST, 9).is_some());
    }
}
