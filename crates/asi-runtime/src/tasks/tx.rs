//! TX: dequeue, stamp, rate-limit, transmit, track.

use std::time::Instant;

use asi_events::EventId;
use asi_protocol::{Disposition, Frame, MessageRole, Peer, SequenceSource};
use asi_scheduler::{PeriodicTask, TaskSpec};
use asi_state::{AsiState, LinkState, MsgIntegrityData, ProcessMsgData, SharedState};
use tracing::{debug, trace};

use crate::report::{action_notification, enqueue_notification, raise_event, unix_seconds};
use crate::socket::SharedSocket;

use super::TX_TASK;

/// Which queue this tick drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Approved,
    SafeState,
}

/// The transmit task.
#[derive(Debug)]
pub struct TxTask {
    shared: SharedState,
    sockets: [SharedSocket; 2],
}

impl TxTask {
    /// Create the task over the shared region and both peer sockets
    /// (indexed by [`Peer::index`]).
    pub fn new(shared: SharedState, sockets: [SharedSocket; 2]) -> Self {
        Self { shared, sockets }
    }

    fn source_for(state: AsiState) -> Option<Source> {
        match state {
            AsiState::NormalOperation | AsiState::StartupTest => Some(Source::Approved),
            AsiState::SafeState => Some(Source::SafeState),
            AsiState::Initial => None,
        }
    }

    /// One transmit attempt. Returns the peer and sealed frame, or None
    /// when there is nothing sendable this tick.
    fn prepare(&mut self, source: Source) -> Option<(Peer, MessageRole, ProcessMsgData, Frame)> {
        let mut common = self.shared.common.lock();

        let queue = match source {
            Source::Approved => &common.approved,
            Source::SafeState => &common.safe_state,
        };
        let head = queue.front().copied()?;

        let Ok(role) = MessageRole::from_id(head.id) else {
            // Unroutable queue entry: drop it rather than wedge the queue.
            let _ = match source {
                Source::Approved => common.approved.pop_front(),
                Source::SafeState => common.safe_state.pop_front(),
            };
            drop(common);
            debug!(id = head.id, "unroutable queue entry dropped");
            raise_event(&self.shared, EventId::MsgLoss);
            return None;
        };

        // Safe-state traffic only ever goes to the CM.
        let peer = match source {
            Source::Approved => role.tx_peer(),
            Source::SafeState => Peer::Cm,
        };

        if common.connections[peer.index()].state != LinkState::Connected {
            trace!(%peer, "peer not connected, message stays queued");
            return None;
        }

        let msg = match source {
            Source::Approved => common.approved.pop_front(),
            Source::SafeState => common.safe_state.pop_front(),
        }?;

        let profile = role.profile();
        let sequence = match profile.sequence_source {
            SequenceSource::Asi => common.registers.asi_sequence(role),
            SequenceSource::Peer => msg.sequence,
        };
        let rolling = common.registers.tx_rolling(role).wrapping_add(1);
        drop(common);

        let mut frame = Frame::sealed(msg.class, msg.id, sequence, msg.length, msg.value);
        frame.rolling_counter = rolling;
        frame.timestamp_s = unix_seconds();

        Some((peer, role, msg, frame))
    }

    fn transmit(&mut self, peer: Peer, role: MessageRole, msg: &ProcessMsgData, frame: &Frame) {
        let sent = {
            self.sockets[peer.index()]
                .lock()
                .send(&frame.encode())
                .map_err(|err| err.kind())
        };

        match sent {
            Ok(()) => self.after_send(peer, role, msg, frame),
            Err(kind) => {
                debug!(%peer, ?kind, "transmit failed");
                {
                    self.sockets[peer.index()].lock().close();
                }
                self.shared.common.lock().connections[peer.index()].set_state(LinkState::Error);
                if role.is_action_request() {
                    enqueue_notification(
                        &self.shared,
                        action_notification(msg.id, Disposition::TransmissionFailed),
                    );
                }
            }
        }
    }

    fn after_send(&mut self, peer: Peer, role: MessageRole, msg: &ProcessMsgData, frame: &Frame) {
        trace!(%peer, id = msg.id, sequence = frame.sequence, "frame transmitted");

        let profile = role.profile();

        // Persist the counter the frame carried; the ASI sequence only
        // advances for ASI-sourced sends.
        {
            let mut common = self.shared.common.lock();
            let _ = common.registers.bump_tx_rolling(role);
            if profile.sequence_source == SequenceSource::Asi {
                let _ = common.registers.bump_asi_sequence(role);
            }
        }

        // Begin response tracking for sends that expect one.
        if profile.track_cycles && !profile.is_cyclic {
            let tracked = {
                self.shared
                    .tracker
                    .lock()
                    .track
                    .insert(MsgIntegrityData::new(msg.id, frame.sequence, role))
            };
            if tracked.is_err() {
                debug!(id = msg.id, "tracker full, response will not be supervised");
            }
        }

        // Calibration requests keep a copy for readback comparison.
        if role == MessageRole::CalibRequest {
            let mut copy = *msg;
            copy.sequence = frame.sequence;
            if self.shared.calib.lock().copy.push(copy).is_err() {
                debug!("calibration copy buffer full");
            }
        }

        if role.is_action_request() && peer == Peer::Cm {
            enqueue_notification(
                &self.shared,
                action_notification(msg.id, Disposition::ApprovedRequest),
            );
        }
    }
}

impl PeriodicTask for TxTask {
    fn spec(&self) -> TaskSpec {
        TX_TASK
    }

    fn tick(&mut self) {
        let state = { self.shared.machine.lock().state };
        let Some(source) = Self::source_for(state) else {
            return;
        };

        let Some((peer, role, msg, frame)) = self.prepare(source) else {
            return;
        };

        // Fixed-window rate limiting; denials toward the CM are reported
        // back to the VAM.
        let permitted = { self.shared.tx.lock().limiter.check_limit(Instant::now()) };
        if !permitted {
            debug!(id = msg.id, "rate limiter dropped message");
            if peer == Peer::Cm {
                enqueue_notification(
                    &self.shared,
                    action_notification(msg.id, Disposition::RateLimiterDrop),
                );
            }
            return;
        }

        self.transmit(peer, role, &msg, &frame);
    }
}
