//! Diagnostics: connection supervision and the independent
//! state-transition monitor.

use std::time::Duration;

use asi_events::EventId;
use asi_protocol::Peer;
use asi_scheduler::{PeriodicTask, TaskSpec};
use asi_state::{AsiState, LinkState, SharedState};
use tracing::{debug, warn};

use crate::report::raise_event;
use crate::socket::{ProbeOutcome, SharedSocket};

use super::DIAG_TASK;

/// Reconnect attempts per diagnostics tick.
pub const RECONNECT_ATTEMPTS: u32 = 3;

/// Spacing between reconnect attempts.
pub const RECONNECT_SPACING: Duration = Duration::from_millis(100);

/// Stable diagnostics cycles between active probes (25 × 200 ms = 5 s).
pub const PROBE_INTERVAL_CYCLES: u16 = 25;

/// The diagnostics task.
#[derive(Debug)]
pub struct DiagnosticsTask {
    shared: SharedState,
    sockets: [SharedSocket; 2],
    last_link: [LinkState; 2],
    last_machine: AsiState,
    flag_mismatch_seen: bool,
}

impl DiagnosticsTask {
    /// Create the task over the shared region and both peer sockets
    /// (indexed by [`Peer::index`]).
    pub fn new(shared: SharedState, sockets: [SharedSocket; 2]) -> Self {
        Self {
            shared,
            sockets,
            last_link: [LinkState::Disconnected; 2],
            last_machine: AsiState::Initial,
            flag_mismatch_seen: false,
        }
    }

    fn supervise_link(&mut self, peer: Peer) {
        let idx = peer.index();
        let current = { self.shared.common.lock().connections[idx].state };

        if self.last_link[idx] == LinkState::Connected && current != LinkState::Connected {
            warn!(%peer, ?current, "connection lost");
            raise_event(&self.shared, EventId::LossComm);
        }

        match current {
            LinkState::Disconnected | LinkState::Error => {
                self.reconnect(peer);
            }
            LinkState::Connecting => {
                // A previous attempt is still reflected; try again.
                self.reconnect(peer);
            }
            LinkState::Connected => {
                let due = {
                    let mut common = self.shared.common.lock();
                    common.connections[idx].mark_stable_cycle();
                    let cycles = common.connections[idx].stable_cycles;
                    cycles > 0 && cycles % PROBE_INTERVAL_CYCLES == 0
                };
                if due {
                    self.probe(peer);
                }
            }
        }

        self.last_link[idx] = { self.shared.common.lock().connections[idx].state };
    }

    fn reconnect(&mut self, peer: Peer) {
        let idx = peer.index();
        {
            self.shared.common.lock().connections[idx].set_state(LinkState::Connecting);
        }

        for attempt in 1..=RECONNECT_ATTEMPTS {
            let connected = { self.sockets[idx].lock().connect().is_ok() };
            if connected {
                let mut common = self.shared.common.lock();
                common.connections[idx].set_state(LinkState::Connected);
                // Fresh stream, fresh counter history.
                common.registers.reset_peer_roles(peer);
                debug!(%peer, attempt, "reconnected");
                return;
            }
            if attempt < RECONNECT_ATTEMPTS {
                std::thread::sleep(RECONNECT_SPACING);
            }
        }

        {
            self.shared.common.lock().connections[idx].set_state(LinkState::Disconnected);
        }
        debug!(%peer, "reconnect attempts exhausted");
        raise_event(&self.shared, EventId::ConnRetryExhausted);
    }

    fn probe(&mut self, peer: Peer) {
        let idx = peer.index();
        let outcome = { self.sockets[idx].lock().probe() };
        match outcome {
            ProbeOutcome::Healthy => {}
            ProbeOutcome::Degraded => {
                debug!(%peer, "link degraded");
            }
            ProbeOutcome::Failed => {
                {
                    self.sockets[idx].lock().close();
                }
                self.shared.common.lock().connections[idx].set_state(LinkState::Error);
            }
        }
    }

    /// Watch for illegal transitions and flag/state mismatches,
    /// independently of the state machine task.
    fn monitor_machine(&mut self) {
        let (state, critical) = {
            let machine = self.shared.machine.lock();
            (machine.state, machine.critical_fault_flag)
        };

        if !AsiState::transition_allowed(self.last_machine, state) {
            warn!(from = ?self.last_machine, to = ?state, "illegal transition observed");
            raise_event(&self.shared, EventId::SmTransition);
        }

        // The machine has a full tick to honour the flag; only a
        // mismatch that persists across two diagnostics ticks is an
        // anomaly.
        if critical && state != AsiState::SafeState {
            if self.flag_mismatch_seen {
                warn!(?state, "critical flag set but not in safe state");
                raise_event(&self.shared, EventId::SmTransition);
            }
            self.flag_mismatch_seen = true;
        } else {
            self.flag_mismatch_seen = false;
        }

        self.last_machine = state;
    }
}

impl PeriodicTask for DiagnosticsTask {
    fn spec(&self) -> TaskSpec {
        DIAG_TASK
    }

    fn tick(&mut self) {
        for peer in Peer::both() {
            self.supervise_link(peer);
        }
        self.monitor_machine();
    }
}
