//! Per-peer connection state.

pub use asi_protocol::Peer;
use serde::{Deserialize, Serialize};

/// Connection lifecycle of one peer link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    /// No socket.
    Disconnected,
    /// Connect in progress.
    Connecting,
    /// Stream established.
    Connected,
    /// Transport fault observed; awaiting reconnect.
    Error,
}

/// Connection state plus the stable-cycle counter used to throttle
/// active health probes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Current link state.
    pub state: LinkState,
    /// Diagnostics ticks the link has been continuously connected.
    pub stable_cycles: u16,
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        Self {
            state: LinkState::Disconnected,
            stable_cycles: 0,
        }
    }
}

impl ConnectionInfo {
    /// Record a state change, resetting the stable-cycle counter when the
    /// link leaves `Connected`.
    pub fn set_state(&mut self, state: LinkState) {
        if state != LinkState::Connected {
            self.stable_cycles = 0;
        }
        self.state = state;
    }

    /// Count one diagnostics tick of uninterrupted connection.
    pub fn mark_stable_cycle(&mut self) {
        if self.state == LinkState::Connected {
            self.stable_cycles = self.stable_cycles.saturating_add(1);
        }
    }
}
