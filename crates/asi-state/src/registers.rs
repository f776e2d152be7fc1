//! Per-role rolling-counter and sequence registers.

use asi_protocol::{MessageRole, Peer, ROLE_COUNT};
use serde::{Deserialize, Serialize};

/// Per-role 16-bit counter registers for both directions, wrapping mod
/// 2^16.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CounterRegisters {
    tx_rolling: [u16; ROLE_COUNT],
    rx_rolling: [u16; ROLE_COUNT],
    asi_sequence: [u16; ROLE_COUNT],
}

impl CounterRegisters {
    /// Create zeroed registers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current TX rolling counter for `role`.
    pub fn tx_rolling(&self, role: MessageRole) -> u16 {
        self.tx_rolling[role.index()]
    }

    /// Increment the TX rolling counter for `role`, wrapping.
    pub fn bump_tx_rolling(&mut self, role: MessageRole) -> u16 {
        let slot = &mut self.tx_rolling[role.index()];
        *slot = slot.wrapping_add(1);
        *slot
    }

    /// Last recorded RX rolling counter for `role`.
    pub fn rx_rolling(&self, role: MessageRole) -> u16 {
        self.rx_rolling[role.index()]
    }

    /// Record the RX rolling counter for `role`.
    pub fn set_rx_rolling(&mut self, role: MessageRole, value: u16) {
        self.rx_rolling[role.index()] = value;
    }

    /// Current ASI sequence register for `role`.
    pub fn asi_sequence(&self, role: MessageRole) -> u16 {
        self.asi_sequence[role.index()]
    }

    /// Increment the ASI sequence register for `role`, wrapping.
    pub fn bump_asi_sequence(&mut self, role: MessageRole) -> u16 {
        let slot = &mut self.asi_sequence[role.index()];
        *slot = slot.wrapping_add(1);
        *slot
    }

    /// Zero the TX and RX rolling counters for every role exchanged with
    /// the given peer.
    ///
    /// Called on a peer's transition to connected; the rolling-counter
    /// history on a fresh connection is meaningless.
    pub fn reset_peer_roles(&mut self, peer: Peer) {
        for role in MessageRole::all() {
            if role.tx_peer() == peer {
                self.tx_rolling[role.index()] = 0;
            }
            if role.rx_peer() == Some(peer) {
                self.rx_rolling[role.index()] = 0;
            }
        }
    }
}

/// Rolling-counter delta between a stored value and a received value.
pub fn rolling_delta(last: u16, received: u16) -> u16 {
    received.wrapping_sub(last)
}
