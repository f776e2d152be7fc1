//! Tracked message instances and pending action-request timing.

use std::time::Instant;

use asi_protocol::{ClearCondition, MessageClass, MessageRole};
use serde::{Deserialize, Serialize};

use crate::error::{StateError, StateResult};

/// Capacity of the cycle/sequence tracker.
pub const CYCLE_TRACK_CAPACITY: usize = 40;

/// Capacity of the pending action-request timing map.
pub const PENDING_ACTION_CAPACITY: usize = 10;

/// One tracked message instance awaiting its clear condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgIntegrityData {
    /// Message id of the tracked send (or cyclic registration).
    pub msg_id: u16,
    /// Sequence the tracked send carried.
    pub sequence: u16,
    /// Cycles elapsed since the send without a matching response.
    pub elapsed_response_cycles: u16,
    /// Role of the tracked message.
    pub role: MessageRole,
    /// What clears this instance.
    pub clear_condition: ClearCondition,
    /// Class of the tracked message.
    pub class: MessageClass,
}

impl MsgIntegrityData {
    /// Create a fresh instance with zero elapsed cycles.
    pub fn new(msg_id: u16, sequence: u16, role: MessageRole) -> Self {
        let profile = role.profile();
        Self {
            msg_id,
            sequence,
            elapsed_response_cycles: 0,
            role,
            clear_condition: profile.clear_on.unwrap_or(ClearCondition::Ack),
            class: role.class(),
        }
    }
}

/// What the aging walk does with a timed-out entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutAction {
    /// Keep the entry as is.
    Keep,
    /// Remove the entry.
    Remove,
    /// Reset the elapsed counter and keep monitoring (cyclic roles).
    ResetAndKeep,
}

/// Bounded, insertion-ordered container of tracked message instances.
///
/// Keyed by `(msg_id, sequence, clear_condition)`. The aging walk runs
/// from tail to head (newest first) so index shifts from mid-walk
/// removals cannot skip entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleSeqTrack {
    entries: Vec<MsgIntegrityData>,
}

impl CycleSeqTrack {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(CYCLE_TRACK_CAPACITY),
        }
    }

    /// Number of tracked instances.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Track a new instance, or reset the elapsed counter of an existing
    /// instance with the same key.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::TrackerFull`] when at capacity.
    pub fn insert(&mut self, entry: MsgIntegrityData) -> StateResult<()> {
        if let Some(existing) = self.entries.iter_mut().find(|e| {
            e.msg_id == entry.msg_id
                && e.sequence == entry.sequence
                && e.clear_condition == entry.clear_condition
        }) {
            existing.elapsed_response_cycles = 0;
            return Ok(());
        }

        if self.entries.len() >= CYCLE_TRACK_CAPACITY {
            return Err(StateError::TrackerFull {
                capacity: CYCLE_TRACK_CAPACITY,
            });
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Remove the instance cleared by a matching response.
    ///
    /// When `check_sequence` is false the sequence field does not
    /// participate in matching (cyclic status has no request/response
    /// pairing).
    pub fn clear_matching(
        &mut self,
        msg_id: u16,
        sequence: u16,
        condition: ClearCondition,
        check_sequence: bool,
    ) -> Option<MsgIntegrityData> {
        let idx = self.entries.iter().position(|e| {
            e.msg_id == msg_id
                && e.clear_condition == condition
                && (!check_sequence || e.sequence == sequence)
        })?;
        Some(self.entries.remove(idx))
    }

    /// Reset the elapsed counter of a cyclic instance on arrival.
    ///
    /// Returns false when the id has no standing cyclic entry.
    pub fn refresh_cyclic(&mut self, msg_id: u16) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|e| e.msg_id == msg_id && e.clear_condition == ClearCondition::Cyclic)
        {
            Some(entry) => {
                entry.elapsed_response_cycles = 0;
                true
            }
            None => false,
        }
    }

    /// Age every instance by one cycle, tail to head.
    ///
    /// The callback sees each entry after its increment and decides its
    /// fate; removal is O(1) amortised for the walk because later indices
    /// were already visited.
    pub fn age_all(&mut self, mut decide: impl FnMut(&MsgIntegrityData) -> TimeoutAction) {
        for idx in (0..self.entries.len()).rev() {
            self.entries[idx].elapsed_response_cycles =
                self.entries[idx].elapsed_response_cycles.saturating_add(1);

            match decide(&self.entries[idx]) {
                TimeoutAction::Keep => {}
                TimeoutAction::Remove => {
                    self.entries.remove(idx);
                }
                TimeoutAction::ResetAndKeep => {
                    self.entries[idx].elapsed_response_cycles = 0;
                }
            }
        }
    }

    /// Iterate over tracked instances, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &MsgIntegrityData> {
        self.entries.iter()
    }
}

/// Bounded map of `(id, sequence)` to the monotonic instant the action
/// request was received.
///
/// Consulted on approval to enforce the 50 ms action-request budget.
/// When full, the oldest pending entry is evicted.
#[derive(Debug, Default)]
pub struct PendingActionTimers {
    entries: Vec<((u16, u16), Instant)>,
}

impl PendingActionTimers {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(PENDING_ACTION_CAPACITY),
        }
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record the receive instant for an action request.
    pub fn insert(&mut self, id: u16, sequence: u16, received_at: Instant) {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|((eid, eseq), _)| *eid == id && *eseq == sequence)
        {
            existing.1 = received_at;
            return;
        }

        if self.entries.len() >= PENDING_ACTION_CAPACITY {
            self.entries.remove(0);
        }
        self.entries.push(((id, sequence), received_at));
    }

    /// Remove and return the receive instant for `(id, sequence)`.
    pub fn take(&mut self, id: u16, sequence: u16) -> Option<Instant> {
        let idx = self
            .entries
            .iter()
            .position(|((eid, eseq), _)| *eid == id && *eseq == sequence)?;
        Some(self.entries.remove(idx).1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(id: u16, seq: u16) -> MsgIntegrityData {
        MsgIntegrityData::new(id, seq, MessageRole::ActivateHorn)
    }

    #[test]
    fn test_insert_and_clear() {
        let mut track = CycleSeqTrack::new();
        track.insert(entry(0x0007, 1)).expect("insert");
        assert_eq!(track.len(), 1);

        let cleared = track.clear_matching(0x0007, 1, ClearCondition::Ack, true);
        assert!(cleared.is_some());
        assert!(track.is_empty());
    }

    #[test]
    fn test_clear_respects_sequence_check() {
        let mut track = CycleSeqTrack::new();
        track.insert(entry(0x0007, 1)).expect("insert");

        assert!(track.clear_matching(0x0007, 2, ClearCondition::Ack, true).is_none());
        assert!(track.clear_matching(0x0007, 2, ClearCondition::Ack, false).is_some());
    }

    #[test]
    fn test_reinsert_resets_elapsed() {
        let mut track = CycleSeqTrack::new();
        track.insert(entry(0x0007, 1)).expect("insert");
        track.age_all(|_| TimeoutAction::Keep);
        track.age_all(|_| TimeoutAction::Keep);
        assert_eq!(
            track.iter().next().map(|e| e.elapsed_response_cycles),
            Some(2)
        );

        track.insert(entry(0x0007, 1)).expect("reinsert");
        assert_eq!(track.len(), 1);
        assert_eq!(
            track.iter().next().map(|e| e.elapsed_response_cycles),
            Some(0)
        );
    }

    #[test]
    fn test_capacity_enforced() {
        let mut track = CycleSeqTrack::new();
        for seq in 0..CYCLE_TRACK_CAPACITY as u16 {
            track.insert(entry(1, seq)).expect("insert");
        }
        assert!(matches!(
            track.insert(entry(1, 999)),
            Err(StateError::TrackerFull { .. })
        ));
    }

    #[test]
    fn test_age_all_removes_without_skipping() {
        let mut track = CycleSeqTrack::new();
        for seq in 0..5 {
            track.insert(entry(1, seq)).expect("insert");
        }

        // Remove everything in one walk; a head-to-tail walk with naive
        // indexing would skip neighbours of removed entries.
        track.age_all(|_| TimeoutAction::Remove);
        assert!(track.is_empty());
    }

    #[test]
    fn test_age_all_reset_keeps_cyclic_entry() {
        let mut track = CycleSeqTrack::new();
        track
            .insert(MsgIntegrityData::new(0x03E8, 0, MessageRole::Prndl))
            .expect("insert");

        track.age_all(|_| TimeoutAction::ResetAndKeep);
        let tracked = track.iter().next().expect("kept");
        assert_eq!(tracked.elapsed_response_cycles, 0);
    }

    #[test]
    fn test_refresh_cyclic() {
        let mut track = CycleSeqTrack::new();
        track
            .insert(MsgIntegrityData::new(0x03E8, 0, MessageRole::Prndl))
            .expect("insert");
        track.age_all(|_| TimeoutAction::Keep);

        assert!(track.refresh_cyclic(0x03E8));
        assert_eq!(
            track.iter().next().map(|e| e.elapsed_response_cycles),
            Some(0)
        );
        assert!(!track.refresh_cyclic(0x9999));
    }

    #[test]
    fn test_pending_timers_evict_oldest() {
        let mut timers = PendingActionTimers::new();
        let base = Instant::now();
        for seq in 0..PENDING_ACTION_CAPACITY as u16 {
            timers.insert(1, seq, base);
        }
        assert_eq!(timers.len(), PENDING_ACTION_CAPACITY);

        timers.insert(1, 999, base + Duration::from_millis(1));
        assert_eq!(timers.len(), PENDING_ACTION_CAPACITY);
        assert!(timers.take(1, 0).is_none());
        assert!(timers.take(1, 999).is_some());
    }

    #[test]
    fn test_pending_timers_take_removes() {
        let mut timers = PendingActionTimers::new();
        let now = Instant::now();
        timers.insert(7, 42, now);
        assert_eq!(timers.take(7, 42), Some(now));
        assert_eq!(timers.take(7, 42), None);
    }
}
