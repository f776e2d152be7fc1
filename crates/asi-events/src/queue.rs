//! Severity-prioritised bounded event queue.

use crate::events::{EVENT_COUNT, EventId};
use crate::snapshot::SystemSnapshot;

/// Outcome of an admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The event was appended.
    Appended,
    /// The queue was full; the named least-severe entry was evicted.
    Replaced(EventId),
    /// The queue was full of entries at least as severe; the event was
    /// dropped.
    Dropped,
}

const QUEUE_CAPACITY: usize = 32;

/// Bounded event queue ordered by severity, FIFO within a severity.
///
/// The queue keeps a single embedded [`SystemSnapshot`] refreshed on every
/// successful admission; the fault manager attaches it to the event it is
/// currently processing.
#[derive(Debug, Default)]
pub struct EventQueue {
    entries: heapless::Vec<EventId, QUEUE_CAPACITY>,
    snapshot: Option<SystemSnapshot>,
}

impl EventQueue {
    /// Maximum number of queued events.
    pub const CAPACITY: usize = QUEUE_CAPACITY;

    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Admit an event, refreshing the snapshot slot on success.
    pub fn raise(&mut self, event: EventId, snapshot: SystemSnapshot) -> Admission {
        if self.entries.is_full() {
            // Sorted descending, so the least severe entry is last.
            let Some(&least) = self.entries.last() else {
                return Admission::Dropped;
            };
            if event.severity() <= least.severity() {
                return Admission::Dropped;
            }
            let _ = self.entries.pop();
            self.insert_sorted(event);
            self.snapshot = Some(snapshot);
            return Admission::Replaced(least);
        }

        self.insert_sorted(event);
        self.snapshot = Some(snapshot);
        Admission::Appended
    }

    fn insert_sorted(&mut self, event: EventId) {
        let severity = event.severity();
        let pos = self
            .entries
            .iter()
            .position(|queued| queued.severity() < severity)
            .unwrap_or(self.entries.len());
        // Capacity was checked by the caller; append then rotate the
        // tail so the new entry lands at its severity position.
        if self.entries.push(event).is_ok() {
            self.entries[pos..].rotate_right(1);
        }
    }

    /// Most severe queued event, without removing it.
    pub fn head(&self) -> Option<EventId> {
        self.entries.first().copied()
    }

    /// Remove and return the most severe queued event.
    pub fn pop_head(&mut self) -> Option<EventId> {
        let head = *self.entries.first()?;
        self.entries.rotate_left(1);
        let _ = self.entries.pop();
        Some(head)
    }

    /// True if the given event is currently queued.
    pub fn contains(&self, event: EventId) -> bool {
        self.entries.iter().any(|queued| *queued == event)
    }

    /// Remove the first queued occurrence of `event`.
    ///
    /// The fault manager removes the event it processed, which is no
    /// longer necessarily the head if something more severe arrived
    /// while it was in flight.
    pub fn remove_first(&mut self, event: EventId) -> bool {
        match self.entries.iter().position(|queued| *queued == event) {
            Some(idx) => {
                self.entries[idx..].rotate_left(1);
                let _ = self.entries.pop();
                true
            }
            None => false,
        }
    }

    /// Snapshot captured at the most recent admission.
    pub fn snapshot(&self) -> Option<&SystemSnapshot> {
        self.snapshot.as_ref()
    }

    /// Iterate over queued events in drain order.
    pub fn iter(&self) -> impl Iterator<Item = EventId> + '_ {
        self.entries.iter().copied()
    }

    /// Stable codes of queued events, for region persistence.
    pub fn to_codes(&self) -> Vec<u16> {
        self.entries.iter().map(|event| event.code()).collect()
    }

    /// Rebuild queue contents from persisted codes.
    ///
    /// Unknown codes are skipped; a torn snapshot must not poison the
    /// restored queue.
    pub fn restore_codes(&mut self, codes: &[u16]) {
        self.entries.clear();
        for &code in codes {
            if let Ok(event) = EventId::from_code(code) {
                if self.entries.is_full() {
                    break;
                }
                self.insert_sorted(event);
            }
        }
    }
}

/// Per-run occurrence counters, one per enumerated event.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct OccurrenceCounters {
    counts: [u32; EVENT_COUNT],
}

impl OccurrenceCounters {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter for `event` and return the new value.
    pub fn increment(&mut self, event: EventId) -> u32 {
        let slot = &mut self.counts[event.index()];
        *slot = slot.saturating_add(1);
        *slot
    }

    /// Current count for `event`.
    pub fn get(&self, event: EventId) -> u32 {
        self.counts[event.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Severity;

    fn snap() -> SystemSnapshot {
        SystemSnapshot::new(12.5, 3, 2, "1754400000".to_owned())
    }

    #[test]
    fn test_raise_and_drain_in_severity_order() {
        let mut queue = EventQueue::new();
        assert_eq!(queue.raise(EventId::LossComm, snap()), Admission::Appended);
        assert_eq!(queue.raise(EventId::MsgCrcCheck, snap()), Admission::Appended);
        assert_eq!(
            queue.raise(EventId::EcuCriticalFail, snap()),
            Admission::Appended
        );

        assert_eq!(queue.pop_head(), Some(EventId::EcuCriticalFail));
        assert_eq!(queue.pop_head(), Some(EventId::MsgCrcCheck));
        assert_eq!(queue.pop_head(), Some(EventId::LossComm));
        assert_eq!(queue.pop_head(), None);
    }

    #[test]
    fn test_fifo_within_severity() {
        let mut queue = EventQueue::new();
        queue.raise(EventId::MsgCrcCheck, snap());
        queue.raise(EventId::RollCount, snap());
        queue.raise(EventId::AckLoss, snap());

        assert_eq!(queue.pop_head(), Some(EventId::MsgCrcCheck));
        assert_eq!(queue.pop_head(), Some(EventId::RollCount));
        assert_eq!(queue.pop_head(), Some(EventId::AckLoss));
    }

    #[test]
    fn test_overflow_replaces_least_severe() {
        let mut queue = EventQueue::new();
        for _ in 0..EventQueue::CAPACITY {
            assert_eq!(queue.raise(EventId::LossComm, snap()), Admission::Appended);
        }
        assert_eq!(queue.len(), EventQueue::CAPACITY);

        let admitted = queue.raise(EventId::EcuCriticalFail, snap());
        assert_eq!(admitted, Admission::Replaced(EventId::LossComm));
        assert_eq!(queue.len(), EventQueue::CAPACITY);
        assert_eq!(queue.head(), Some(EventId::EcuCriticalFail));
    }

    #[test]
    fn test_overflow_drops_equal_severity() {
        let mut queue = EventQueue::new();
        for _ in 0..EventQueue::CAPACITY {
            queue.raise(EventId::MsgCrcCheck, snap());
        }

        // Normal against a queue full of normals: dropped, size unchanged.
        assert_eq!(queue.raise(EventId::RollCount, snap()), Admission::Dropped);
        assert_eq!(queue.len(), EventQueue::CAPACITY);
        assert!(!queue.contains(EventId::RollCount));
    }

    #[test]
    fn test_snapshot_tracks_most_recent_admission() {
        let mut queue = EventQueue::new();
        queue.raise(
            EventId::MsgCrcCheck,
            SystemSnapshot::new(1.0, 1, 1, "1".to_owned()),
        );
        queue.raise(
            EventId::RollCount,
            SystemSnapshot::new(2.0, 2, 2, "2".to_owned()),
        );

        let snapshot = queue.snapshot().expect("snapshot set");
        assert_eq!(snapshot.gear_position, 2);
    }

    #[test]
    fn test_dropped_admission_keeps_previous_snapshot() {
        let mut queue = EventQueue::new();
        for _ in 0..EventQueue::CAPACITY {
            queue.raise(
                EventId::MsgCrcCheck,
                SystemSnapshot::new(1.0, 1, 1, "1".to_owned()),
            );
        }
        queue.raise(
            EventId::RollCount,
            SystemSnapshot::new(9.0, 9, 9, "9".to_owned()),
        );

        let snapshot = queue.snapshot().expect("snapshot set");
        assert_eq!(snapshot.gear_position, 1);
    }

    #[test]
    fn test_codes_round_trip() {
        let mut queue = EventQueue::new();
        queue.raise(EventId::LossComm, snap());
        queue.raise(EventId::EcuCriticalFail, snap());
        queue.raise(EventId::MsgCrcCheck, snap());

        let codes = queue.to_codes();
        let mut restored = EventQueue::new();
        restored.restore_codes(&codes);

        assert_eq!(restored.len(), 3);
        assert_eq!(restored.pop_head(), Some(EventId::EcuCriticalFail));
    }

    #[test]
    fn test_restore_skips_unknown_codes() {
        let mut queue = EventQueue::new();
        queue.restore_codes(&[0xFFFF, EventId::RollCount.code(), 0]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.head(), Some(EventId::RollCount));
    }

    #[test]
    fn test_remove_first_targets_one_occurrence() {
        let mut queue = EventQueue::new();
        queue.raise(EventId::MsgCrcCheck, snap());
        queue.raise(EventId::EcuCriticalFail, snap());
        queue.raise(EventId::MsgCrcCheck, snap());

        assert!(queue.remove_first(EventId::MsgCrcCheck));
        assert_eq!(queue.len(), 2);
        assert!(queue.contains(EventId::MsgCrcCheck));
        assert!(!queue.remove_first(EventId::AckLoss));
    }

    #[test]
    fn test_occurrence_counters() {
        let mut counters = OccurrenceCounters::new();
        assert_eq!(counters.get(EventId::Overrun), 0);
        assert_eq!(counters.increment(EventId::Overrun), 1);
        assert_eq!(counters.increment(EventId::Overrun), 2);
        assert_eq!(counters.get(EventId::Overrun), 2);
        assert_eq!(counters.get(EventId::MsgLoss), 0);
    }

    #[test]
    fn test_severity_helper_matches_queue_order() {
        let mut queue = EventQueue::new();
        queue.raise(EventId::InitComplete, snap());
        queue.raise(EventId::MsgTimeout, snap());
        queue.raise(EventId::AckLoss, snap());

        let severities: Vec<Severity> = queue.iter().map(EventId::severity).collect();
        let mut sorted = severities.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(severities, sorted);
    }
}
