//! Property-based tests for the event queue.

use asi_events::{Admission, EVENT_COUNT, EventId, EventQueue, Severity, SystemSnapshot};
use proptest::prelude::*;

fn arb_event() -> impl Strategy<Value = EventId> {
    (1u16..=EVENT_COUNT as u16).prop_map(|code| EventId::from_code(code).expect("valid code"))
}

fn snap() -> SystemSnapshot {
    SystemSnapshot::default()
}

proptest! {
    #[test]
    fn queue_size_never_exceeds_capacity(events in prop::collection::vec(arb_event(), 0..200)) {
        let mut queue = EventQueue::new();
        for event in events {
            queue.raise(event, snap());
            prop_assert!(queue.len() <= EventQueue::CAPACITY);
        }
    }

    #[test]
    fn drain_order_is_monotonically_less_severe(
        events in prop::collection::vec(arb_event(), 1..100)
    ) {
        let mut queue = EventQueue::new();
        for event in events {
            queue.raise(event, snap());
        }

        let mut last = Severity::Critical;
        while let Some(event) = queue.pop_head() {
            prop_assert!(event.severity() <= last);
            last = event.severity();
        }
    }

    #[test]
    fn critical_events_always_admitted_over_lesser(
        filler in prop::collection::vec(arb_event(), EventQueue::CAPACITY..EventQueue::CAPACITY + 1)
    ) {
        // Fill with whatever, then force-feed a critical event: it is only
        // droppable when every queued entry is itself critical.
        let mut queue = EventQueue::new();
        for event in &filler {
            queue.raise(*event, snap());
        }

        let admitted = queue.raise(EventId::EcuCriticalFail, snap());
        let all_critical = queue.iter().all(|queued| queued.severity() == Severity::Critical);
        match admitted {
            Admission::Dropped => prop_assert!(all_critical),
            Admission::Appended | Admission::Replaced(_) => {
                prop_assert!(queue.contains(EventId::EcuCriticalFail));
            }
        }
    }

    #[test]
    fn replacement_never_evicts_more_severe(events in prop::collection::vec(arb_event(), 0..200)) {
        let mut queue = EventQueue::new();
        for event in events {
            let severity = event.severity();
            if let Admission::Replaced(evicted) = queue.raise(event, snap()) {
                prop_assert!(evicted.severity() < severity);
            }
        }
    }

    #[test]
    fn codes_round_trip_preserves_contents(events in prop::collection::vec(arb_event(), 0..40)) {
        let mut queue = EventQueue::new();
        for event in events {
            queue.raise(event, snap());
        }

        let mut restored = EventQueue::new();
        restored.restore_codes(&queue.to_codes());

        let original: Vec<EventId> = queue.iter().collect();
        let rebuilt: Vec<EventId> = restored.iter().collect();
        prop_assert_eq!(original, rebuilt);
    }
}
