//! Event taxonomy and severity-ranked event queue for the ASI runtime.
//!
//! Every anomaly the interlock can observe is one of the enumerated
//! [`EventId`]s. Tasks raise events into the bounded [`EventQueue`]; the
//! fault manager drains it in severity order, one event in flight at a
//! time. Each admission stamps the shared [`SystemSnapshot`] slot so the
//! processed event carries the vehicle state that was current when it was
//! last raised.
//!
//! # Admission policy
//!
//! The queue holds at most [`EventQueue::CAPACITY`] entries. When full,
//! an incoming event replaces the least-severe queued entry only if it is
//! strictly more severe; otherwise the incoming event is dropped. A
//! critical event therefore can never be crowded out by noise.
//!
//! # RT-Safety
//!
//! - No heap allocations after initialization
//! - All queue operations are bounded linear scans over at most 32 entries

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod error;
mod events;
mod queue;
mod snapshot;

pub use error::{EventError, EventResult};
pub use events::{EVENT_COUNT, EventId, Severity};
pub use queue::{Admission, EventQueue, OccurrenceCounters};
pub use snapshot::SystemSnapshot;
