//! Shared-state monitors, bounded trackers, and region persistence.
//!
//! Every piece of state an ASI task may read or write lives in one
//! [`SharedState`] region partitioned into seven independent monitors:
//! six task-private cells and one common cell for data shared between
//! tasks. Handles to the cells are cloned into each task at spawn time.
//!
//! # Lock discipline
//!
//! - A task never holds two monitor locks simultaneously.
//! - Every accessor acquires, reads or writes, and releases; no accessor
//!   calls another accessor while holding a lock.
//! - All critical sections are O(1) to O(N) with N ≤ 40.
//!
//! Deadlock is impossible by construction.
//!
//! # Persistence
//!
//! The region is periodically captured into a [`RegionSnapshot`] and
//! bincode-encoded to the parent/child storage files. Writes go through a
//! temp file and an atomic rename so a crash mid-snapshot can never leave
//! a torn file behind.

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod calib;
pub mod connection;
pub mod error;
pub mod limiter;
pub mod machine;
pub mod msg;
pub mod queues;
pub mod region;
pub mod registers;
pub mod storage;
pub mod track;
pub mod vehicle;

pub use calib::{CALIB_BUFFER_CAPACITY, CalibBuffer};
pub use connection::{ConnectionInfo, LinkState, Peer};
pub use error::{StateError, StateResult};
pub use limiter::RateLimiter;
pub use machine::AsiState;
pub use msg::ProcessMsgData;
pub use queues::{BoundedQueue, MSG_QUEUE_CAPACITY};
pub use region::{
    CalibState, CommonState, FaultState, InFlightEvent, MachineState, ProcessingStage,
    RegionSnapshot, RxState, SharedState, TrackerState, TxState,
};
pub use registers::CounterRegisters;
pub use storage::{
    EventCheckpoint, SnapshotSource, StorageLayout, load_checkpoint, load_preferring_child,
    load_region, save_checkpoint, save_region,
};
pub use track::{
    CYCLE_TRACK_CAPACITY, CycleSeqTrack, MsgIntegrityData, PENDING_ACTION_CAPACITY,
    PendingActionTimers, TimeoutAction,
};
pub use vehicle::{GearPosition, VehicleCache};
