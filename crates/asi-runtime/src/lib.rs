//! The ASI worker runtime.
//!
//! Eight cooperating periodic tasks mediate between the Vehicle
//! Automation Module and the vehicle Control Module:
//!
//! ```text
//! VAM ──► RX ──► integrity checks ──► incoming ──► Approver ──► approved ──► TX ──► CM
//!                      │                                                      │
//!                      ├──► cycle tracker (per-message deadlines)             │
//!                      ▼                                                      ▼
//!                 FaultManager ◄── events ◄── {all tasks, StateMachine, Diagnostics}
//!                      │
//!                      ▼
//!                 safe-state queue ──► TX (CM only, in Safe State)
//! ```
//!
//! The crate wires the shared region (`asi-state`) to the scheduler
//! (`asi-scheduler`); anomalies become events (`asi-events`) processed
//! by the fault manager, and a critical event latches the fault flag
//! that drives the supervisor state machine into its terminal Safe
//! State.

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod approver;
pub mod error;
pub mod eventlog;
pub mod report;
pub mod runtime;
pub mod socket;
pub mod startup;
pub mod tasks;

pub use approver::{ACTION_REQUEST_BUDGET, ActionApprover, ApprovalOutcome, PreconditionApprover};
pub use error::{RuntimeError, RuntimeResult};
pub use eventlog::{EventLogger, MAX_BACKUPS, MAX_LOG_SIZE};
pub use runtime::{
    DEFAULT_CM_ADDR, DEFAULT_VAM_ADDR, RuntimeConfig, SNAPSHOT_INTERVAL, WorkerRuntime,
};
pub use socket::{PeerSocket, ProbeOutcome, RecvOutcome, SharedSocket};
pub use startup::{MemoryStartupTest, StartupOutcome, StartupTest};
