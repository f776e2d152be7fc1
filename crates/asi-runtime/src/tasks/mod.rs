//! The eight periodic tasks.
//!
//! Declared priorities and periods:
//!
//! | Task | Prio | Period |
//! |---|---|---|
//! | CycleCountUpdater | 90 | 25 ms |
//! | FaultManager | 80 | 25 ms |
//! | StateMachine | 80 | 50 ms |
//! | RX | 70 | 50 ms |
//! | TX | 70 | 50 ms |
//! | Approver | 60 | 50 ms |
//! | CalibReadbackVerifier | 50 | 50 ms |
//! | Diagnostics | 40 | 200 ms |

use std::time::Duration;

use asi_scheduler::TaskSpec;

pub mod approval;
pub mod calib;
pub mod cycle;
pub mod diag;
pub mod fault;
pub mod machine;
pub mod rx;
pub mod tx;

pub use approval::ApproverTask;
pub use calib::CalibVerifierTask;
pub use cycle::CycleCountUpdaterTask;
pub use diag::DiagnosticsTask;
pub use fault::FaultManagerTask;
pub use machine::StateMachineTask;
pub use rx::RxTask;
pub use tx::TxTask;

/// CycleCountUpdater: advance the global tick, age tracked messages.
pub const CYCLE_TASK: TaskSpec =
    TaskSpec::new("cycle-count-updater", 90, Duration::from_millis(25));

/// FaultManager: drain the event queue.
pub const FAULT_TASK: TaskSpec = TaskSpec::new("fault-manager", 80, Duration::from_millis(25));

/// StateMachine: state transitions.
pub const MACHINE_TASK: TaskSpec = TaskSpec::new("state-machine", 80, Duration::from_millis(50));

/// RX: poll sockets, validate, enqueue.
pub const RX_TASK: TaskSpec = TaskSpec::new("rx", 70, Duration::from_millis(50));

/// TX: dequeue, rate-limit, transmit.
pub const TX_TASK: TaskSpec = TaskSpec::new("tx", 70, Duration::from_millis(50));

/// Approver: validate requests, approve or deny.
pub const APPROVER_TASK: TaskSpec = TaskSpec::new("approver", 60, Duration::from_millis(50));

/// CalibReadbackVerifier: compare copy against readback.
pub const CALIB_TASK: TaskSpec =
    TaskSpec::new("calib-readback-verifier", 50, Duration::from_millis(50));

/// Diagnostics: connection health, state-transition monitor.
pub const DIAG_TASK: TaskSpec = TaskSpec::new("diagnostics", 40, Duration::from_millis(200));
