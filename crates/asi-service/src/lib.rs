//! The `asid` daemon: parent/child supervision around the ASI worker
//! runtime.
//!
//! The parent forks one worker child and monitors it: every two seconds
//! it refreshes its storage copy of the shared region, and on an
//! unexpected child exit it reforks with a soft restart so the child
//! reloads state from the storage files instead of zero-initialising.
//! Five child restarts inside the monitoring window take the parent
//! down too.

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod config;
pub mod logging;
pub mod signals;
pub mod supervisor;

pub use config::ServiceConfig;
pub use supervisor::{run_parent, run_worker};
