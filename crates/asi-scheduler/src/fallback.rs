//! Fallback real-time setup for non-Linux systems.

use crate::rt_setup::RtSetup;

/// Apply RT setup (no-op outside Linux).
pub fn apply_rt_setup(_setup: &RtSetup, _priority: u8) {}
