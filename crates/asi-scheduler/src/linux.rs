//! Linux-specific real-time setup.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::rt_setup::RtSetup;

static MEMORY_LOCKED: AtomicBool = AtomicBool::new(false);

/// Apply Linux-specific RT setup to the calling thread.
///
/// Both calls are best-effort: without `CAP_SYS_NICE` or an `RLIMIT_RTPRIO`
/// grant they fail, and the worker runs under the default policy.
pub fn apply_rt_setup(setup: &RtSetup, priority: u8) {
    if setup.fifo_scheduling {
        let param = libc::sched_param {
            sched_priority: i32::from(priority.clamp(1, 99)),
        };

        // SAFETY: pid 0 targets the calling thread; `param` outlives the call.
        let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
        if rc != 0 {
            tracing::debug!(priority, "SCHED_FIFO not granted, running best-effort");
        }
    }

    if setup.lock_memory && !MEMORY_LOCKED.swap(true, Ordering::SeqCst) {
        // SAFETY: mlockall takes flag bits only and affects the whole process.
        let rc = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
        if rc != 0 {
            tracing::debug!("mlockall not granted, pages stay swappable");
        }
    }
}
