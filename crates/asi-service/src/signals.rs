//! Signal handling for both processes.
//!
//! Handlers only write atomic flags (or `_exit` on a crash signal,
//! where returning to corrupted state is not an option); all real work
//! happens on the supervision loop.

use std::sync::atomic::{AtomicBool, Ordering};

/// Exit code the child uses from its crash-signal handler, so the
/// parent can tell a crash from a clean exit.
pub const CRASH_EXIT_CODE: i32 = 70;

/// Exit code the worker uses after a fatal task failure.
pub const TASK_FAILURE_EXIT_CODE: i32 = 71;

static TERMINATE: AtomicBool = AtomicBool::new(false);

/// True once a termination signal arrived.
pub fn termination_requested() -> bool {
    TERMINATE.load(Ordering::Acquire)
}

/// The flag termination signals set; the worker polls it as its
/// external shutdown.
pub fn termination_flag() -> &'static AtomicBool {
    &TERMINATE
}

/// Reset the flag (the child inherits the parent's address space).
pub fn clear_termination() {
    TERMINATE.store(false, Ordering::Release);
}

#[cfg(unix)]
extern "C" fn handle_termination(_signal: libc::c_int) {
    TERMINATE.store(true, Ordering::Release);
}

#[cfg(unix)]
extern "C" fn handle_crash(_signal: libc::c_int) {
    // The address space can no longer be trusted; leave immediately with
    // the crash marker so the parent reforks with a soft restart.
    // SAFETY: _exit is async-signal-safe.
    unsafe { libc::_exit(CRASH_EXIT_CODE) }
}

#[cfg(unix)]
fn install(signal: libc::c_int, handler: extern "C" fn(libc::c_int)) {
    // SAFETY: sigaction with a zeroed mask and a handler that only
    // touches an atomic (or calls _exit).
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handler as usize;
        libc::sigemptyset(&mut action.sa_mask);
        libc::sigaction(signal, &action, std::ptr::null_mut());
    }
}

/// Install the parent's handlers: SIGTERM and SIGINT request shutdown.
#[cfg(unix)]
pub fn install_parent_handlers() {
    install(libc::SIGTERM, handle_termination);
    install(libc::SIGINT, handle_termination);
}

/// Install the child's handlers: termination requests a flush-and-exit,
/// crash signals exit with the crash marker.
#[cfg(unix)]
pub fn install_child_handlers() {
    install(libc::SIGTERM, handle_termination);
    install(libc::SIGINT, handle_termination);
    install(libc::SIGSEGV, handle_crash);
    install(libc::SIGBUS, handle_crash);
    install(libc::SIGFPE, handle_crash);
    install(libc::SIGILL, handle_crash);
    install(libc::SIGABRT, handle_crash);
}

/// No-op outside unix.
#[cfg(not(unix))]
pub fn install_parent_handlers() {}

/// No-op outside unix.
#[cfg(not(unix))]
pub fn install_child_handlers() {}
