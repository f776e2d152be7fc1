//! Parent/child supervision: fork one worker, persist, refork on
//! unexpected exit.

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use asi_runtime::{RuntimeConfig, WorkerRuntime};
use asi_scheduler::{RestartWindow, RtSetup, WorkerVerdict};
use asi_state::{StorageLayout, load_region, save_region};
use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::logging;
use crate::signals::{
    self, CRASH_EXIT_CODE, TASK_FAILURE_EXIT_CODE, install_child_handlers,
    install_parent_handlers,
};

/// How the monitored child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildExit {
    /// Still running.
    Running,
    /// Exited with the given status code.
    Exited(i32),
    /// Killed by the given signal.
    Signaled(i32),
}

/// Build the worker configuration from the service configuration.
fn runtime_config(config: &ServiceConfig, soft_restart: bool) -> RuntimeConfig {
    let mut rt = RuntimeConfig::new(&config.data_dir);
    rt.vam_addr = config.vam_addr;
    rt.cm_addr = config.cm_addr;
    rt.soft_restart = soft_restart;
    rt.rt_setup = if config.realtime {
        RtSetup::default()
    } else {
        RtSetup::minimal()
    };
    rt
}

/// Run the worker in the current process (the child side of the fork,
/// or the whole process with `--no-fork`).
///
/// # Errors
///
/// Fails when the runtime cannot be initialized.
pub fn run_worker(config: &ServiceConfig, soft_restart: bool) -> Result<i32> {
    let runtime = WorkerRuntime::start(runtime_config(config, soft_restart))
        .context("worker runtime failed to start")?;

    match runtime.run(signals::termination_flag()) {
        WorkerVerdict::CleanShutdown => {
            info!("worker shut down cleanly");
            Ok(0)
        }
        WorkerVerdict::TaskFailure(task) => {
            error!(task, "worker exiting after fatal task failure");
            Ok(TASK_FAILURE_EXIT_CODE)
        }
    }
}

/// The parent supervision loop: fork, monitor, persist, refork.
///
/// Returns the process exit code.
///
/// # Errors
///
/// Fails when the storage area or the initial fork cannot be
/// established.
#[cfg(unix)]
pub fn run_parent(config: &ServiceConfig, initial_soft_restart: bool) -> Result<i32> {
    install_parent_handlers();

    let layout = StorageLayout::new(&config.data_dir);
    layout.ensure().context("storage area unavailable")?;

    let snapshot_interval = Duration::from_secs(config.snapshot_interval_secs);
    let grace = Duration::from_secs(config.child_term_grace_secs);
    let mut restarts = RestartWindow::new(
        config.max_child_restarts,
        Duration::from_secs(config.restart_window_secs),
    );

    let mut soft_restart = initial_soft_restart;

    loop {
        let pid = spawn_child(config, soft_restart)?;
        info!(pid, soft_restart, "worker child forked");

        let mut last_snapshot = Instant::now();
        loop {
            if signals::termination_requested() {
                info!("termination requested, stopping child");
                terminate_child(pid, grace);
                persist_parent_view(&layout);
                return Ok(0);
            }

            match child_status(pid) {
                ChildExit::Running => {}
                ChildExit::Exited(code) => {
                    if code == CRASH_EXIT_CODE {
                        warn!(pid, "child crashed");
                    } else {
                        warn!(pid, code, "child exited unexpectedly");
                    }
                    break;
                }
                ChildExit::Signaled(signal) => {
                    warn!(pid, signal, "child killed by signal");
                    break;
                }
            }

            if last_snapshot.elapsed() >= snapshot_interval {
                persist_parent_view(&layout);
                last_snapshot = Instant::now();
            }

            std::thread::sleep(Duration::from_millis(100));
        }

        if restarts.record(Instant::now()) {
            persist_parent_view(&layout);
            bail!(
                "child restarted more than {} times within the monitoring window",
                config.max_child_restarts
            );
        }

        // The refork reloads state from storage instead of zero-init.
        soft_restart = true;
    }
}

/// Fallback for non-unix hosts: run the worker inline.
#[cfg(not(unix))]
pub fn run_parent(config: &ServiceConfig, initial_soft_restart: bool) -> Result<i32> {
    install_parent_handlers();
    run_worker(config, initial_soft_restart)
}

/// The parent's 2-second persistence: refresh `parent_storage.bin` from
/// the child's latest region snapshot.
///
/// The monitors live in the child's address space; the child's own
/// snapshot file is the parent's view of them.
fn persist_parent_view(layout: &StorageLayout) {
    match load_region(&layout.child_storage()) {
        Ok(snapshot) => {
            if let Err(err) = save_region(&layout.parent_storage(), &snapshot) {
                warn!(%err, "parent snapshot write failed");
            }
        }
        Err(err) => {
            // Nothing the child wrote yet (or a torn file the load
            // rejected); keep whatever parent copy exists.
            tracing::debug!(%err, "no child snapshot to mirror");
        }
    }
}

#[cfg(unix)]
fn spawn_child(config: &ServiceConfig, soft_restart: bool) -> Result<i32> {
    // SAFETY: fork has no preconditions; both return paths are handled.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        bail!("fork failed: {}", std::io::Error::last_os_error());
    }

    if pid == 0 {
        // Child: fresh handlers, fresh termination flag, own log file.
        signals::clear_termination();
        install_child_handlers();
        logging::mark_child();

        let code = match run_worker(config, soft_restart) {
            Ok(code) => code,
            Err(err) => {
                error!(%err, "worker failed to start");
                1
            }
        };
        // SAFETY: exiting the child without unwinding into the parent's
        // stack frames; _exit skips atexit handlers shared with the
        // parent.
        unsafe { libc::_exit(code) }
    }

    Ok(pid)
}

#[cfg(unix)]
fn child_status(pid: i32) -> ChildExit {
    let mut status: libc::c_int = 0;
    // SAFETY: waitpid with WNOHANG on a pid this process forked.
    let rc = unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) };
    if rc != pid {
        return ChildExit::Running;
    }

    if libc::WIFEXITED(status) {
        ChildExit::Exited(libc::WEXITSTATUS(status))
    } else if libc::WIFSIGNALED(status) {
        ChildExit::Signaled(libc::WTERMSIG(status))
    } else {
        ChildExit::Running
    }
}

#[cfg(unix)]
fn terminate_child(pid: i32, grace: Duration) {
    // SAFETY: signalling a child this process forked.
    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if child_status(pid) != ChildExit::Running {
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    warn!(pid, "child did not stop within the grace period, killing");
    // SAFETY: as above.
    unsafe {
        libc::kill(pid, libc::SIGKILL);
    }
    let mut status: libc::c_int = 0;
    // SAFETY: final blocking reap of the killed child.
    unsafe {
        libc::waitpid(pid, &mut status, 0);
    }
}
