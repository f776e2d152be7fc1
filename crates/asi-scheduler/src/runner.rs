//! Task set spawning, supervision, and shutdown.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, Sender, bounded};
use tracing::{debug, info, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::rt_setup::RtSetup;
use crate::supervisor::{RestartWindow, SchedulerObserver};
use crate::task::{PeriodicTask, TaskSpec};
use crate::timer::{PeriodicTimer, Wake};

/// How the worker's task set ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerVerdict {
    /// Every task exited on the shutdown flag.
    CleanShutdown,
    /// The named task exhausted its restart budget.
    TaskFailure(&'static str),
}

/// A task's exit notification.
#[derive(Debug, Clone, Copy)]
pub struct TaskExit {
    /// Name of the exited task.
    pub name: &'static str,
    /// True when the exit consumed the worker (budget exhausted).
    pub fatal: bool,
}

/// The worker's set of supervised periodic task threads.
#[derive(Debug)]
pub struct TaskSet {
    shutdown: Arc<AtomicBool>,
    fatal: Arc<AtomicBool>,
    setup: RtSetup,
    observer: Arc<dyn SchedulerObserver>,
    handles: Vec<(TaskSpec, JoinHandle<()>)>,
    exit_tx: Sender<TaskExit>,
    exit_rx: Receiver<TaskExit>,
}

impl std::fmt::Debug for dyn SchedulerObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SchedulerObserver")
    }
}

impl TaskSet {
    /// Create an empty task set.
    pub fn new(setup: RtSetup, observer: Arc<dyn SchedulerObserver>) -> Self {
        let (exit_tx, exit_rx) = bounded(16);
        Self {
            shutdown: Arc::new(AtomicBool::new(false)),
            fatal: Arc::new(AtomicBool::new(false)),
            setup,
            observer,
            handles: Vec::new(),
            exit_tx,
            exit_rx,
        }
    }

    /// Handle to the cooperative shutdown flag.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Request cooperative shutdown of every task.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// True once any task exhausted its restart budget.
    pub fn is_fatal(&self) -> bool {
        self.fatal.load(Ordering::Acquire)
    }

    /// Wait up to `timeout` for the next task exit notification.
    pub fn poll_exit(&self, timeout: Duration) -> Option<TaskExit> {
        self.exit_rx.recv_timeout(timeout).ok()
    }

    /// Spawn a supervised task thread.
    ///
    /// The factory is called once for the initial incarnation and again
    /// for every in-place respawn after an abnormal termination.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::SpawnFailed`] when the OS refuses the
    /// thread.
    pub fn spawn<F>(&mut self, factory: F) -> SchedulerResult<()>
    where
        F: Fn() -> Box<dyn PeriodicTask> + Send + 'static,
    {
        let task = factory();
        let spec = task.spec();

        let shutdown = Arc::clone(&self.shutdown);
        let fatal = Arc::clone(&self.fatal);
        let observer = Arc::clone(&self.observer);
        let setup = self.setup.clone();
        let exit_tx = self.exit_tx.clone();

        let handle = std::thread::Builder::new()
            .name(spec.name.to_owned())
            .spawn(move || {
                task_main(task, factory, spec, setup, shutdown, fatal, observer, exit_tx);
            })
            .map_err(|source| SchedulerError::SpawnFailed {
                task: spec.name,
                source,
            })?;

        debug!(task = spec.name, priority = spec.priority, "task spawned");
        self.handles.push((spec, handle));
        Ok(())
    }

    /// Join every task, highest priority first.
    ///
    /// Call after [`TaskSet::shutdown`] (or after a fatal exit already
    /// set the flag).
    pub fn join(mut self) -> WorkerVerdict {
        self.shutdown.store(true, Ordering::Release);
        self.handles.sort_by(|a, b| b.0.priority.cmp(&a.0.priority));

        for (spec, handle) in self.handles {
            if handle.join().is_err() {
                // The supervision wrapper catches body panics; reaching
                // here means the wrapper itself died.
                warn!(task = spec.name, "task thread join reported a panic");
            } else {
                debug!(task = spec.name, "task joined");
            }
        }

        let mut failed = None;
        while let Ok(exit) = self.exit_rx.try_recv() {
            if exit.fatal {
                failed = Some(exit.name);
            }
        }

        match failed {
            Some(name) => WorkerVerdict::TaskFailure(name),
            None => WorkerVerdict::CleanShutdown,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn task_main<F>(
    mut task: Box<dyn PeriodicTask>,
    factory: F,
    spec: TaskSpec,
    setup: RtSetup,
    shutdown: Arc<AtomicBool>,
    fatal: Arc<AtomicBool>,
    observer: Arc<dyn SchedulerObserver>,
    exit_tx: Sender<TaskExit>,
) where
    F: Fn() -> Box<dyn PeriodicTask>,
{
    setup.apply(spec.priority);

    let mut timer = PeriodicTimer::new(spec.period);
    let mut restarts = RestartWindow::default();

    loop {
        match timer.wait_for_tick(&shutdown) {
            Wake::Shutdown => {
                task.on_shutdown();
                info!(task = spec.name, "task exiting on shutdown");
                let _ = exit_tx.try_send(TaskExit {
                    name: spec.name,
                    fatal: false,
                });
                return;
            }
            Wake::Tick { .. } => {}
        }

        let started = Instant::now();
        match catch_unwind(AssertUnwindSafe(|| task.tick())) {
            Ok(()) => {
                if timer.record_elapsed(started.elapsed()) {
                    observer.task_overrun(&spec, started.elapsed());
                }
            }
            Err(_) => {
                if restarts.record(Instant::now()) {
                    observer.restart_budget_exhausted(&spec);
                    fatal.store(true, Ordering::Release);
                    shutdown.store(true, Ordering::Release);
                    let _ = exit_tx.try_send(TaskExit {
                        name: spec.name,
                        fatal: true,
                    });
                    return;
                }
                observer.task_restarted(&spec, restarts.count());
                task = factory();
            }
        }
    }
}
