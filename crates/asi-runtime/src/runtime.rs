//! The worker runtime: wire the shared region to the eight tasks and
//! run until shutdown or a fatal task failure.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use asi_events::EventId;
use asi_protocol::{MessageRole, Peer};
use asi_scheduler::{PeriodicTask, RtSetup, SchedulerObserver, TaskSet, TaskSpec, WorkerVerdict};
use asi_state::{
    MsgIntegrityData, SharedState, StorageLayout, load_checkpoint, load_preferring_child,
    save_region,
};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::approver::{ActionApprover, PreconditionApprover};
use crate::error::{RuntimeError, RuntimeResult};
use crate::eventlog::EventLogger;
use crate::report::raise_event;
use crate::socket::{PeerSocket, SharedSocket};
use crate::startup::{MemoryStartupTest, StartupTest};
use crate::tasks::{
    ApproverTask, CalibVerifierTask, CycleCountUpdaterTask, DiagnosticsTask, FaultManagerTask,
    RxTask, StateMachineTask, TxTask,
};

/// Default VAM endpoint.
pub const DEFAULT_VAM_ADDR: &str = "192.168.0.246:8080";

/// Default CM endpoint.
pub const DEFAULT_CM_ADDR: &str = "192.168.0.246:9090";

/// Interval between child region snapshots.
pub const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(2);

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// VAM endpoint.
    pub vam_addr: SocketAddr,
    /// CM endpoint.
    pub cm_addr: SocketAddr,
    /// Data root (storage and logs land under `ASI_DATA/`).
    pub data_root: PathBuf,
    /// Real-time setup applied to every task thread.
    pub rt_setup: RtSetup,
    /// Reload state from the storage files instead of zero-init.
    pub soft_restart: bool,
}

impl RuntimeConfig {
    /// Configuration with the default peer endpoints.
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            vam_addr: DEFAULT_VAM_ADDR.parse().expect("default VAM addr parses"),
            cm_addr: DEFAULT_CM_ADDR.parse().expect("default CM addr parses"),
            data_root: data_root.into(),
            rt_setup: RtSetup::default(),
            soft_restart: false,
        }
    }
}

/// Scheduler observer that turns scheduling anomalies into events.
#[derive(Debug, Clone)]
struct EventObserver {
    shared: SharedState,
}

impl SchedulerObserver for EventObserver {
    fn task_overrun(&self, spec: &TaskSpec, elapsed: Duration) {
        warn!(task = spec.name, ?elapsed, "task overran its period budget");
        raise_event(&self.shared, EventId::Overrun);
    }

    fn task_restarted(&self, spec: &TaskSpec, restarts_in_window: u32) {
        warn!(
            task = spec.name,
            restarts_in_window, "task terminated abnormally, respawned"
        );
        raise_event(&self.shared, EventId::TaskRestart);
    }

    fn restart_budget_exhausted(&self, spec: &TaskSpec) {
        tracing::error!(task = spec.name, "restart budget exhausted, worker exiting");
    }
}

/// The worker: shared region, sockets, and the supervised task set.
#[derive(Debug)]
pub struct WorkerRuntime {
    shared: SharedState,
    layout: StorageLayout,
    set: TaskSet,
}

impl WorkerRuntime {
    /// Build the region, restore state on a soft restart, and spawn the
    /// eight tasks with the default approver and startup battery.
    ///
    /// # Errors
    ///
    /// Fails when storage cannot be established, the event log cannot be
    /// opened, or a task thread cannot be spawned.
    pub fn start(config: RuntimeConfig) -> RuntimeResult<Self> {
        let layout = StorageLayout::new(&config.data_root);
        let startup = Box::new(MemoryStartupTest::new(layout));
        Self::start_with(config, Box::new(PreconditionApprover::new()), startup)
    }

    /// [`WorkerRuntime::start`] with an explicit approver and startup
    /// battery, for callers that plug in their own business logic.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`WorkerRuntime::start`].
    pub fn start_with(
        config: RuntimeConfig,
        approver: Box<dyn ActionApprover>,
        startup: Box<dyn StartupTest>,
    ) -> RuntimeResult<Self> {
        let layout = StorageLayout::new(&config.data_root);
        layout.ensure()?;

        let shared = SharedState::new();

        if config.soft_restart {
            let (snapshot, source) =
                load_preferring_child(&layout.parent_storage(), &layout.child_storage());
            shared.restore(&snapshot);

            // The checkpoint file is authoritative for the in-flight
            // event; it is written after every stage.
            let checkpoint = load_checkpoint(&layout.event_data());
            if checkpoint.processing_flag == 1 {
                let mut fault = shared.fault.lock();
                fault.processing_flag = true;
                fault.in_flight = checkpoint.record;
            }
            info!(?source, "soft restart: region restored");
        }

        // Cyclic CM status is supervised from the start.
        {
            let mut tracker = shared.tracker.lock();
            for role in [
                MessageRole::Prndl,
                MessageRole::VehicleSpeed,
                MessageRole::RainSensor,
            ] {
                let _ = tracker
                    .track
                    .insert(MsgIntegrityData::new(role.id(), 0, role));
            }
        }

        let sockets: [SharedSocket; 2] = [
            Arc::new(Mutex::new(PeerSocket::new(Peer::Vam, config.vam_addr))),
            Arc::new(Mutex::new(PeerSocket::new(Peer::Cm, config.cm_addr))),
        ];

        let logger = Arc::new(Mutex::new(
            EventLogger::open(layout.event_log()).map_err(RuntimeError::EventLog)?,
        ));

        let observer = Arc::new(EventObserver {
            shared: shared.clone(),
        });
        let mut set = TaskSet::new(config.rt_setup.clone(), observer);

        {
            let shared = shared.clone();
            set.spawn(move || {
                Box::new(CycleCountUpdaterTask::new(shared.clone())) as Box<dyn PeriodicTask>
            })?;
        }
        {
            let shared = shared.clone();
            let logger = Arc::clone(&logger);
            let checkpoint = layout.event_data();
            set.spawn(move || {
                Box::new(FaultManagerTask::new(
                    shared.clone(),
                    Arc::clone(&logger),
                    checkpoint.clone(),
                )) as Box<dyn PeriodicTask>
            })?;
        }
        {
            let shared = shared.clone();
            let startup: crate::tasks::machine::SharedStartupTest =
                Arc::new(Mutex::new(startup));
            set.spawn(move || {
                Box::new(StateMachineTask::new(shared.clone(), Arc::clone(&startup)))
                    as Box<dyn PeriodicTask>
            })?;
        }
        {
            let shared = shared.clone();
            let sockets = sockets.clone();
            set.spawn(move || {
                Box::new(RxTask::new(shared.clone(), sockets.clone())) as Box<dyn PeriodicTask>
            })?;
        }
        {
            let shared = shared.clone();
            let sockets = sockets.clone();
            set.spawn(move || {
                Box::new(TxTask::new(shared.clone(), sockets.clone())) as Box<dyn PeriodicTask>
            })?;
        }
        {
            let shared = shared.clone();
            let approver: crate::tasks::approval::SharedApprover =
                Arc::new(Mutex::new(approver));
            set.spawn(move || {
                Box::new(ApproverTask::new(shared.clone(), Arc::clone(&approver)))
                    as Box<dyn PeriodicTask>
            })?;
        }
        {
            let shared = shared.clone();
            set.spawn(move || {
                Box::new(CalibVerifierTask::new(shared.clone())) as Box<dyn PeriodicTask>
            })?;
        }
        {
            let shared = shared.clone();
            let sockets = sockets.clone();
            set.spawn(move || {
                Box::new(DiagnosticsTask::new(shared.clone(), sockets.clone()))
                    as Box<dyn PeriodicTask>
            })?;
        }

        raise_event(&shared, EventId::InitComplete);
        info!("worker runtime started");

        Ok(Self {
            shared,
            layout,
            set,
        })
    }

    /// Handle to the shared region (for the parent supervisor's view
    /// and for tests).
    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    /// Run until `external_shutdown` is raised or a task failure takes
    /// the worker down. Snapshots the region to the child storage file
    /// every [`SNAPSHOT_INTERVAL`].
    pub fn run(self, external_shutdown: &AtomicBool) -> WorkerVerdict {
        let mut last_snapshot = Instant::now();

        loop {
            if external_shutdown.load(Ordering::Acquire) {
                info!("external shutdown requested");
                self.set.shutdown();
                break;
            }
            if self.set.is_fatal() {
                break;
            }

            if let Some(exit) = self.set.poll_exit(Duration::from_millis(100)) {
                if exit.fatal {
                    break;
                }
            }

            if last_snapshot.elapsed() >= SNAPSHOT_INTERVAL {
                self.snapshot_to_child_storage();
                last_snapshot = Instant::now();
            }
        }

        // One last snapshot with the tasks stopping.
        self.snapshot_to_child_storage();
        self.set.join()
    }

    fn snapshot_to_child_storage(&self) {
        let snapshot = self.shared.capture();
        if let Err(err) = save_region(&self.layout.child_storage(), &snapshot) {
            warn!(%err, "child region snapshot failed");
        }
    }
}
