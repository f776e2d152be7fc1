//! Supervisor state machine.

use std::sync::Arc;

use asi_events::EventId;
use asi_scheduler::{PeriodicTask, TaskSpec};
use asi_state::{AsiState, SharedState};
use parking_lot::Mutex;
use tracing::{error, info};

use crate::report::{enqueue_notification, raise_event, startup_notification};
use crate::startup::{StartupOutcome, StartupTest};

use super::MACHINE_TASK;

/// Shared handle to the startup battery, so a respawned task
/// incarnation keeps the battery's progress.
pub type SharedStartupTest = Arc<Mutex<Box<dyn StartupTest>>>;

/// The state machine task.
pub struct StateMachineTask {
    shared: SharedState,
    startup: SharedStartupTest,
}

impl std::fmt::Debug for StateMachineTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachineTask").finish_non_exhaustive()
    }
}

impl StateMachineTask {
    /// Create the task over the shared region and a startup-test
    /// battery.
    pub fn new(shared: SharedState, startup: SharedStartupTest) -> Self {
        Self { shared, startup }
    }

    fn apply(&self, to: AsiState) {
        let mut machine = self.shared.machine.lock();
        let from = machine.state;
        if from == to {
            return;
        }

        if !AsiState::transition_allowed(from, to) {
            // Illegal transition request: report it and fail safe.
            drop(machine);
            error!(?from, ?to, "illegal state transition requested");
            raise_event(&self.shared, EventId::SmTransition);
            self.shared.machine.lock().state = AsiState::SafeState;
            return;
        }

        info!(?from, ?to, "state transition");
        machine.state = to;
    }
}

impl PeriodicTask for StateMachineTask {
    fn spec(&self) -> TaskSpec {
        MACHINE_TASK
    }

    fn tick(&mut self) {
        let (state, critical) = {
            let machine = self.shared.machine.lock();
            (machine.state, machine.critical_fault_flag)
        };

        // The critical fault flag forces Safe State from anywhere,
        // within this tick.
        if critical && state != AsiState::SafeState {
            self.apply(AsiState::SafeState);
            return;
        }

        match state {
            AsiState::Initial => {
                self.apply(AsiState::StartupTest);
            }
            AsiState::StartupTest => match { self.startup.lock().poll() } {
                StartupOutcome::Running => {}
                StartupOutcome::Passed => {
                    enqueue_notification(&self.shared, startup_notification(true));
                    self.apply(AsiState::NormalOperation);
                }
                StartupOutcome::Failed(cause) => {
                    if let Some(event) = cause {
                        raise_event(&self.shared, event);
                    }
                    raise_event(&self.shared, EventId::SutTerm);
                    enqueue_notification(&self.shared, startup_notification(false));
                    self.apply(AsiState::SafeState);
                }
            },
            AsiState::NormalOperation => {}
            // Terminal.
            AsiState::SafeState => {}
        }
    }
}
