//! Startup test sequencing interface.
//!
//! The test battery itself is collaborator logic; the runtime fixes the
//! polling interface and ships a memory/storage check sized to what the
//! interlock needs before mediating traffic.

use asi_events::EventId;
use asi_state::StorageLayout;
use tracing::{info, warn};

/// Result of one startup-test poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupOutcome {
    /// Tests still running; poll again next tick.
    Running,
    /// All tests passed.
    Passed,
    /// A test failed; the cause event, if any, is raised by the state
    /// machine before it forces Safe State.
    Failed(Option<EventId>),
}

/// Startup test battery, polled once per state-machine tick while in
/// the startup-test state.
pub trait StartupTest: Send {
    /// Advance the battery by one step.
    fn poll(&mut self) -> StartupOutcome;
}

/// The shipped battery: verifies the storage area is writable and
/// readable before traffic is mediated.
#[derive(Debug)]
pub struct MemoryStartupTest {
    layout: StorageLayout,
    done: bool,
}

impl MemoryStartupTest {
    /// Create the battery over the worker's storage layout.
    pub fn new(layout: StorageLayout) -> Self {
        Self {
            layout,
            done: false,
        }
    }
}

impl StartupTest for MemoryStartupTest {
    fn poll(&mut self) -> StartupOutcome {
        if self.done {
            return StartupOutcome::Passed;
        }

        if let Err(err) = self.layout.ensure() {
            warn!(%err, "startup test: storage area not writable");
            return StartupOutcome::Failed(Some(EventId::StartupMemError));
        }

        let probe = self.layout.storage_dir().join("startup_probe.tmp");
        let verdict = std::fs::write(&probe, b"asi")
            .and_then(|()| std::fs::read(&probe))
            .map(|bytes| bytes == b"asi");
        let _ = std::fs::remove_file(&probe);

        match verdict {
            Ok(true) => {
                info!("startup test passed");
                self.done = true;
                StartupOutcome::Passed
            }
            Ok(false) => {
                warn!("startup test: storage probe read back wrong contents");
                StartupOutcome::Failed(Some(EventId::StartupMemError))
            }
            Err(err) => {
                warn!(%err, "startup test: storage probe failed");
                StartupOutcome::Failed(Some(EventId::StartupMemError))
            }
        }
    }
}
