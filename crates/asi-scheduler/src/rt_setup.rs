//! Real-time setup configuration.

/// Real-time parameters applied to each task thread before its loop.
///
/// On Linux this selects `SCHED_FIFO` at the task's declared priority and
/// optionally locks memory; elsewhere it is a no-op. Failures are
/// non-fatal; the worker runs degraded without `CAP_SYS_NICE`.
#[derive(Debug, Clone)]
pub struct RtSetup {
    /// Enable `SCHED_FIFO` scheduling at the task's declared priority.
    pub fifo_scheduling: bool,

    /// Lock all current and future memory pages (once per process).
    pub lock_memory: bool,
}

impl Default for RtSetup {
    fn default() -> Self {
        Self {
            fifo_scheduling: true,
            lock_memory: true,
        }
    }
}

impl RtSetup {
    /// Create a new setup with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a minimal setup (no special configuration).
    pub fn minimal() -> Self {
        Self {
            fifo_scheduling: false,
            lock_memory: false,
        }
    }

    /// Create a setup suitable for tests (no privileges required).
    pub fn testing() -> Self {
        Self::minimal()
    }

    /// Set FIFO scheduling.
    pub fn with_fifo_scheduling(mut self, enabled: bool) -> Self {
        self.fifo_scheduling = enabled;
        self
    }

    /// Set memory locking.
    pub fn with_lock_memory(mut self, enabled: bool) -> Self {
        self.lock_memory = enabled;
        self
    }

    /// Apply this setup to the calling thread at the given priority.
    pub fn apply(&self, priority: u8) {
        #[cfg(target_os = "linux")]
        crate::linux::apply_rt_setup(self, priority);

        #[cfg(not(target_os = "linux"))]
        crate::fallback::apply_rt_setup(self, priority);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_enables_rt_features() {
        let setup = RtSetup::default();
        assert!(setup.fifo_scheduling);
        assert!(setup.lock_memory);
    }

    #[test]
    fn test_minimal_disables_everything() {
        let setup = RtSetup::minimal();
        assert!(!setup.fifo_scheduling);
        assert!(!setup.lock_memory);
    }

    #[test]
    fn test_builder_methods() {
        let setup = RtSetup::new()
            .with_fifo_scheduling(false)
            .with_lock_memory(false);
        assert!(!setup.fifo_scheduling);
        assert!(!setup.lock_memory);
    }
}
