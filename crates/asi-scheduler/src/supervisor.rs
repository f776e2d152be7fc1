//! Per-task supervision: restart budgets and observer hooks.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::task::TaskSpec;
use crate::{RESTART_LIMIT, RESTART_WINDOW};

/// Sliding-window abnormal-termination budget.
///
/// Records each abnormal termination; once more than `limit` land inside
/// `window`, the budget is exhausted and the worker must exit.
#[derive(Debug)]
pub struct RestartWindow {
    window: Duration,
    limit: u32,
    restarts: VecDeque<Instant>,
}

impl Default for RestartWindow {
    fn default() -> Self {
        Self::new(RESTART_LIMIT, RESTART_WINDOW)
    }
}

impl RestartWindow {
    /// Create a budget of `limit` restarts per `window`.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            window,
            limit,
            restarts: VecDeque::with_capacity(limit as usize + 1),
        }
    }

    /// Record an abnormal termination at `now`.
    ///
    /// Returns `true` when the budget is exhausted.
    pub fn record(&mut self, now: Instant) -> bool {
        while let Some(&oldest) = self.restarts.front() {
            if now.duration_since(oldest) > self.window {
                self.restarts.pop_front();
            } else {
                break;
            }
        }

        self.restarts.push_back(now);
        self.restarts.len() as u32 > self.limit
    }

    /// Restarts currently inside the window.
    pub fn count(&self) -> u32 {
        self.restarts.len() as u32
    }
}

/// Hooks the runtime implements to observe scheduling anomalies.
///
/// Implementations must be cheap and must not panic; they are called from
/// inside task threads.
pub trait SchedulerObserver: Send + Sync {
    /// A task body exceeded 1.2 × its period.
    fn task_overrun(&self, spec: &TaskSpec, elapsed: Duration);

    /// A task body panicked and was respawned in place.
    fn task_restarted(&self, spec: &TaskSpec, restarts_in_window: u32);

    /// A task exhausted its restart budget; the worker is going down.
    fn restart_budget_exhausted(&self, spec: &TaskSpec);
}

/// Observer that only logs, for tests and tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl SchedulerObserver for LogObserver {
    fn task_overrun(&self, spec: &TaskSpec, elapsed: Duration) {
        tracing::warn!(task = spec.name, ?elapsed, "task overran its period budget");
    }

    fn task_restarted(&self, spec: &TaskSpec, restarts_in_window: u32) {
        tracing::warn!(
            task = spec.name,
            restarts_in_window,
            "task terminated abnormally, respawning"
        );
    }

    fn restart_budget_exhausted(&self, spec: &TaskSpec) {
        tracing::error!(task = spec.name, "restart budget exhausted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_not_exhausted_under_limit() {
        let mut window = RestartWindow::new(5, Duration::from_secs(5));
        let now = Instant::now();
        for _ in 0..5 {
            assert!(!window.record(now));
        }
        assert_eq!(window.count(), 5);
    }

    #[test]
    fn test_budget_exhausted_over_limit() {
        let mut window = RestartWindow::new(5, Duration::from_secs(5));
        let now = Instant::now();
        for _ in 0..5 {
            window.record(now);
        }
        assert!(window.record(now));
    }

    #[test]
    fn test_old_restarts_expire() {
        let mut window = RestartWindow::new(2, Duration::from_millis(10));
        let start = Instant::now();
        window.record(start);
        window.record(start);

        let later = start + Duration::from_millis(50);
        assert!(!window.record(later));
        assert_eq!(window.count(), 1);
    }
}
