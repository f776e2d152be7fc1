//! Absolute-deadline periodic timer.
//!
//! Adapted from an absolute scheduler: wake times are computed by
//! advancing a monotonic deadline by the period, never by sleeping a
//! relative amount, so processing time does not accumulate drift.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::SHUTDOWN_POLL;

/// Why `wait_for_tick` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The deadline arrived.
    Tick {
        /// The deadline had already passed when the wait began.
        missed_deadline: bool,
    },
    /// The shutdown flag was observed.
    Shutdown,
}

/// Per-task timing counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerMetrics {
    /// Ticks released.
    pub total_ticks: u64,
    /// Deadlines that had already passed at wait time.
    pub missed_deadlines: u64,
    /// Bodies that exceeded the overrun budget.
    pub overruns: u64,
    /// Longest observed body elapsed time.
    pub max_elapsed: Duration,
    /// Most recent body elapsed time.
    pub last_elapsed: Duration,
}

/// Periodic timer releasing one tick per period.
#[derive(Debug)]
pub struct PeriodicTimer {
    period: Duration,
    next_tick: Instant,
    metrics: TimerMetrics,
}

impl PeriodicTimer {
    /// Create a timer whose first deadline is one period from now.
    pub fn new(period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        Self {
            period,
            next_tick: Instant::now() + period,
            metrics: TimerMetrics::default(),
        }
    }

    /// Target period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Timing counters.
    pub fn metrics(&self) -> &TimerMetrics {
        &self.metrics
    }

    /// Wait for the next deadline, observing `shutdown` at least every
    /// [`SHUTDOWN_POLL`].
    ///
    /// When the caller has fallen behind by more than one period, the
    /// deadline is re-anchored to now so one slow tick does not cause a
    /// burst of catch-up releases.
    pub fn wait_for_tick(&mut self, shutdown: &AtomicBool) -> Wake {
        loop {
            if shutdown.load(Ordering::Acquire) {
                return Wake::Shutdown;
            }

            let now = Instant::now();
            if now >= self.next_tick {
                let missed = now.duration_since(self.next_tick) >= self.period;
                if missed {
                    self.metrics.missed_deadlines += 1;
                    self.next_tick = now + self.period;
                } else {
                    self.next_tick += self.period;
                }
                self.metrics.total_ticks += 1;
                return Wake::Tick {
                    missed_deadline: missed,
                };
            }

            let remaining = self.next_tick.duration_since(now);
            std::thread::sleep(remaining.min(SHUTDOWN_POLL));
        }
    }

    /// Record how long the body ran; returns `true` when it overran the
    /// 1.2 × period budget.
    pub fn record_elapsed(&mut self, elapsed: Duration) -> bool {
        self.metrics.last_elapsed = elapsed;
        self.metrics.max_elapsed = self.metrics.max_elapsed.max(elapsed);

        let overran = elapsed > crate::overrun_budget(self.period);
        if overran {
            self.metrics.overruns += 1;
        }
        overran
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_tick_released_after_period() {
        let shutdown = AtomicBool::new(false);
        let mut timer = PeriodicTimer::new(Duration::from_millis(5));

        let start = Instant::now();
        let wake = timer.wait_for_tick(&shutdown);
        assert!(matches!(wake, Wake::Tick { .. }));
        assert!(start.elapsed() >= Duration::from_millis(4));
        assert_eq!(timer.metrics().total_ticks, 1);
    }

    #[test]
    fn test_shutdown_observed_before_deadline() {
        let shutdown = AtomicBool::new(true);
        let mut timer = PeriodicTimer::new(Duration::from_secs(60));

        let start = Instant::now();
        let wake = timer.wait_for_tick(&shutdown);
        assert_eq!(wake, Wake::Shutdown);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_overrun_detection() {
        let mut timer = PeriodicTimer::new(Duration::from_millis(25));
        assert!(!timer.record_elapsed(Duration::from_millis(25)));
        assert!(!timer.record_elapsed(Duration::from_millis(30)));
        assert!(timer.record_elapsed(Duration::from_millis(31)));
        assert_eq!(timer.metrics().overruns, 1);
        assert_eq!(timer.metrics().max_elapsed, Duration::from_millis(31));
    }

    #[test]
    fn test_zero_period_clamped() {
        let timer = PeriodicTimer::new(Duration::ZERO);
        assert_eq!(timer.period(), Duration::from_millis(1));
    }

    #[test]
    fn test_missed_deadline_reanchors() {
        let shutdown = AtomicBool::new(false);
        let mut timer = PeriodicTimer::new(Duration::from_millis(2));

        // Sleep past several deadlines; the next wait reports one miss and
        // re-anchors rather than bursting.
        std::thread::sleep(Duration::from_millis(10));
        let wake = timer.wait_for_tick(&shutdown);
        assert_eq!(
            wake,
            Wake::Tick {
                missed_deadline: true
            }
        );
        assert_eq!(timer.metrics().missed_deadlines, 1);

        let start = Instant::now();
        let wake = timer.wait_for_tick(&shutdown);
        assert!(matches!(wake, Wake::Tick { .. }));
        assert!(start.elapsed() >= Duration::from_millis(1));
    }
}
