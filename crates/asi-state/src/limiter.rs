//! Fixed-window transmit rate limiter.

use std::time::{Duration, Instant};

/// Messages permitted per window.
pub const DEFAULT_ALLOWED: u32 = 10;

/// Window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(100);

/// Fixed-window rate limiter for the transmit path.
///
/// With no message activity, repeated permit checks keep succeeding
/// until the in-window budget is spent; the window resets wholesale when
/// its duration elapses.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    allowed: u32,
    window: Duration,
    count: u32,
    window_start: Instant,
    permitted: u64,
    dropped: u64,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    /// Create a limiter permitting `allowed` messages per `window`.
    pub fn new(allowed: u32, window: Duration) -> Self {
        Self {
            allowed,
            window,
            count: 0,
            window_start: Instant::now(),
            permitted: 0,
            dropped: 0,
        }
    }

    /// Ask to transmit one message at `now`.
    ///
    /// Returns `true` to permit, `false` to drop.
    pub fn check_limit(&mut self, now: Instant) -> bool {
        if now.duration_since(self.window_start) >= self.window {
            self.window_start = now;
            self.count = 0;
        }

        if self.count < self.allowed {
            self.count += 1;
            self.permitted += 1;
            true
        } else {
            self.dropped += 1;
            false
        }
    }

    /// Total permitted messages.
    pub fn permitted(&self) -> u64 {
        self.permitted
    }

    /// Total dropped messages.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
