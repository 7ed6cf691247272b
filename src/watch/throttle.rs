//! Rebuild trigger throttling.
//!
//! A single-token bucket: the first event of a burst fires, everything else
//! inside the window is dropped rather than queued.

use std::time::{Duration, Instant};

/// Default minimum interval between two rebuild triggers.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(3);

#[derive(Debug)]
pub struct Throttle {
    tokens: f64,
    last_update: Instant,
    refill_per_sec: f64,
}

impl Throttle {
    pub fn new(window: Duration) -> Self {
        Self::starting_at(window, Instant::now())
    }

    pub fn starting_at(window: Duration, now: Instant) -> Self {
        let secs = window.as_secs_f64();
        Self {
            tokens: 1.0,
            last_update: now,
            refill_per_sec: if secs > 0.0 { 1.0 / secs } else { f64::INFINITY },
        }
    }

    /// Take the token if one is available at `now`.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if self.refill_per_sec.is_infinite() {
            return true;
        }
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        // Refill, capped at a single token
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(1.0);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
