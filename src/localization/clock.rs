// src/localization/clock.rs
// Time source for the guidance state machine. Hysteresis timers sample "now"
// only when an update arrives, so tests can substitute a scripted clock.

use std::time::Instant;

/// Source of the current instant
#[cfg_attr(test, mockall::automock)]
pub trait Clock {
    /// Current instant
    fn now(&self) -> Instant;
}

/// Wall-clock time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
