//! Host wall clock
//!
//! Drives the cooperative timers (sequencer ticks, fades, hand-offs). It is
//! never used to timestamp audio events; that is the graph clock's job.

use std::cell::Cell;
use std::time::Instant;

/// Monotonic seconds since the clock's origin
pub trait HostClock {
    fn now(&self) -> f64;
}

/// Real monotonic clock
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock for tests and the headless simulator
///
/// Time is kept in whole microseconds so repeated small steps do not drift.
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: Cell<u64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `secs` (negative values are ignored)
    pub fn advance(&self, secs: f64) {
        if secs > 0.0 {
            let step = (secs * 1_000_000.0).round() as u64;
            self.micros.set(self.micros.get() + step);
        }
    }

    /// Jump to an absolute time; the clock never moves backwards
    pub fn set(&self, secs: f64) {
        let target = (secs.max(0.0) * 1_000_000.0).round() as u64;
        if target > self.micros.get() {
            self.micros.set(target);
        }
    }
}

impl HostClock for ManualClock {
    fn now(&self) -> f64 {
        self.micros.get() as f64 / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new();
        for _ in 0..20 {
            clock.advance(0.025);
        }
        assert_eq!(clock.now(), 0.5);
    }

    #[test]
    fn test_manual_clock_never_rewinds() {
        let clock = ManualClock::new();
        clock.set(2.0);
        clock.set(1.0);
        clock.advance(-3.0);
        assert_relative_eq!(clock.now(), 2.0);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
