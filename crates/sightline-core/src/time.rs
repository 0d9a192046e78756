//! Time sources and interval scheduling
//!
//! Replication never reads a global clock. Hosts inject a [`TimeSource`]:
//! - [`SystemClock`] - monotonic wall clock for real deployments
//! - [`ManualClock`] - caller-driven clock for simulations and tests
//!
//! All times are seconds as `f64`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Source of local network time in seconds
pub trait TimeSource: Send + Sync {
    /// Current local time
    fn now(&self) -> f64;
}

/// Monotonic clock measuring seconds since construction
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Clock advanced explicitly by the caller
///
/// Clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock starting at `start` seconds
    pub fn new(start: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(start.to_bits())),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, time: f64) {
        self.bits.store(time.to_bits(), Ordering::Release);
    }

    /// Move forward by `delta` seconds and return the new time
    pub fn advance(&self, delta: f64) -> f64 {
        let next = self.now() + delta;
        self.set(next);
        next
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// Fires at most once per `interval` seconds
///
/// An interval of zero fires on every call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalTimer {
    interval: f64,
    last: Option<f64>,
}

impl IntervalTimer {
    pub fn new(interval: f64) -> Self {
        Self {
            interval: interval.max(0.0),
            last: None,
        }
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Returns true and restarts the interval if it has elapsed at `now`
    ///
    /// The first call always fires.
    pub fn ready(&mut self, now: f64) -> bool {
        match self.last {
            Some(last) if now < last + self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Forget the last firing time
    pub fn reset(&mut self) {
        self.last = None;
    }
}
