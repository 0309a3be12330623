//! Time abstraction for scheduling.
//!
//! Timestamps are `Duration` offsets from the time source's own epoch, which
//! keeps the queue ordering plain integer comparison and lets tests drive a
//! virtual clock.

use std::time::{Duration, Instant};

/// Trait for abstracting time sources.
///
/// Shared between producer threads (reading `now` to schedule) and the
/// worker thread (sleeping until an update falls due).
pub trait TimeSource: Send + Sync + 'static {
    /// Returns the time elapsed since this source's epoch.
    fn now(&self) -> Duration;

    /// Blocks the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Wall-clock time source backed by [`std::time::Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    epoch: Instant,
}

impl SystemTimeSource {
    /// Creates a source whose epoch is the moment of construction.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
