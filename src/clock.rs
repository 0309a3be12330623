//! Per-device virtual clock.
//!
//! The cursor is the next free instant on a device's timeline. Gestures
//! schedule at the cursor and advance it, so consecutive gestures queue up
//! behind each other instead of colliding.

use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VirtualClock {
    cursor: Duration,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cursor(&self) -> Duration {
        self.cursor
    }

    /// Pulls the cursor up to `now` if it lags behind, returning it.
    pub fn schedule(&mut self, now: Duration) -> Duration {
        self.cursor = self.cursor.max(now);
        self.cursor
    }

    /// Moves the cursor `by` further along.
    pub fn delay(&mut self, by: Duration) {
        self.cursor = self.cursor.saturating_add(by);
    }

    /// Moves the cursor forward to `at`; never moves it back.
    pub fn advance_to(&mut self, at: Duration) {
        self.cursor = self.cursor.max(at);
    }

    /// Rewinds to the epoch. Only a device reset does this.
    pub fn reset(&mut self) {
        self.cursor = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn schedule_pulls_a_stale_cursor_up_to_now() {
        let mut clock = VirtualClock::new();
        assert_eq!(clock.schedule(ms(500)), ms(500));
        clock.delay(ms(200));
        assert_eq!(clock.schedule(ms(600)), ms(700));
    }

    #[test]
    fn cursor_never_moves_backwards() {
        let mut clock = VirtualClock::new();
        clock.advance_to(ms(900));
        clock.advance_to(ms(100));
        assert_eq!(clock.schedule(ms(0)), ms(900));
    }

    #[test]
    fn reset_rewinds_to_epoch() {
        let mut clock = VirtualClock::new();
        clock.delay(ms(300));
        clock.reset();
        assert_eq!(clock.cursor(), Duration::ZERO);
    }
}
