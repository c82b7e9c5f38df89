use crate::Timestamp;

/// A local pre-race countdown, started when this client observes `COUNTDOWN`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    started_at: Timestamp,
    duration_ms: u64,
}

impl Countdown {
    pub const fn new(started_at: Timestamp, duration_ms: u64) -> Self {
        Self {
            started_at,
            duration_ms,
        }
    }

    pub fn remaining_ms(&self, now: Timestamp) -> u64 {
        (self.started_at + self.duration_ms).saturating_sub(now)
    }

    /// Whole seconds left, rounded up so the display never shows 0 early
    pub fn remaining_secs(&self, now: Timestamp) -> u64 {
        self.remaining_ms(now).div_ceil(1_000)
    }

    pub fn is_elapsed(&self, now: Timestamp) -> bool {
        self.remaining_ms(now) == 0
    }
}
