//! Fixed-window counter state for a single identifier.

use std::time::{Duration, Instant};

/// Per-identifier request counter over a fixed window.
///
/// The window resets entirely to zero once the interval has elapsed since it
/// started, rather than sliding continuously. Short bursts at window
/// boundaries are permitted in exchange for constant-size bookkeeping.
///
/// Mutation happens under the store's shard lock, so the fields need no
/// internal synchronization.
#[derive(Debug, Clone)]
pub struct WindowCounter {
    /// Requests admitted in the current window
    count: u64,
    /// When the current window started
    window_start: Instant,
    /// Last time this identifier was checked, admitted or not
    last_seen: Instant,
}

impl WindowCounter {
    /// Create a counter with an empty window starting now.
    pub fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
            last_seen: now,
        }
    }

    /// Admit one request if the window quota allows it.
    ///
    /// Rolls the window first when the interval has elapsed. Returns `true`
    /// and increments on admission; returns `false` without touching the
    /// count on rejection. The last-seen time is refreshed either way so an
    /// identifier under active traffic is never an eviction victim.
    pub fn try_increment(&mut self, now: Instant, interval: Duration, limit: u64) -> bool {
        self.roll_window(now, interval);
        self.last_seen = now;

        if self.count >= limit {
            return false;
        }
        self.count += 1;
        true
    }

    /// Reset the window if it has expired.
    fn roll_window(&mut self, now: Instant, interval: Duration) {
        if now.duration_since(self.window_start) >= interval {
            self.count = 0;
            self.window_start = now;
        }
    }

    /// Whether the window has fully elapsed.
    ///
    /// An expired counter is logically absent: the next check treats it as a
    /// fresh window, and sweeps may remove it.
    pub fn is_expired(&self, now: Instant, interval: Duration) -> bool {
        now.duration_since(self.window_start) >= interval
    }

    /// Get the current count.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Get the remaining quota against the given limit.
    pub fn remaining(&self, limit: u64) -> u64 {
        limit.saturating_sub(self.count)
    }

    /// Get the duration until the current window resets.
    pub fn reset_after(&self, now: Instant, interval: Duration) -> Duration {
        let elapsed = now.duration_since(self.window_start);
        if elapsed >= interval {
            Duration::ZERO
        } else {
            interval - elapsed
        }
    }

    /// Last time this identifier was checked.
    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }
}
