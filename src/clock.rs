//! Clock abstraction for window expiry.
//!
//! Window arithmetic goes through a [`Clock`] so tests can advance time
//! without sleeping. Production code uses [`SystemClock`].

use std::time::Instant;

/// Source of the current time.
pub trait Clock {
    /// Get the current instant.
    fn now(&self) -> Instant;
}

/// System clock implementation using `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A controllable clock for tests.
///
/// Clones share the same underlying time, so a limiter under test and the
/// test body observe the same advances.
#[cfg(any(test, feature = "test-helpers"))]
#[derive(Debug, Clone)]
pub struct MockClock {
    now: std::sync::Arc<parking_lot::Mutex<Instant>>,
}

#[cfg(any(test, feature = "test-helpers"))]
impl MockClock {
    /// Create a mock clock starting at the current instant.
    pub fn new() -> Self {
        Self {
            now: std::sync::Arc::new(parking_lot::Mutex::new(Instant::now())),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, delta: std::time::Duration) {
        let mut now = self.now.lock();
        *now += delta;
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}
