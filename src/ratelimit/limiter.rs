//! Core rate limiter implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};
use crate::config::RateLimitingConfig;
use crate::error::{RampartError, Result};

use super::counter::WindowCounter;

/// Outcome of an admitted rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// The limit applied to this check
    pub limit: u64,
    /// Requests still available in the current window
    pub remaining: u64,
    /// Time until the current window resets
    pub reset_after: Duration,
}

/// The core rate limiter that manages per-identifier counters.
///
/// This struct is thread-safe and is meant to be constructed once at process
/// start and shared across request handlers behind an [`Arc`], not stashed
/// in a module-level global, so tests can build isolated stores.
///
/// The store lives in one process's memory. Replicas behind a load balancer
/// each count their own traffic, so aggregate limits are under-counted
/// without an external shared store; that is an accepted limitation.
pub struct RateLimiter<C: Clock = SystemClock> {
    /// Window counters indexed by identifier
    counters: DashMap<String, WindowCounter>,
    /// Length of the counting window
    interval: Duration,
    /// Upper bound on distinct tracked identifiers
    max_identifiers: usize,
    /// Serializes capacity enforcement for first-time identifiers
    evict_lock: Mutex<()>,
    /// Time source for window arithmetic
    clock: C,
}

impl RateLimiter<SystemClock> {
    /// Create a rate limiter on the system clock.
    pub fn new(config: RateLimitingConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock::new())
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Create a rate limiter with an explicit time source.
    pub fn with_clock(config: RateLimitingConfig, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            counters: DashMap::new(),
            interval: config.interval(),
            max_identifiers: config.max_identifiers,
            evict_lock: Mutex::new(()),
            clock,
        })
    }

    /// Check and consume quota for one request from `identifier`.
    ///
    /// The first `limit` calls within a window succeed; further calls fail
    /// with [`RampartError::RateLimitExceeded`] until the window rolls over.
    /// The read-modify-write runs under the store's shard lock, so no
    /// interleaving of concurrent checks admits more than `limit` requests.
    ///
    /// An empty identifier or a zero limit fails with
    /// [`RampartError::InvalidConfiguration`].
    pub fn check(&self, identifier: &str, limit: u64) -> Result<RateLimitStatus> {
        if identifier.is_empty() {
            return Err(RampartError::InvalidConfiguration(
                "identifier must not be empty".to_string(),
            ));
        }
        if limit == 0 {
            return Err(RampartError::InvalidConfiguration(
                "limit must be positive".to_string(),
            ));
        }

        let now = self.clock.now();

        trace!(identifier, limit, "Checking rate limit");

        // Existing identifier: mutate in place under the shard lock.
        if let Some(mut entry) = self.counters.get_mut(identifier) {
            return self.decide(identifier, entry.value_mut(), now, limit);
        }

        // First sighting: make room, then insert. A concurrent check for the
        // same identifier may win the insert race; the entry API resolves it.
        self.reserve_slot(now);
        let mut entry = self
            .counters
            .entry(identifier.to_string())
            .or_insert_with(|| {
                debug!(identifier, "Creating new rate limit counter");
                WindowCounter::new(now)
            });
        self.decide(identifier, entry.value_mut(), now, limit)
    }

    /// Apply the window quota to a locked counter.
    fn decide(
        &self,
        identifier: &str,
        counter: &mut WindowCounter,
        now: Instant,
        limit: u64,
    ) -> Result<RateLimitStatus> {
        if counter.try_increment(now, self.interval, limit) {
            Ok(RateLimitStatus {
                limit,
                remaining: counter.remaining(limit),
                reset_after: counter.reset_after(now, self.interval),
            })
        } else {
            let retry_after = counter.reset_after(now, self.interval);
            debug!(identifier, limit, "Rate limit exceeded");
            Err(RampartError::RateLimitExceeded {
                identifier: identifier.to_string(),
                retry_after,
            })
        }
    }

    /// Free a slot for a new identifier when the store is at capacity.
    ///
    /// Expired counters go first; if the store is still full, the least
    /// recently seen entry is evicted. The bound is approximate under
    /// concurrent first-time inserts, which may briefly overshoot it.
    fn reserve_slot(&self, now: Instant) {
        if self.counters.len() < self.max_identifiers {
            return;
        }

        let _guard = self.evict_lock.lock();
        if self.counters.len() < self.max_identifiers {
            return;
        }

        let interval = self.interval;
        self.counters
            .retain(|_, counter| !counter.is_expired(now, interval));

        while self.counters.len() >= self.max_identifiers {
            let victim = self
                .counters
                .iter()
                .min_by_key(|entry| entry.value().last_seen())
                .map(|entry| entry.key().clone());
            match victim {
                Some(key) => {
                    debug!(identifier = %key, "Evicting least recently seen rate limit counter");
                    self.counters.remove(&key);
                }
                None => break,
            }
        }
    }

    /// Remove every counter whose window has fully elapsed.
    ///
    /// Returns the number of counters removed. Expiry is already checked
    /// lazily on access; sweeping bounds memory for identifiers that never
    /// come back.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let interval = self.interval;
        let before = self.counters.len();
        self.counters
            .retain(|_, counter| !counter.is_expired(now, interval));
        before.saturating_sub(self.counters.len())
    }

    /// Get the current count for an identifier.
    ///
    /// Returns `None` if no counter exists. An expired counter reads as its
    /// stale count until the next check or sweep touches it.
    pub fn count(&self, identifier: &str) -> Option<u64> {
        self.counters.get(identifier).map(|c| c.count())
    }

    /// Get the number of tracked identifiers.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether the store is tracking no identifiers.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Clear all counters.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.counters.clear();
    }
}

impl<C: Clock + Send + Sync + 'static> RateLimiter<C> {
    /// Spawn a background task that sweeps expired counters every `period`.
    ///
    /// The task holds only a weak reference and winds down on its own once
    /// the limiter is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                let removed = limiter.sweep();
                if removed > 0 {
                    debug!(removed, "Swept expired rate limit counters");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn test_config(interval_ms: u64, max_identifiers: usize) -> RateLimitingConfig {
        RateLimitingConfig {
            interval_ms,
            max_identifiers,
            ..Default::default()
        }
    }

    fn mock_limiter(interval_ms: u64, max_identifiers: usize) -> (RateLimiter<MockClock>, MockClock) {
        let clock = MockClock::new();
        let limiter =
            RateLimiter::with_clock(test_config(interval_ms, max_identifiers), clock.clone())
                .unwrap();
        (limiter, clock)
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let result = RateLimiter::new(test_config(0, 100));
        assert!(matches!(
            result,
            Err(RampartError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_empty_identifier_rejected() {
        let (limiter, _clock) = mock_limiter(60_000, 100);
        assert!(matches!(
            limiter.check("", 5),
            Err(RampartError::InvalidConfiguration(_))
        ));
        assert!(limiter.is_empty());
    }

    #[test]
    fn test_zero_limit_rejected() {
        let (limiter, _clock) = mock_limiter(60_000, 100);
        assert!(matches!(
            limiter.check("1.2.3.4", 0),
            Err(RampartError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_limit_admits_then_rejects() {
        let (limiter, _clock) = mock_limiter(60_000, 100);

        for _ in 0..5 {
            assert!(limiter.check("1.2.3.4", 5).is_ok());
        }

        let err = limiter.check("1.2.3.4", 5).unwrap_err();
        match err {
            RampartError::RateLimitExceeded {
                identifier,
                retry_after,
            } => {
                assert_eq!(identifier, "1.2.3.4");
                assert!(retry_after > Duration::ZERO);
                assert!(retry_after <= Duration::from_millis(60_000));
            }
            other => panic!("expected RateLimitExceeded, got {other:?}"),
        }

        // Rejection does not consume quota state
        assert_eq!(limiter.count("1.2.3.4"), Some(5));
    }

    #[test]
    fn test_window_resets_after_interval() {
        let (limiter, clock) = mock_limiter(60_000, 100);

        for _ in 0..5 {
            assert!(limiter.check("1.2.3.4", 5).is_ok());
        }
        assert!(limiter.check("1.2.3.4", 5).is_err());

        clock.advance(Duration::from_millis(61_000));
        assert!(limiter.check("1.2.3.4", 5).is_ok());
        assert_eq!(limiter.count("1.2.3.4"), Some(1));

        // The fresh window carries a full quota again
        for _ in 0..4 {
            assert!(limiter.check("1.2.3.4", 5).is_ok());
        }
        assert!(limiter.check("1.2.3.4", 5).is_err());
    }

    #[test]
    fn test_identifiers_have_separate_counters() {
        let (limiter, _clock) = mock_limiter(60_000, 100);

        for _ in 0..3 {
            assert!(limiter.check("1.2.3.4", 3).is_ok());
        }
        assert!(limiter.check("1.2.3.4", 3).is_err());
        assert!(limiter.check("5.6.7.8", 3).is_ok());

        assert_eq!(limiter.count("1.2.3.4"), Some(3));
        assert_eq!(limiter.count("5.6.7.8"), Some(1));
    }

    #[test]
    fn test_status_reports_quota() {
        let (limiter, clock) = mock_limiter(60_000, 100);

        let status = limiter.check("key", 10).unwrap();
        assert_eq!(status.limit, 10);
        assert_eq!(status.remaining, 9);
        assert_eq!(status.reset_after, Duration::from_millis(60_000));

        clock.advance(Duration::from_millis(15_000));
        let status = limiter.check("key", 10).unwrap();
        assert_eq!(status.remaining, 8);
        assert_eq!(status.reset_after, Duration::from_millis(45_000));
    }

    #[test]
    fn test_eviction_prefers_expired_counters() {
        let (limiter, clock) = mock_limiter(60_000, 2);

        limiter.check("old", 5).unwrap();
        clock.advance(Duration::from_millis(61_000));
        limiter.check("fresh", 5).unwrap();

        // "old" has expired; the new identifier displaces it, not "fresh"
        limiter.check("new", 5).unwrap();
        assert_eq!(limiter.len(), 2);
        assert!(limiter.count("old").is_none());
        assert!(limiter.count("fresh").is_some());
    }

    #[test]
    fn test_eviction_falls_back_to_least_recently_seen() {
        let (limiter, clock) = mock_limiter(60_000, 2);

        limiter.check("first", 5).unwrap();
        clock.advance(Duration::from_millis(1_000));
        limiter.check("second", 5).unwrap();
        clock.advance(Duration::from_millis(1_000));

        // Neither window has expired, so the oldest-seen entry goes
        limiter.check("third", 5).unwrap();
        assert_eq!(limiter.len(), 2);
        assert!(limiter.count("first").is_none());
        assert!(limiter.count("second").is_some());
        assert!(limiter.count("third").is_some());
    }

    #[test]
    fn test_sweep_removes_expired_counters() {
        let (limiter, clock) = mock_limiter(60_000, 100);

        limiter.check("a", 5).unwrap();
        limiter.check("b", 5).unwrap();
        clock.advance(Duration::from_millis(30_000));
        limiter.check("c", 5).unwrap();

        clock.advance(Duration::from_millis(31_000));
        // "a" and "b" are past the interval; "c" is 31s into its window
        assert_eq!(limiter.sweep(), 2);
        assert_eq!(limiter.len(), 1);
        assert!(limiter.count("c").is_some());
    }

    #[test]
    fn test_clear_counters() {
        let (limiter, _clock) = mock_limiter(60_000, 100);

        limiter.check("a", 5).unwrap();
        assert_eq!(limiter.len(), 1);

        limiter.clear();
        assert!(limiter.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checks_admit_exactly_limit() {
        let limiter = Arc::new(RateLimiter::new(test_config(60_000, 100)).unwrap());
        let limit = 8u64;
        let tasks = 32;

        let mut handles = Vec::with_capacity(tasks);
        for _ in 0..tasks {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.check("shared", limit).is_ok()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, limit as usize);
        assert_eq!(limiter.count("shared"), Some(limit));
    }

    #[test]
    fn test_sweeper_stops_after_drop() {
        tokio_test::block_on(async {
            let limiter = Arc::new(RateLimiter::new(test_config(60_000, 100)).unwrap());
            let handle = limiter.spawn_sweeper(Duration::from_millis(5));

            drop(limiter);
            handle.await.unwrap();
        });
    }

    #[tokio::test]
    async fn test_sweeper_drains_expired_counters() {
        let limiter = Arc::new(RateLimiter::new(test_config(50, 100)).unwrap());
        limiter.check("a", 5).unwrap();
        limiter.check("b", 5).unwrap();

        let handle = limiter.spawn_sweeper(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(limiter.is_empty());
        drop(limiter);
        handle.await.unwrap();
    }
}
