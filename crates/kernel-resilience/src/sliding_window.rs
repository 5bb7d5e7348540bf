// kernel-resilience/src/sliding_window.rs
// ============================================================================
// Module: Sliding Window Rate Limiter
// Description: Deque-of-timestamps rate limiter keyed by capacity and window
// length.
// Purpose: Bound the number of accepted calls within any rolling window of
// duration W.
// Dependencies: kernel-core, std::sync::Mutex, std::collections::VecDeque
// ============================================================================

//! ## Overview
//! Capacity `M` within window `W`. [`SlidingWindowLimiter::try_acquire`]
//! evicts timestamps older than `now - W` under a single write lock, then
//! accepts iff the remaining count is below `M`. Only single-permit
//! acquisition is supported: the window tracks individual call timestamps,
//! not a fungible token count, so requesting more than one permit at a time
//! has no well-defined meaning here (unlike the token bucket).

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use kernel_core::Timestamp;

use crate::metrics::RateLimiterCounters;
use crate::metrics::RateLimiterMetrics;

/// Sliding-window rate limiter: capacity `M`, window `W`.
///
/// # Invariants
/// - At any instant, the number of timestamps retained that fall within the
///   trailing window of length `W` never exceeds `M`.
pub struct SlidingWindowLimiter {
    capacity: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Timestamp>>,
    counters: RateLimiterCounters,
}

impl SlidingWindowLimiter {
    /// Builds an empty limiter with capacity `M` and window `W`.
    #[must_use]
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            capacity,
            window,
            timestamps: Mutex::new(VecDeque::new()),
            counters: RateLimiterCounters::default(),
        }
    }

    /// Attempts to acquire a single permit as of `now`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn try_acquire(&self, now: Timestamp) -> bool {
        let mut timestamps = self.timestamps.lock().expect("sliding window mutex poisoned");
        self.evict_locked(&mut timestamps, now);
        if timestamps.len() < self.capacity {
            timestamps.push_back(now);
            self.counters.record_accept();
            true
        } else {
            self.counters.record_reject();
            false
        }
    }

    /// Returns `capacity - current_count` after evicting expired timestamps
    /// as of `now`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn available_permits(&self, now: Timestamp) -> usize {
        let mut timestamps = self.timestamps.lock().expect("sliding window mutex poisoned");
        self.evict_locked(&mut timestamps, now);
        self.capacity.saturating_sub(timestamps.len())
    }

    /// Returns an accepted/rejected metrics snapshot as of `now`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        reason = "window occupancy is bounded by capacity, which is itself a usize"
    )]
    pub fn metrics(&self, now: Timestamp) -> RateLimiterMetrics {
        let mut timestamps = self.timestamps.lock().expect("sliding window mutex poisoned");
        self.evict_locked(&mut timestamps, now);
        self.counters.snapshot(self.capacity as u64, timestamps.len() as u64)
    }

    fn evict_locked(&self, timestamps: &mut VecDeque<Timestamp>, now: Timestamp) {
        while let Some(oldest) = timestamps.front() {
            if oldest.elapsed_until(now) > self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use kernel_core::Timestamp;
    use time::macros::datetime;

    use super::SlidingWindowLimiter;

    fn at_millis(millis: i64) -> Timestamp {
        Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC) + time::Duration::milliseconds(millis))
    }

    #[test]
    fn burst_within_capacity_accepted_then_rejected() {
        let limiter = SlidingWindowLimiter::new(5, Duration::from_secs(1));
        for _ in 0..5 {
            assert!(limiter.try_acquire(at_millis(0)));
        }
        for _ in 0..5 {
            assert!(!limiter.try_acquire(at_millis(0)));
        }
    }

    #[test]
    fn window_slides_and_permits_refresh() {
        let limiter = SlidingWindowLimiter::new(5, Duration::from_secs(1));
        for _ in 0..5 {
            assert!(limiter.try_acquire(at_millis(0)));
        }
        assert!(!limiter.try_acquire(at_millis(500)));
        assert!(limiter.try_acquire(at_millis(1001)));
    }

    #[test]
    fn available_permits_reflects_evicted_entries() {
        let limiter = SlidingWindowLimiter::new(5, Duration::from_secs(1));
        for _ in 0..3 {
            assert!(limiter.try_acquire(at_millis(0)));
        }
        assert_eq!(limiter.available_permits(at_millis(0)), 2);
        assert_eq!(limiter.available_permits(at_millis(1001)), 5);
    }
}
