// kernel-resilience/src/token_bucket.rs
// ============================================================================
// Module: Token Bucket Rate Limiter
// Description: Refilling-bucket rate limiter keyed by capacity and refill
// period.
// Purpose: Bound burst and sustained throughput per tenant/provider.
// Dependencies: kernel-core, std::sync::Mutex
// ============================================================================

//! ## Overview
//! Capacity `C` tokens refill continuously at `C / P` tokens per second,
//! where `P` is the configured refill period. [`TokenBucketLimiter::try_acquire`]
//! refills lazily (on each call, based on elapsed time since the last
//! refill) rather than via a background timer, matching the kernel's
//! no-timer-thread discipline for time-driven state (cf.
//! `kernel_core::state` open/half-open checks).

use std::sync::Mutex;
use std::time::Duration;

use kernel_core::Timestamp;

use crate::metrics::RateLimiterCounters;
use crate::metrics::RateLimiterMetrics;

struct BucketState {
    tokens: f64,
    last_refill: Timestamp,
}

/// Token-bucket rate limiter: capacity `C`, refill period `P`.
///
/// # Invariants
/// - `try_acquire(n)` with `n > capacity` returns `false` immediately
///   without mutating bucket state.
/// - The bucket never holds more than `capacity` tokens.
pub struct TokenBucketLimiter {
    capacity: u32,
    refill_period: Duration,
    state: Mutex<BucketState>,
    counters: RateLimiterCounters,
}

impl TokenBucketLimiter {
    /// Builds a bucket starting full, as of `now`.
    #[must_use]
    pub fn new(capacity: u32, refill_period: Duration, now: Timestamp) -> Self {
        Self {
            capacity,
            refill_period,
            state: Mutex::new(BucketState {
                tokens: f64::from(capacity),
                last_refill: now,
            }),
            counters: RateLimiterCounters::default(),
        }
    }

    /// Tokens added per second of elapsed time.
    fn refill_rate_per_sec(&self) -> f64 {
        if self.refill_period.is_zero() {
            f64::from(self.capacity)
        } else {
            f64::from(self.capacity) / self.refill_period.as_secs_f64()
        }
    }

    /// Attempts to acquire `n` tokens as of `now`.
    ///
    /// Returns `false` immediately, without touching bucket state, when
    /// `n > capacity`. Otherwise refills based on elapsed time (capped at
    /// `capacity`) and then acquires atomically if enough tokens remain.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn try_acquire(&self, n: u32, now: Timestamp) -> bool {
        if n > self.capacity {
            return false;
        }
        let mut state = self.state.lock().expect("token bucket mutex poisoned");
        self.refill_locked(&mut state, now);
        let requested = f64::from(n);
        if state.tokens >= requested {
            state.tokens -= requested;
            self.counters.record_accept();
            true
        } else {
            self.counters.record_reject();
            false
        }
    }

    /// Returns the projected wait before `n` tokens would be available, as
    /// of `now`. Returns `Duration::ZERO` when `n` tokens are already
    /// available, and `None` when `n > capacity` (never satisfiable).
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn time_until_available(&self, n: u32, now: Timestamp) -> Option<Duration> {
        if n > self.capacity {
            return None;
        }
        let mut state = self.state.lock().expect("token bucket mutex poisoned");
        self.refill_locked(&mut state, now);
        let requested = f64::from(n);
        if state.tokens >= requested {
            return Some(Duration::ZERO);
        }
        let deficit = requested - state.tokens;
        let rate = self.refill_rate_per_sec();
        if rate <= 0.0 {
            return Some(Duration::MAX);
        }
        Some(Duration::from_secs_f64(deficit / rate))
    }

    /// Returns an accepted/rejected metrics snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn metrics(&self) -> RateLimiterMetrics {
        let tokens = self.state.lock().expect("token bucket mutex poisoned").tokens;
        #[allow(
            clippy::cast_sign_loss,
            clippy::cast_possible_truncation,
            reason = "tokens never exceeds capacity, which fits u64 comfortably"
        )]
        let consumed = (f64::from(self.capacity) - tokens).max(0.0) as u64;
        self.counters.snapshot(u64::from(self.capacity), consumed)
    }

    fn refill_locked(&self, state: &mut BucketState, now: Timestamp) {
        let elapsed = state.last_refill.elapsed_until(now);
        if elapsed > Duration::ZERO {
            let added = elapsed.as_secs_f64() * self.refill_rate_per_sec();
            state.tokens = (state.tokens + added).min(f64::from(self.capacity));
            state.last_refill = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use kernel_core::Timestamp;
    use time::macros::datetime;

    use super::TokenBucketLimiter;

    fn at(seconds: i64) -> Timestamp {
        Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC) + time::Duration::seconds(seconds))
    }

    #[test]
    fn acquires_up_to_capacity_then_rejects() {
        let bucket = TokenBucketLimiter::new(5, Duration::from_secs(10), at(0));
        for _ in 0..5 {
            assert!(bucket.try_acquire(1, at(0)));
        }
        assert!(!bucket.try_acquire(1, at(0)));
    }

    #[test]
    fn requesting_more_than_capacity_rejects_without_touching_state() {
        let bucket = TokenBucketLimiter::new(5, Duration::from_secs(10), at(0));
        assert!(!bucket.try_acquire(6, at(0)));
        // Capacity is untouched: a full acquire of 5 should still succeed.
        assert!(bucket.try_acquire(5, at(0)));
    }

    #[test]
    fn refills_over_time_up_to_capacity() {
        let bucket = TokenBucketLimiter::new(10, Duration::from_secs(10), at(0));
        for _ in 0..10 {
            assert!(bucket.try_acquire(1, at(0)));
        }
        assert!(!bucket.try_acquire(1, at(0)));
        // Half the refill period elapses: half the capacity refills.
        assert!(bucket.try_acquire(5, at(5)));
        assert!(!bucket.try_acquire(1, at(5)));
    }

    #[test]
    fn time_until_available_reflects_deficit() {
        let bucket = TokenBucketLimiter::new(10, Duration::from_secs(10), at(0));
        for _ in 0..10 {
            assert!(bucket.try_acquire(1, at(0)));
        }
        let wait = bucket.time_until_available(1, at(0)).expect("satisfiable");
        assert!(wait > Duration::ZERO);
    }

    #[test]
    fn time_until_available_is_none_above_capacity() {
        let bucket = TokenBucketLimiter::new(5, Duration::from_secs(10), at(0));
        assert!(bucket.time_until_available(6, at(0)).is_none());
    }
}
