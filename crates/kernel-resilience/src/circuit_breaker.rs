// kernel-resilience/src/circuit_breaker.rs
// ============================================================================
// Module: Circuit Breaker
// Description: Three-state (closed/open/half-open) failure breaker with
// absolute and rate-based trip thresholds.
// Purpose: Fail fast against a consistently failing candidate instead of
// piling up timeouts against it.
// Dependencies: kernel-core, std::sync::Mutex
// ============================================================================

//! ## Overview
//! [`CircuitBreaker`] guards a single candidate (runner or provider). Callers
//! call [`CircuitBreaker::try_acquire`] before a call and
//! [`CircuitBreaker::record_outcome`] after it completes; the breaker itself
//! never invokes the guarded call. State transitions are taken under a
//! single short-held lock, per the kernel's leaf-lock discipline — the
//! orchestrator in `kernel-broker` never holds this lock across a provider
//! `.await`.

use std::sync::Mutex;
use std::time::Duration;

use kernel_core::Timestamp;
use thiserror::Error;

/// Observed states of a [`CircuitBreaker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls pass through.
    Closed,
    /// Calls fail fast.
    Open,
    /// A bounded number of probe calls are permitted.
    HalfOpen,
}

/// Outcome of a guarded call, as classified by the caller's failure
/// predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// The call succeeded.
    Success,
    /// The call failed, per the caller's failure predicate.
    Failure,
    /// The call neither succeeded nor failed in a way the predicate
    /// recognizes; it affects neither counter.
    Ignored,
}

/// Configuration for a [`CircuitBreaker`].
///
/// # Invariants
/// - `window_size >= failure_threshold` (`N >= F`), per spec.
/// - `half_open_success_threshold <= half_open_probes` (`S <= H`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Absolute consecutive-failure threshold `F`.
    pub failure_threshold: u32,
    /// Failure-rate threshold `R`, in `(0, 1]`.
    pub failure_rate_threshold: f64,
    /// Sliding-window size `N` for the rate check.
    pub window_size: u32,
    /// Duration the breaker stays open before allowing a half-open probe.
    pub open_duration: Duration,
    /// Number of concurrent half-open probes permitted, `H`.
    pub half_open_probes: u32,
    /// Successes required in half-open to close, `S`.
    pub half_open_success_threshold: u32,
}

/// Raised by [`CircuitBreaker::try_acquire`] when the breaker is open.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
#[error("circuit breaker open, retry after {estimated_recovery:?}")]
pub struct CircuitBreakerOpenError {
    /// Estimated time until the breaker allows a half-open probe.
    pub estimated_recovery: Duration,
}

struct Inner {
    state: BreakerState,
    opened_at: Option<Timestamp>,
    consecutive_failures: u32,
    window: Vec<bool>,
    half_open_admitted: u32,
    half_open_successes: u32,
}

/// Three-state circuit breaker guarding a single candidate.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Builds a breaker starting `CLOSED`.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                opened_at: None,
                consecutive_failures: 0,
                window: Vec::new(),
                half_open_admitted: 0,
                half_open_successes: 0,
            }),
        }
    }

    /// Returns the breaker's current state as of `now`, performing the
    /// `OPEN -> HALF_OPEN` check but not admitting a call.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn state(&self, now: Timestamp) -> BreakerState {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        self.maybe_half_open_locked(&mut inner, now);
        inner.state
    }

    /// Requests permission to make a call as of `now`.
    ///
    /// `CLOSED` permits all; `OPEN` permits none until `now >= opened_at +
    /// open_duration`, at which point exactly one call transitions the
    /// breaker to `HALF_OPEN` and is itself admitted as the first probe;
    /// `HALF_OPEN` permits up to `half_open_probes` concurrent calls, then
    /// rejects.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitBreakerOpenError`] when the call is not permitted.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn try_acquire(&self, now: Timestamp) -> Result<(), CircuitBreakerOpenError> {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        self.maybe_half_open_locked(&mut inner, now);

        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let opened_at = inner.opened_at.unwrap_or(now);
                let elapsed = opened_at.elapsed_until(now);
                let estimated_recovery = self.config.open_duration.saturating_sub(elapsed);
                Err(CircuitBreakerOpenError { estimated_recovery })
            }
            BreakerState::HalfOpen => {
                if inner.half_open_admitted < self.config.half_open_probes {
                    inner.half_open_admitted += 1;
                    Ok(())
                } else {
                    Err(CircuitBreakerOpenError {
                        estimated_recovery: Duration::ZERO,
                    })
                }
            }
        }
    }

    /// Records the outcome of a call previously admitted by
    /// [`CircuitBreaker::try_acquire`].
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn record_outcome(&self, outcome: CallOutcome, now: Timestamp) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        match (inner.state, outcome) {
            (_, CallOutcome::Ignored) => {}
            (BreakerState::HalfOpen, CallOutcome::Success) => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.half_open_success_threshold {
                    self.reset_to_closed_locked(&mut inner);
                }
            }
            (BreakerState::HalfOpen, CallOutcome::Failure) => {
                self.trip_open_locked(&mut inner, now);
            }
            (_, CallOutcome::Success) => {
                inner.consecutive_failures = 0;
                push_capped(&mut inner.window, false, self.config.window_size);
            }
            (_, CallOutcome::Failure) => {
                inner.consecutive_failures += 1;
                push_capped(&mut inner.window, true, self.config.window_size);
                if self.should_trip_locked(&inner) {
                    self.trip_open_locked(&mut inner, now);
                }
            }
        }
    }

    /// Manually trips the breaker open, regardless of recorded outcomes.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn trip_open(&self, now: Timestamp) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        self.trip_open_locked(&mut inner, now);
    }

    /// Manually resets the breaker to `CLOSED`, clearing all counters.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        self.reset_to_closed_locked(&mut inner);
    }

    fn should_trip_locked(&self, inner: &Inner) -> bool {
        if inner.consecutive_failures >= self.config.failure_threshold {
            return true;
        }
        let window_size = self.config.window_size as usize;
        if inner.window.len() < window_size {
            return false;
        }
        let failures = inner.window.iter().filter(|failed| **failed).count();
        #[allow(
            clippy::cast_precision_loss,
            reason = "window sizes are small configuration values, not precision-sensitive counts"
        )]
        let rate = failures as f64 / inner.window.len() as f64;
        rate >= self.config.failure_rate_threshold
    }

    fn trip_open_locked(&self, inner: &mut Inner, now: Timestamp) {
        inner.state = BreakerState::Open;
        inner.opened_at = Some(now);
        inner.half_open_admitted = 0;
        inner.half_open_successes = 0;
    }

    fn reset_to_closed_locked(&self, inner: &mut Inner) {
        inner.state = BreakerState::Closed;
        inner.opened_at = None;
        inner.consecutive_failures = 0;
        inner.window.clear();
        inner.half_open_admitted = 0;
        inner.half_open_successes = 0;
    }

    fn maybe_half_open_locked(&self, inner: &mut Inner, now: Timestamp) {
        if inner.state == BreakerState::Open {
            if let Some(opened_at) = inner.opened_at {
                if opened_at.elapsed_until(now) >= self.config.open_duration {
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_admitted = 0;
                    inner.half_open_successes = 0;
                }
            }
        }
    }
}

fn push_capped(window: &mut Vec<bool>, value: bool, cap: u32) {
    window.push(value);
    let cap = cap as usize;
    if window.len() > cap {
        window.remove(0);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use kernel_core::Timestamp;
    use time::macros::datetime;

    use super::BreakerState;
    use super::CallOutcome;
    use super::CircuitBreaker;
    use super::CircuitBreakerConfig;

    fn at(seconds: i64) -> Timestamp {
        Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC) + time::Duration::seconds(seconds))
    }

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            failure_rate_threshold: 0.5,
            window_size: 4,
            open_duration: Duration::from_secs(60),
            half_open_probes: 2,
            half_open_success_threshold: 2,
        }
    }

    #[test]
    fn starts_closed_and_permits_calls() {
        let breaker = CircuitBreaker::new(config());
        assert_eq!(breaker.state(at(0)), BreakerState::Closed);
        assert!(breaker.try_acquire(at(0)).is_ok());
    }

    #[test]
    fn trips_open_on_consecutive_failure_threshold() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..3 {
            breaker.try_acquire(at(0)).expect("closed permits calls");
            breaker.record_outcome(CallOutcome::Failure, at(0));
        }
        assert_eq!(breaker.state(at(0)), BreakerState::Open);
        assert!(breaker.try_acquire(at(0)).is_err());
    }

    #[test]
    fn open_transitions_to_half_open_after_duration_and_admits_h_probes() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..3 {
            breaker.try_acquire(at(0)).expect("closed permits calls");
            breaker.record_outcome(CallOutcome::Failure, at(0));
        }
        assert!(breaker.try_acquire(at(30)).is_err());
        assert_eq!(breaker.state(at(60)), BreakerState::HalfOpen);
        assert!(breaker.try_acquire(at(60)).is_ok());
        assert!(breaker.try_acquire(at(60)).is_ok());
        assert!(breaker.try_acquire(at(60)).is_err());
    }

    #[test]
    fn half_open_success_threshold_closes_the_breaker() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..3 {
            breaker.try_acquire(at(0)).expect("closed permits calls");
            breaker.record_outcome(CallOutcome::Failure, at(0));
        }
        assert!(breaker.try_acquire(at(60)).is_ok());
        breaker.record_outcome(CallOutcome::Success, at(60));
        assert!(breaker.try_acquire(at(60)).is_ok());
        breaker.record_outcome(CallOutcome::Success, at(60));
        assert_eq!(breaker.state(at(60)), BreakerState::Closed);
    }

    #[test]
    fn half_open_probe_failure_reopens_immediately() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..3 {
            breaker.try_acquire(at(0)).expect("closed permits calls");
            breaker.record_outcome(CallOutcome::Failure, at(0));
        }
        assert!(breaker.try_acquire(at(60)).is_ok());
        breaker.record_outcome(CallOutcome::Failure, at(60));
        assert_eq!(breaker.state(at(60)), BreakerState::Open);
    }

    #[test]
    fn ignored_outcomes_do_not_affect_counters() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..10 {
            breaker.try_acquire(at(0)).expect("closed permits calls");
            breaker.record_outcome(CallOutcome::Ignored, at(0));
        }
        assert_eq!(breaker.state(at(0)), BreakerState::Closed);
    }

    #[test]
    fn manual_trip_open_and_reset() {
        let breaker = CircuitBreaker::new(config());
        breaker.trip_open(at(0));
        assert_eq!(breaker.state(at(0)), BreakerState::Open);
        breaker.reset();
        assert_eq!(breaker.state(at(0)), BreakerState::Closed);
        assert!(breaker.try_acquire(at(0)).is_ok());
    }
}
