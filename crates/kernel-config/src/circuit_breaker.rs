// kernel-config/src/circuit_breaker.rs
// ============================================================================
// Module: Circuit Breaker Settings
// Description: Bounds-checked, TOML-friendly form of `CircuitBreakerConfig`.
// Dependencies: serde, kernel-resilience
// ============================================================================

use std::time::Duration;

use kernel_resilience::CircuitBreakerConfig;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigError;

/// Configuration for a [`kernel_resilience::CircuitBreaker`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Absolute consecutive-failure threshold `F`.
    pub failure_threshold: u32,
    /// Failure-rate threshold `R`, in `(0, 1]`.
    pub failure_rate_threshold: f64,
    /// Sliding-window size `N` for the rate check; must be `>= F`.
    pub window_size: u32,
    /// Duration the breaker stays open, in milliseconds.
    pub open_duration_ms: u64,
    /// Number of concurrent half-open probes permitted, `H`.
    pub half_open_probes: u32,
    /// Successes required in half-open to close, `S`; must be `<= H`.
    pub half_open_success_threshold: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_rate_threshold: 0.5,
            window_size: 10,
            open_duration_ms: 30_000,
            half_open_probes: 1,
            half_open_success_threshold: 1,
        }
    }
}

impl CircuitBreakerSettings {
    /// Validates this settings block.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `window_size < failure_threshold`,
    /// `half_open_success_threshold > half_open_probes`, or
    /// `failure_rate_threshold` is outside `(0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size < self.failure_threshold {
            return Err(ConfigError::Invalid(
                "circuit_breaker.window_size must be >= failure_threshold".to_owned(),
            ));
        }
        if self.half_open_success_threshold > self.half_open_probes {
            return Err(ConfigError::Invalid(
                "circuit_breaker.half_open_success_threshold must be <= half_open_probes".to_owned(),
            ));
        }
        if self.failure_rate_threshold <= 0.0 || self.failure_rate_threshold > 1.0 {
            return Err(ConfigError::Invalid(
                "circuit_breaker.failure_rate_threshold must be in (0, 1]".to_owned(),
            ));
        }
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "circuit_breaker.failure_threshold must be greater than zero".to_owned(),
            ));
        }
        if self.half_open_probes == 0 {
            return Err(ConfigError::Invalid(
                "circuit_breaker.half_open_probes must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }

    /// Converts this settings block into a [`CircuitBreakerConfig`].
    #[must_use]
    pub fn to_breaker_config(self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            failure_rate_threshold: self.failure_rate_threshold,
            window_size: self.window_size,
            open_duration: Duration::from_millis(self.open_duration_ms),
            half_open_probes: self.half_open_probes,
            half_open_success_threshold: self.half_open_success_threshold,
        }
    }
}
