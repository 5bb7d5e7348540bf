// kernel-config/src/rate_limit.rs
// ============================================================================
// Module: Rate Limiter Settings
// Description: Selects and bounds-checks one of the two interchangeable
// rate limiter implementations for a provider/tenant pairing.
// Dependencies: serde
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigError;

/// Upper bound on a configured rate limiter's capacity, regardless of kind.
pub const MAX_CAPACITY: u32 = 1_000_000;
/// Upper bound on a configured time window, in milliseconds.
pub const MAX_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

/// Configuration for one of the kernel's two rate limiter implementations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RateLimiterSettings {
    /// Token bucket: `capacity` tokens refilled over `refill_period_ms`.
    TokenBucket {
        /// Bucket capacity `C`.
        capacity: u32,
        /// Refill period `P`, in milliseconds.
        refill_period_ms: u64,
    },
    /// Sliding window: `capacity` acquisitions per `window_ms`.
    SlidingWindow {
        /// Window capacity `M`.
        capacity: usize,
        /// Window size `W`, in milliseconds.
        window_ms: u64,
    },
}

impl Default for RateLimiterSettings {
    fn default() -> Self {
        Self::TokenBucket {
            capacity: 60,
            refill_period_ms: 60_000,
        }
    }
}

impl RateLimiterSettings {
    /// Validates this settings block.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when capacity or window/period is
    /// zero or exceeds the configured upper bound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::TokenBucket {
                capacity,
                refill_period_ms,
            } => {
                if *capacity == 0 {
                    return Err(ConfigError::Invalid("rate_limiter.capacity must be greater than zero".to_owned()));
                }
                if *capacity > MAX_CAPACITY {
                    return Err(ConfigError::Invalid("rate_limiter.capacity too large".to_owned()));
                }
                if *refill_period_ms == 0 {
                    return Err(ConfigError::Invalid(
                        "rate_limiter.refill_period_ms must be greater than zero".to_owned(),
                    ));
                }
                if *refill_period_ms > MAX_WINDOW_MS {
                    return Err(ConfigError::Invalid("rate_limiter.refill_period_ms too large".to_owned()));
                }
            }
            Self::SlidingWindow { capacity, window_ms } => {
                if *capacity == 0 {
                    return Err(ConfigError::Invalid("rate_limiter.capacity must be greater than zero".to_owned()));
                }
                if *window_ms == 0 {
                    return Err(ConfigError::Invalid("rate_limiter.window_ms must be greater than zero".to_owned()));
                }
                if *window_ms > MAX_WINDOW_MS {
                    return Err(ConfigError::Invalid("rate_limiter.window_ms too large".to_owned()));
                }
            }
        }
        Ok(())
    }
}
