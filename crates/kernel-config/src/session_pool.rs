// kernel-config/src/session_pool.rs
// ============================================================================
// Module: Session Pool Settings
// Description: Bounds-checked, TOML-friendly form of `SessionPoolConfig`.
// Dependencies: serde, kernel-runtime
// ============================================================================

use std::time::Duration;

use kernel_runtime::SessionPoolConfig;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigError;

/// Configuration for a runner's session pool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPoolSettings {
    /// Maximum sessions held concurrently.
    pub max_concurrent: usize,
    /// Idle timeout before an unused session is reclaimed, in milliseconds.
    pub idle_timeout_ms: u64,
    /// Maximum session lifetime regardless of activity, in milliseconds.
    pub max_age_ms: u64,
    /// Whether idle sessions may be reused across requests.
    pub reuse: bool,
    /// Number of sessions to keep pre-warmed.
    pub warm_pool_count: usize,
}

impl Default for SessionPoolSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            idle_timeout_ms: 5 * 60 * 1000,
            max_age_ms: 60 * 60 * 1000,
            reuse: true,
            warm_pool_count: 0,
        }
    }
}

impl SessionPoolSettings {
    /// Validates this settings block.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `max_concurrent` is zero or
    /// `warm_pool_count` exceeds `max_concurrent`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::Invalid("session_pool.max_concurrent must be greater than zero".to_owned()));
        }
        if self.warm_pool_count > self.max_concurrent {
            return Err(ConfigError::Invalid(
                "session_pool.warm_pool_count must not exceed max_concurrent".to_owned(),
            ));
        }
        Ok(())
    }

    /// Converts this settings block into a [`SessionPoolConfig`].
    #[must_use]
    pub fn to_pool_config(self) -> SessionPoolConfig {
        SessionPoolConfig {
            max_concurrent: self.max_concurrent,
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
            max_age: Duration::from_millis(self.max_age_ms),
            reuse: self.reuse,
            warm_pool_count: self.warm_pool_count,
        }
    }
}
