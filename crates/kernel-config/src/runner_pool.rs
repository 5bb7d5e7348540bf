// kernel-config/src/runner_pool.rs
// ============================================================================
// Module: Runner Factory Settings
// Description: Bounds-checked, TOML-friendly form of `RunnerFactoryConfig`.
// Dependencies: serde, kernel-runtime
// ============================================================================

use std::time::Duration;

use kernel_runtime::RunnerFactoryConfig;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigError;

/// Upper bound on the number of resident runners a factory may cache.
pub const MAX_POOL_SIZE: usize = 10_000;

/// Configuration for a [`kernel_runtime::RunnerFactory`]'s warm pool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerPoolSettings {
    /// Maximum number of resident runners.
    pub max_pool_size: usize,
    /// Idle TTL before the sweeper evicts an unaccessed runner, in
    /// milliseconds.
    pub idle_ttl_ms: u64,
    /// Suggested sweep interval, in milliseconds.
    pub sweep_interval_ms: u64,
    /// Whether newly built runners are warmed up immediately.
    pub warmup_on_build: bool,
}

impl Default for RunnerPoolSettings {
    fn default() -> Self {
        Self {
            max_pool_size: 10,
            idle_ttl_ms: 15 * 60 * 1000,
            sweep_interval_ms: 5 * 60 * 1000,
            warmup_on_build: false,
        }
    }
}

impl RunnerPoolSettings {
    /// Validates this settings block.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `max_pool_size` is zero or
    /// exceeds [`MAX_POOL_SIZE`], or `sweep_interval_ms` exceeds
    /// `idle_ttl_ms`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pool_size == 0 {
            return Err(ConfigError::Invalid("runner_pool.max_pool_size must be greater than zero".to_owned()));
        }
        if self.max_pool_size > MAX_POOL_SIZE {
            return Err(ConfigError::Invalid("runner_pool.max_pool_size too large".to_owned()));
        }
        if self.sweep_interval_ms > self.idle_ttl_ms {
            return Err(ConfigError::Invalid(
                "runner_pool.sweep_interval_ms must not exceed idle_ttl_ms".to_owned(),
            ));
        }
        Ok(())
    }

    /// Converts this settings block into a [`RunnerFactoryConfig`].
    #[must_use]
    pub fn to_factory_config(self) -> RunnerFactoryConfig {
        RunnerFactoryConfig {
            max_pool_size: self.max_pool_size,
            idle_ttl: Duration::from_millis(self.idle_ttl_ms),
            sweep_interval: Duration::from_millis(self.sweep_interval_ms),
            warmup_on_build: self.warmup_on_build,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RunnerPoolSettings;

    #[test]
    fn default_settings_validate() {
        assert!(RunnerPoolSettings::default().validate().is_ok());
    }

    #[test]
    fn zero_pool_size_is_invalid() {
        let settings = RunnerPoolSettings {
            max_pool_size: 0,
            ..RunnerPoolSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn sweep_interval_longer_than_ttl_is_invalid() {
        let settings = RunnerPoolSettings {
            idle_ttl_ms: 1_000,
            sweep_interval_ms: 2_000,
            ..RunnerPoolSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
