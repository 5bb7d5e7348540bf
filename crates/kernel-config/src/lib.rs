// kernel-config/src/lib.rs
// ============================================================================
// Crate: kernel-config
// Description: Operator-tunable configuration for the kernel, loaded from a
// single TOML file and validated before use.
// ============================================================================

//! Configuration loading and validation for the inference kernel.
//!
//! `kernel-config` mirrors the native, `Duration`-typed config structs of
//! [`kernel_resilience`] and [`kernel_runtime`] with TOML-friendly,
//! millisecond-based settings blocks, and validates each against the
//! bounds the rest of the kernel assumes.

pub mod circuit_breaker;
pub mod error;
pub mod pipeline;
pub mod rate_limit;
pub mod runner_pool;
pub mod session_pool;

use std::fs;
use std::path::Path;

pub use circuit_breaker::CircuitBreakerSettings;
pub use error::ConfigError;
pub use pipeline::PipelineSettings;
pub use rate_limit::RateLimiterSettings;
pub use rate_limit::MAX_CAPACITY;
pub use rate_limit::MAX_WINDOW_MS;
pub use runner_pool::RunnerPoolSettings;
pub use runner_pool::MAX_POOL_SIZE;
pub use session_pool::SessionPoolSettings;

/// Upper bound on the accepted configuration file size, in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;

/// Aggregate kernel configuration.
///
/// Every field defaults independently, so a configuration file may specify
/// only the sections it wishes to override.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Execution pipeline behavior.
    pub pipeline: PipelineSettings,
    /// Rate limiter selection and bounds.
    pub rate_limiter: RateLimiterSettings,
    /// Circuit breaker thresholds.
    pub circuit_breaker: CircuitBreakerSettings,
    /// Runner factory warm pool.
    pub runner_pool: RunnerPoolSettings,
    /// Session pool per runner.
    pub session_pool: SessionPoolSettings,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineSettings::default(),
            rate_limiter: RateLimiterSettings::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            runner_pool: RunnerPoolSettings::default(),
            session_pool: SessionPoolSettings::default(),
        }
    }
}

impl KernelConfig {
    /// Loads and validates configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read or exceeds
    /// [`MAX_CONFIG_FILE_SIZE`], [`ConfigError::Parse`] when the file is not
    /// valid UTF-8 TOML, and [`ConfigError::Invalid`] when the parsed
    /// configuration fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_owned()));
        }
        let content = std::str::from_utf8(&bytes).map_err(|_| ConfigError::Invalid("config file must be utf-8".to_owned()))?;
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates internal consistency across all settings blocks.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when any settings block fails its
    /// own validation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        self.rate_limiter.validate()?;
        self.circuit_breaker.validate()?;
        self.runner_pool.validate()?;
        self.session_pool.validate()?;
        Ok(())
    }
}
