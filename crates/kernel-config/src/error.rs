// kernel-config/src/error.rs
// ============================================================================
// Module: Config Error
// Description: Failures raised while loading or validating kernel
// configuration.
// Dependencies: thiserror
// ============================================================================

use thiserror::Error;

/// Failures raised while loading or validating kernel configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// I/O failure while reading the configuration file.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing failure.
    #[error("config parse error: {0}")]
    Parse(String),
    /// A configuration value failed validation.
    #[error("invalid config: {0}")]
    Invalid(String),
}
