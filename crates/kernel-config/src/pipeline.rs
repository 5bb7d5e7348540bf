// kernel-config/src/pipeline.rs
// ============================================================================
// Module: Pipeline Settings
// Description: Operator-tunable behavior of the execution pipeline.
// Dependencies: serde
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigError;

/// Operator-tunable pipeline behavior.
///
/// # Invariants
/// - `max_attempts >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Whether `runsOnError` phases (AUDIT, OBSERVABILITY, CLEANUP) still
    /// run when the client disconnects mid-stream during
    /// `PROVIDER_DISPATCH`.
    pub run_cleanup_on_cancel: bool,
    /// Maximum attempts (including the first) before an execution signals
    /// `RETRY_EXHAUSTED`.
    pub max_attempts: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            run_cleanup_on_cancel: true,
            max_attempts: 3,
        }
    }
}

impl PipelineSettings {
    /// Validates this settings block.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `max_attempts` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("pipeline.max_attempts must be greater than zero".to_owned()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::PipelineSettings;

    #[test]
    fn default_runs_cleanup_on_cancel() {
        assert!(PipelineSettings::default().run_cleanup_on_cancel);
    }

    #[test]
    fn zero_max_attempts_is_invalid() {
        let settings = PipelineSettings {
            max_attempts: 0,
            ..PipelineSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
