// kernel-core/src/pipeline.rs
// ============================================================================
// Module: Pipeline & Phase Dispatch
// Description: The fixed ten-phase execution pipeline and the plugin trait
// that implements each phase.
// Purpose: Drive an execution context through admission, validation,
// routing, dispatch, and completion in a well-defined order.
// Dependencies: async-trait, serde, thiserror, crate::{error, state, time,
// token}
// ============================================================================

//! ## Overview
//! [`Phase`] is a closed, ten-variant enum rather than an open plugin
//! taxonomy: the kernel always runs the same phases in the same order, so a
//! `const fn` table beats a registry. [`PhasePlugin`] is the trait a
//! concrete implementation of a phase satisfies; [`Pipeline`] holds the
//! plugins registered per phase and drives them in [`Phase::ordered`]
//! order, honoring each phase's `is_critical`/`is_retryable`/
//! `runs_on_error` classification exactly as laid out in the pipeline
//! execution contract below.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::error::ErrorEnvelope;
use crate::error::ErrorKind;
use crate::error::SuggestedAction;
use crate::error::ToErrorEnvelope;
use crate::state::IllegalStateTransition;
use crate::state::Signal;
use crate::time::Clock;
use crate::time::Timestamp;
use crate::token::ExecutionContext;

// ============================================================================
// SECTION: Phase
// ============================================================================

/// One stage of the fixed kernel execution pipeline.
///
/// # Invariants
/// - [`Phase::ordered`] always returns the same ten phases in the same
///   order; nothing in the kernel reorders or skips a phase outside the
///   classification returned by `is_critical`/`runs_on_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Cheap structural pre-checks before full validation.
    PreValidate,
    /// Validates request shape and parameter ranges.
    Validate,
    /// Checks tenant authorization and model entitlement.
    Authorize,
    /// Ranks candidate runners via the selection policy.
    Route,
    /// Produces a `ProviderRequest` from the `InferenceRequest`.
    PreProcessing,
    /// Invokes the selected provider to perform inference.
    ProviderDispatch,
    /// Normalizes the `ProviderResponse` into the `InferenceResponse`.
    PostProcessing,
    /// Emits the audit trail for this execution.
    Audit,
    /// Emits observability events for this execution.
    Observability,
    /// Releases resources held by this execution.
    Cleanup,
}

impl Phase {
    /// Returns the ten phases in their fixed execution order.
    #[must_use]
    pub const fn ordered() -> [Self; 10] {
        [
            Self::PreValidate,
            Self::Validate,
            Self::Authorize,
            Self::Route,
            Self::PreProcessing,
            Self::ProviderDispatch,
            Self::PostProcessing,
            Self::Audit,
            Self::Observability,
            Self::Cleanup,
        ]
    }

    /// Returns true when a failure in this phase must abort the pipeline.
    #[must_use]
    pub const fn is_critical(self) -> bool {
        matches!(self, Self::PreValidate | Self::Validate | Self::Authorize | Self::ProviderDispatch)
    }

    /// Returns true when this phase may be retried / falls back to the
    /// next candidate on failure.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Route | Self::ProviderDispatch)
    }

    /// Returns true when re-running this phase has no side effect beyond
    /// its own outcome.
    #[must_use]
    pub const fn is_idempotent(self) -> bool {
        !matches!(self, Self::ProviderDispatch)
    }

    /// Returns true when this phase must still run in best-effort mode
    /// after an earlier phase failed.
    #[must_use]
    pub const fn runs_on_error(self) -> bool {
        matches!(self, Self::Audit | Self::Observability | Self::Cleanup)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PreValidate => "pre_validate",
            Self::Validate => "validate",
            Self::Authorize => "authorize",
            Self::Route => "route",
            Self::PreProcessing => "pre_processing",
            Self::ProviderDispatch => "provider_dispatch",
            Self::PostProcessing => "post_processing",
            Self::Audit => "audit",
            Self::Observability => "observability",
            Self::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

// ============================================================================
// SECTION: Phase Plugin
// ============================================================================

/// Implements a unit of logic bound to one pipeline phase.
///
/// Plugins within a phase run in ascending [`PhasePlugin::order`], ties
/// broken by [`PhasePlugin::id`] lexicographic order.
#[async_trait]
pub trait PhasePlugin: Send + Sync {
    /// Stable identifier for this plugin, used to break order ties.
    fn id(&self) -> &str;

    /// Relative ordering among plugins registered for the same phase;
    /// lower runs first.
    fn order(&self) -> i32 {
        0
    }

    /// The phase this plugin runs under.
    fn phase(&self) -> Phase;

    /// Invoked once at kernel startup, before any execution runs.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when the plugin cannot initialize.
    async fn initialize(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Executes this phase's logic against `ctx`, mutating its published
    /// token and error slot as needed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when the phase cannot complete.
    async fn execute(&self, ctx: &ExecutionContext) -> Result<(), PipelineError>;

    /// Invoked once at kernel teardown.
    async fn shutdown(&self) {}
}

// ============================================================================
// SECTION: Pipeline Errors
// ============================================================================

/// Raised by [`Pipeline::run`] when a phase fails or the pipeline is
/// misconfigured.
#[derive(Debug, Error, Clone)]
pub enum PipelineError {
    /// `phase` failed.
    #[error("phase {phase} failed: {message}")]
    PhaseFailed {
        /// The phase that failed.
        phase: Phase,
        /// Human-readable failure message.
        message: String,
        /// Normalized error kind for this failure.
        kind: ErrorKind,
    },
}

impl PipelineError {
    /// Builds a [`PipelineError::PhaseFailed`] with the given phase, kind,
    /// and message.
    #[must_use]
    pub fn phase_failed(phase: Phase, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::PhaseFailed {
            phase,
            message: message.into(),
            kind,
        }
    }
}

impl ToErrorEnvelope for PipelineError {
    fn to_error_envelope(&self, timestamp: Timestamp, attempt: u32, max_attempts: u32) -> ErrorEnvelope {
        let Self::PhaseFailed { phase, message, kind } = self;
        let retryable = kind.retryable_default();
        ErrorEnvelope {
            kind: *kind,
            message: message.clone(),
            details: serde_json::Value::Null,
            retryable,
            origin_node: Some(phase.to_string()),
            origin_run_id: None,
            attempt,
            max_attempts,
            timestamp,
            suggested_action: if retryable {
                SuggestedAction::Retry
            } else {
                SuggestedAction::Escalate
            },
            provenance_ref: None,
        }
    }
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Drives an [`ExecutionContext`] through the fixed ten-phase sequence,
/// per the execution contract:
///
/// 1. Advance status `CREATED` → `RUNNING`.
/// 2. For each phase in order: enter the phase, run its registered
///    plugins in order; on a critical-phase failure, set the error slot,
///    signal `PHASE_FAILURE`, and stop iterating non-`runs_on_error`
///    phases — but `runs_on_error` phases still run in best-effort mode.
/// 3. On clean completion, signal `EXECUTION_SUCCESS`.
pub struct Pipeline {
    plugins: Vec<Box<dyn PhasePlugin>>,
}

impl Pipeline {
    /// Builds an empty pipeline; plugins are added with
    /// [`Pipeline::register`].
    #[must_use]
    pub fn new() -> Self {
        Self { plugins: Vec::new() }
    }

    /// Registers `plugin`, keeping plugins sorted by `(order, id)`.
    pub fn register(&mut self, plugin: Box<dyn PhasePlugin>) -> &mut Self {
        self.plugins.push(plugin);
        self.plugins.sort_by(|a, b| a.order().cmp(&b.order()).then_with(|| a.id().cmp(b.id())));
        self
    }

    /// Invokes [`PhasePlugin::initialize`] on every registered plugin.
    ///
    /// # Errors
    ///
    /// Returns the first [`PipelineError`] any plugin's initialization
    /// raises.
    pub async fn initialize(&self) -> Result<(), PipelineError> {
        for plugin in &self.plugins {
            plugin.initialize().await?;
        }
        Ok(())
    }

    /// Invokes [`PhasePlugin::shutdown`] on every registered plugin.
    pub async fn shutdown(&self) {
        for plugin in &self.plugins {
            plugin.shutdown().await;
        }
    }

    /// Runs every phase in [`Phase::ordered`] order against `ctx`.
    ///
    /// # Errors
    ///
    /// Returns the first [`PipelineError`] raised by a critical phase (or
    /// any phase, once any phase has failed); `runs_on_error` phases still
    /// execute in best-effort mode and their own failures do not override
    /// the first recorded error.
    ///
    /// # Panics
    ///
    /// Panics if signalling `Start` from `Created` fails, which cannot
    /// happen for a freshly built context.
    pub async fn run(&self, ctx: &ExecutionContext, clock: &dyn Clock) -> Result<(), PipelineError> {
        ctx.advance(Signal::Start, clock).expect("CREATED must accept START");

        let mut failure: Option<PipelineError> = None;

        for phase in Phase::ordered() {
            if failure.is_some() && !phase.runs_on_error() {
                continue;
            }

            ctx.enter_phase(phase, clock);

            for plugin in self.plugins.iter().filter(|plugin| plugin.phase() == phase) {
                if let Err(error) = plugin.execute(ctx).await {
                    let envelope = error.to_error_envelope(clock.now(), ctx.snapshot().attempt, 1);
                    ctx.set_error(envelope);
                    if failure.is_none() {
                        failure = Some(error);
                    }
                    if phase.is_critical() || !phase.is_retryable() {
                        let _: Result<_, IllegalStateTransition> =
                            ctx.advance(Signal::PhaseFailure, clock);
                    }
                }
            }
        }

        match failure {
            Some(error) => {
                let _: Result<_, IllegalStateTransition> = ctx.advance(Signal::RetryExhausted, clock);
                Err(error)
            }
            None => {
                ctx.advance(Signal::ExecutionSuccess, clock).expect("RUNNING must accept EXECUTION_SUCCESS");
                Ok(())
            }
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::Phase;
    use super::PhasePlugin;
    use super::Pipeline;
    use super::PipelineError;
    use crate::error::ErrorKind;
    use crate::state::ExecutionState;
    use crate::tenant::TenantContext;
    use crate::time::FixedClock;
    use crate::time::Timestamp;
    use crate::token::ExecutionContext;
    use crate::token::ExecutionToken;
    use time::macros::datetime;

    struct AlwaysOk(Phase);

    #[async_trait]
    impl PhasePlugin for AlwaysOk {
        fn id(&self) -> &str {
            "always-ok"
        }

        fn phase(&self) -> Phase {
            self.0
        }

        async fn execute(&self, _ctx: &ExecutionContext) -> Result<(), PipelineError> {
            Ok(())
        }
    }

    struct AlwaysFail(Phase);

    #[async_trait]
    impl PhasePlugin for AlwaysFail {
        fn id(&self) -> &str {
            "always-fail"
        }

        fn phase(&self) -> Phase {
            self.0
        }

        async fn execute(&self, _ctx: &ExecutionContext) -> Result<(), PipelineError> {
            Err(PipelineError::phase_failed(self.0, ErrorKind::Internal, "boom"))
        }
    }

    fn sample_context(clock: &FixedClock) -> ExecutionContext {
        use crate::time::Clock;
        let token = ExecutionToken::new("exec-1", "req-1", clock.now());
        ExecutionContext::new(token, TenantContext::new("tenant-1"))
    }

    fn fixed_clock() -> FixedClock {
        FixedClock(Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC)))
    }

    #[tokio::test]
    async fn full_pipeline_with_all_phases_ok_completes() {
        let mut pipeline = Pipeline::new();
        for phase in Phase::ordered() {
            pipeline.register(Box::new(AlwaysOk(phase)));
        }
        let clock = fixed_clock();
        let ctx = sample_context(&clock);
        let result = pipeline.run(&ctx, &clock).await;
        assert!(result.is_ok());
        assert_eq!(ctx.snapshot().state, ExecutionState::Completed);
    }

    #[tokio::test]
    async fn critical_phase_failure_aborts_but_runs_on_error_phases_still_run() {
        let mut pipeline = Pipeline::new();
        for phase in Phase::ordered() {
            if phase == Phase::Validate {
                pipeline.register(Box::new(AlwaysFail(phase)));
            } else {
                pipeline.register(Box::new(AlwaysOk(phase)));
            }
        }
        let clock = fixed_clock();
        let ctx = sample_context(&clock);
        let result = pipeline.run(&ctx, &clock).await;
        assert!(result.is_err());
        assert!(ctx.has_error());
        assert_eq!(ctx.snapshot().current_phase, Some(Phase::Cleanup));
        assert_eq!(ctx.snapshot().state, ExecutionState::Failed);
    }
}
