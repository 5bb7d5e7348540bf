// kernel-runtime/src/runner.rs
// ============================================================================
// Module: Runner Contract
// Description: The contract a local native-inference binding satisfies:
// lifecycle, warmup, and session minting.
// Purpose: Give the runner factory and session manager one interface to
// drive regardless of the underlying native runtime (GGUF/ONNX/TensorRT).
// Dependencies: async-trait, kernel-core
// ============================================================================

//! ## Overview
//! A [`Runner`] wraps one loaded model instance. `initialize` is called
//! exactly once per runner lifetime by the owning [`crate::factory::RunnerFactory`];
//! `warmup` is optional and best-effort. Concrete native bindings (actual
//! GGUF/ONNX/TensorRT FFI) are out of scope here — this crate only defines
//! the contract and the pool/factory machinery around it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use kernel_core::ModelManifest;
use kernel_core::RunnerId;
use kernel_core::TenantContext;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::session::Session;

/// Tenant-specific configuration handed to a runner at initialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Free-form runner settings, resolved per tenant.
    pub settings: BTreeMap<String, Value>,
}

/// Errors raised while creating, initializing, or operating a [`Runner`].
#[derive(Debug, Error, Clone)]
pub enum RunnerError {
    /// No manifest is registered for the requested model.
    #[error("manifest not found for model {model_id}")]
    ManifestNotFound {
        /// Requested model identifier.
        model_id: String,
    },
    /// No runner implementation is registered under the requested identifier.
    #[error("no runner implementation registered for {runner_id}")]
    ImplementationNotFound {
        /// Requested runner identifier.
        runner_id: String,
    },
    /// The runner's `initialize` call failed.
    #[error("runner {runner_id} failed to initialize: {message}")]
    InitializationFailed {
        /// Identifier of the runner that failed.
        runner_id: String,
        /// Human-readable detail.
        message: String,
    },
    /// The runner's `warmup` call failed.
    #[error("runner {runner_id} failed to warm up: {message}")]
    WarmupFailed {
        /// Identifier of the runner that failed.
        runner_id: String,
        /// Human-readable detail.
        message: String,
    },
    /// The runner could not mint a new session.
    #[error("runner {runner_id} session creation failed: {message}")]
    SessionCreationFailed {
        /// Identifier of the runner that failed.
        runner_id: String,
        /// Human-readable detail.
        message: String,
    },
}

/// A loaded model instance capable of minting inference sessions.
///
/// `initialize` is called exactly once, by the factory, before any other
/// method. `warmup` may be invoked zero or more times afterward; a runner
/// that does not support warmup should treat it as a no-op success.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Stable identifier for this runner instance.
    fn id(&self) -> &RunnerId;

    /// Loads the model artifact described by `manifest` using `config`,
    /// scoped to `tenant`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InitializationFailed`] when loading fails.
    async fn initialize(
        &self,
        manifest: &ModelManifest,
        config: &RunnerConfig,
        tenant: &TenantContext,
    ) -> Result<(), RunnerError>;

    /// Runs `sample_count` empty inference passes to prime device caches.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::WarmupFailed`] when warmup fails. Callers may
    /// choose to treat this as non-fatal.
    async fn warmup(&self, sample_count: usize) -> Result<(), RunnerError>;

    /// Mints a new session scoped to `tenant`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::SessionCreationFailed`] when the runner cannot
    /// mint a new session (e.g. at its own internal capacity).
    async fn create_session(&self, tenant: &TenantContext) -> Result<Session, RunnerError>;

    /// Releases resources held by `session`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::SessionCreationFailed`] is never returned here;
    /// implementations report close failures via their own logging, since a
    /// close failure must not block pool bookkeeping.
    async fn close_session(&self, session: Session) -> Result<(), RunnerError>;

    /// Releases all resources held by this runner (the loaded model itself).
    async fn close(&self);
}
