// kernel/src/provider_runner.rs
// ============================================================================
// Module: Provider-Backed Runner Adapter
// Description: Bridges kernel-providers's Provider trait onto
// kernel-runtime's Runner/RunnerBuilder contract, and kernel-providers's
// ProviderError onto kernel-broker's ClassifyOutcome.
// Purpose: Let the ROUTE/PROVIDER_DISPATCH phases reuse the runtime crate's
// warm pool and the broker crate's fallback orchestration for a "runner"
// that is, underneath, a provider instance bound to one (tenant, model)
// pair — per the kernel's own definition of a runner.
// Dependencies: async-trait, kernel-core, kernel-providers, kernel-runtime,
// kernel-broker
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use kernel_core::Clock;
use kernel_core::ModelManifest;
use kernel_core::RunnerId;
use kernel_core::SessionId;
use kernel_core::TenantContext;
use kernel_broker::ClassifyOutcome;
use kernel_providers::Provider;
use kernel_providers::ProviderError;
use kernel_providers::ProviderRegistry;
use kernel_runtime::Runner;
use kernel_runtime::RunnerBuilder;
use kernel_runtime::RunnerConfig;
use kernel_runtime::RunnerError;
use kernel_runtime::Session;

/// [`RunnerBuilder`] that resolves a runner identifier to a provider
/// registered in a [`ProviderRegistry`], initializes it, and wraps it in a
/// [`ProviderRunner`].
pub struct ProviderRunnerBuilder {
    registry: Arc<ProviderRegistry>,
    clock: Arc<dyn Clock>,
}

impl ProviderRunnerBuilder {
    /// Builds a runner builder backed by `registry`, stamping minted
    /// sessions with `clock`.
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self { registry, clock }
    }
}

#[async_trait]
impl RunnerBuilder for ProviderRunnerBuilder {
    async fn build(
        &self,
        tenant: &TenantContext,
        _manifest: &ModelManifest,
        runner_id: &RunnerId,
        _config: &RunnerConfig,
        _warmup: bool,
    ) -> Result<Arc<dyn Runner>, RunnerError> {
        let provider = self.registry.get(runner_id.as_str()).ok_or_else(|| RunnerError::ImplementationNotFound {
            runner_id: runner_id.to_string(),
        })?;
        provider.initialize(tenant).await.map_err(|error| RunnerError::InitializationFailed {
            runner_id: runner_id.to_string(),
            message: error.to_string(),
        })?;
        Ok(Arc::new(ProviderRunner {
            id: runner_id.clone(),
            provider,
            clock: Arc::clone(&self.clock),
        }))
    }
}

/// Adapts a [`Provider`] to the [`Runner`] lifecycle contract. A provider is
/// stateless between calls, so `create_session`/`close_session` mint and
/// discard an opaque handle rather than tracking real native state.
struct ProviderRunner {
    id: RunnerId,
    provider: Arc<dyn Provider>,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl Runner for ProviderRunner {
    fn id(&self) -> &RunnerId {
        &self.id
    }

    async fn initialize(&self, _manifest: &ModelManifest, _config: &RunnerConfig, tenant: &TenantContext) -> Result<(), RunnerError> {
        self.provider.initialize(tenant).await.map_err(|error| RunnerError::InitializationFailed {
            runner_id: self.id.to_string(),
            message: error.to_string(),
        })
    }

    async fn warmup(&self, _sample_count: usize) -> Result<(), RunnerError> {
        Ok(())
    }

    async fn create_session(&self, _tenant: &TenantContext) -> Result<Session, RunnerError> {
        Ok(Session {
            session_id: SessionId::new(self.id.to_string()),
            created_at: self.clock.now(),
        })
    }

    async fn close_session(&self, _session: Session) -> Result<(), RunnerError> {
        Ok(())
    }

    async fn close(&self) {
        self.provider.shutdown().await;
    }
}

/// Wraps a [`ProviderError`] so it can implement [`ClassifyOutcome`], which
/// the orphan rule forbids doing directly from this crate for a type
/// defined in `kernel-providers`.
#[derive(Debug, Clone)]
pub struct DispatchError(pub ProviderError);

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl ClassifyOutcome for DispatchError {
    fn is_retryable(&self) -> bool {
        self.0.is_retryable()
    }
}
