// kernel/src/phases.rs
// ============================================================================
// Module: Built-In Phase Plugins
// Description: One PhasePlugin implementation per pipeline phase, threading
// inference data through ExecutionToken.variables under well-known keys.
// Purpose: Realize the kernel's ten-phase contract against the concrete
// provider/runtime/broker/resilience crates.
// Dependencies: async-trait, serde_json, kernel-core, kernel-providers,
// kernel-runtime, kernel-broker, crate::{manifest_store, entitlements,
// audit_sink, provider_runner}
// ============================================================================

//! ## Overview
//! Plugins communicate only through `ExecutionToken.variables`, since
//! [`kernel_core::PhasePlugin::execute`] takes just the `ExecutionContext` —
//! there is no side channel. Keys are plain strings rather than an enum so a
//! downstream deployment can register its own plugins alongside these
//! without depending on kernel-internal types: `"request"`, `"manifest"`,
//! `"ranked"`, `"provider_request"`, `"provider_response"`, `"response"`.

use std::sync::Arc;

use async_trait::async_trait;
use kernel_broker::rank;
use kernel_broker::Orchestrator;
use kernel_broker::RankedCandidate;
use kernel_broker::RunnerCandidate;
use kernel_broker::SelectionContext;
use kernel_core::Actor;
use kernel_core::ActorKind;
use kernel_core::AuditLevel;
use kernel_core::Clock;
use kernel_core::ErrorKind;
use kernel_core::HealthStatus;
use kernel_core::InferenceRequest;
use kernel_core::InferenceResponse;
use kernel_core::KernelObserver;
use kernel_core::ModelManifest;
use kernel_core::Outcome;
use kernel_core::Phase;
use kernel_core::PhaseEvent;
use kernel_core::PhasePlugin;
use kernel_core::PipelineError;
use kernel_core::ExecutionContext;
use kernel_providers::ProviderRegistry;
use kernel_providers::ProviderRequest;
use kernel_providers::ProviderResponse;
use kernel_runtime::RunnerConfig;
use serde::Deserialize;
use serde::Serialize;

use crate::audit_sink::AuditSink;
use crate::entitlements::EntitlementRegistry;
use crate::manifest_store::ManifestStore;
use crate::provider_runner::DispatchError;

/// Wire-serializable counterpart of [`RankedCandidate`], since the broker
/// crate's type carries no `serde` impl.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RankedCandidateWire {
    runner_id: String,
    score: i32,
}

fn read_request(ctx: &ExecutionContext, phase: Phase) -> Result<InferenceRequest, PipelineError> {
    let token = ctx.snapshot();
    let value = token.variables.get("request").ok_or_else(|| {
        PipelineError::phase_failed(phase, ErrorKind::Internal, "no request published to the execution token")
    })?;
    serde_json::from_value(value.clone())
        .map_err(|error| PipelineError::phase_failed(phase, ErrorKind::Internal, format!("request decode failed: {error}")))
}

fn publish_variable(ctx: &ExecutionContext, key: &str, value: serde_json::Value) {
    let mut token = (*ctx.snapshot()).clone();
    token.variables.insert(key.to_owned(), value);
    ctx.publish(token);
}

/// Decodes the manifest, ranked candidates, and normalized provider request
/// [`RoutePlugin`] and [`PreProcessingPlugin`] publish, for a dispatch step
/// to hand to [`kernel_broker::Orchestrator::dispatch`].
pub(crate) fn read_routing_plan(
    ctx: &ExecutionContext,
    phase: Phase,
) -> Result<(ModelManifest, Vec<RankedCandidate>, ProviderRequest), PipelineError> {
    let token = ctx.snapshot();
    let manifest_value = token
        .variables
        .get("manifest")
        .ok_or_else(|| PipelineError::phase_failed(phase, ErrorKind::Internal, "no manifest published to the execution token"))?;
    let manifest: ModelManifest = serde_json::from_value(manifest_value.clone())
        .map_err(|error| PipelineError::phase_failed(phase, ErrorKind::Internal, error.to_string()))?;
    let ranked_value = token
        .variables
        .get("ranked")
        .ok_or_else(|| PipelineError::phase_failed(phase, ErrorKind::Internal, "no ranked candidates published to the execution token"))?;
    let ranked_wire: Vec<RankedCandidateWire> = serde_json::from_value(ranked_value.clone())
        .map_err(|error| PipelineError::phase_failed(phase, ErrorKind::Internal, error.to_string()))?;
    let ranked: Vec<RankedCandidate> = ranked_wire
        .into_iter()
        .map(|candidate| RankedCandidate {
            runner_id: candidate.runner_id.into(),
            score: candidate.score,
        })
        .collect();
    let provider_request_value = token
        .variables
        .get("provider_request")
        .ok_or_else(|| PipelineError::phase_failed(phase, ErrorKind::Internal, "no provider request published to the execution token"))?;
    let provider_request: ProviderRequest = serde_json::from_value(provider_request_value.clone())
        .map_err(|error| PipelineError::phase_failed(phase, ErrorKind::Internal, error.to_string()))?;
    Ok((manifest, ranked, provider_request))
}

// ============================================================================
// SECTION: PreValidate
// ============================================================================

/// Cheap structural pre-check: the request must already be published to the
/// token and contain at least one message.
pub struct PreValidatePlugin;

#[async_trait]
impl PhasePlugin for PreValidatePlugin {
    fn id(&self) -> &str {
        "kernel.pre-validate"
    }

    fn phase(&self) -> Phase {
        Phase::PreValidate
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<(), PipelineError> {
        let request = read_request(ctx, self.phase())?;
        if request.messages.is_empty() {
            return Err(PipelineError::phase_failed(self.phase(), ErrorKind::Validation, "request has no messages"));
        }
        if request.model_id.is_empty() {
            return Err(PipelineError::phase_failed(self.phase(), ErrorKind::Validation, "request has no model id"));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Validate
// ============================================================================

/// Full validation of parameter ranges.
pub struct ValidatePlugin;

#[async_trait]
impl PhasePlugin for ValidatePlugin {
    fn id(&self) -> &str {
        "kernel.validate"
    }

    fn phase(&self) -> Phase {
        Phase::Validate
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<(), PipelineError> {
        let request = read_request(ctx, self.phase())?;
        let params = &request.params;
        if let Some(temperature) = params.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(PipelineError::phase_failed(self.phase(), ErrorKind::Validation, "temperature out of range [0, 2]"));
            }
        }
        if let Some(top_p) = params.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(PipelineError::phase_failed(self.phase(), ErrorKind::Validation, "top_p out of range [0, 1]"));
            }
        }
        if let Some(max_tokens) = params.max_tokens {
            if max_tokens == 0 {
                return Err(PipelineError::phase_failed(self.phase(), ErrorKind::Validation, "max_tokens must be greater than zero"));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Authorize
// ============================================================================

/// Checks the tenant's entitlement to the requested model.
pub struct AuthorizePlugin {
    entitlements: Arc<EntitlementRegistry>,
}

impl AuthorizePlugin {
    /// Builds the plugin against `entitlements`.
    #[must_use]
    pub fn new(entitlements: Arc<EntitlementRegistry>) -> Self {
        Self { entitlements }
    }
}

#[async_trait]
impl PhasePlugin for AuthorizePlugin {
    fn id(&self) -> &str {
        "kernel.authorize"
    }

    fn phase(&self) -> Phase {
        Phase::Authorize
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<(), PipelineError> {
        let request = read_request(ctx, self.phase())?;
        if !self.entitlements.is_entitled(&ctx.tenant.tenant_id, &request.model_id) {
            return Err(PipelineError::phase_failed(
                self.phase(),
                ErrorKind::Authorization,
                format!("tenant {} is not entitled to model {}", ctx.tenant.tenant_id, request.model_id),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Route
// ============================================================================

/// Resolves the model manifest and ranks candidate providers against it.
pub struct RoutePlugin {
    manifests: Arc<ManifestStore>,
    providers: Arc<ProviderRegistry>,
    clock: Arc<dyn Clock>,
}

impl RoutePlugin {
    /// Builds the plugin against `manifests` and `providers`, using `clock`
    /// for provider health probes.
    #[must_use]
    pub fn new(manifests: Arc<ManifestStore>, providers: Arc<ProviderRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self { manifests, providers, clock }
    }

    async fn candidate_for(&self, manifest: &ModelManifest, provider: &Arc<dyn kernel_providers::Provider>) -> RunnerCandidate {
        let health = provider.health(self.clock.as_ref()).await;
        RunnerCandidate {
            runner_id: provider.id().into(),
            devices: manifest.supported_devices.iter().cloned().collect(),
            formats: manifest.artifacts.keys().copied().collect(),
            observed_p95_latency: None,
            available_resources: manifest.resources,
            healthy: matches!(health.status, HealthStatus::Healthy | HealthStatus::Degraded),
            cpu_capable: true,
            current_load: 0.0,
        }
    }
}

#[async_trait]
impl PhasePlugin for RoutePlugin {
    fn id(&self) -> &str {
        "kernel.route"
    }

    fn phase(&self) -> Phase {
        Phase::Route
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<(), PipelineError> {
        let request = read_request(ctx, self.phase())?;
        let manifest = self
            .manifests
            .get(&request.model_id)
            .map_err(|error| PipelineError::phase_failed(self.phase(), ErrorKind::ModelFormat, error.to_string()))?;

        let providers = self.providers.for_model(request.model_id.as_str());
        let mut candidates = Vec::with_capacity(providers.len());
        for provider in &providers {
            candidates.push(self.candidate_for(&manifest, provider).await);
        }

        let selection = SelectionContext {
            timeout: request.timeout,
            preferred_device: None,
            cost_sensitive: false,
        };
        let mut ranked = rank(&manifest, &selection, &candidates);
        if let Some(preferred) = &request.preferred_provider {
            if let Some(position) = ranked.iter().position(|candidate| candidate.runner_id.as_str() == preferred.as_str()) {
                let preferred_candidate = ranked.remove(position);
                ranked.insert(0, preferred_candidate);
            }
        }

        if ranked.is_empty() {
            return Err(PipelineError::phase_failed(
                self.phase(),
                ErrorKind::ModelFormat,
                format!("no compatible provider available for model {}", request.model_id),
            ));
        }

        let ranked_wire: Vec<RankedCandidateWire> = ranked
            .iter()
            .map(|candidate| RankedCandidateWire {
                runner_id: candidate.runner_id.to_string(),
                score: candidate.score,
            })
            .collect();

        publish_variable(
            ctx,
            "manifest",
            serde_json::to_value(&manifest)
                .map_err(|error| PipelineError::phase_failed(self.phase(), ErrorKind::Internal, error.to_string()))?,
        );
        publish_variable(
            ctx,
            "ranked",
            serde_json::to_value(&ranked_wire)
                .map_err(|error| PipelineError::phase_failed(self.phase(), ErrorKind::Internal, error.to_string()))?,
        );
        Ok(())
    }
}

// ============================================================================
// SECTION: PreProcessing
// ============================================================================

/// Produces a wire-normalized `ProviderRequest` from the `InferenceRequest`.
pub struct PreProcessingPlugin;

#[async_trait]
impl PhasePlugin for PreProcessingPlugin {
    fn id(&self) -> &str {
        "kernel.pre-processing"
    }

    fn phase(&self) -> Phase {
        Phase::PreProcessing
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<(), PipelineError> {
        let request = read_request(ctx, self.phase())?;
        let provider_request = ProviderRequest {
            request_id: request.request_id,
            model_id: request.model_id,
            messages: request.messages,
            params: request.params,
            streaming: request.streaming,
            tenant: ctx.tenant.clone(),
        };
        publish_variable(
            ctx,
            "provider_request",
            serde_json::to_value(&provider_request)
                .map_err(|error| PipelineError::phase_failed(self.phase(), ErrorKind::Internal, error.to_string()))?,
        );
        Ok(())
    }
}

// ============================================================================
// SECTION: ProviderDispatch
// ============================================================================

/// Walks the ranked candidates via the broker's [`Orchestrator`], invoking
/// the matching provider's `infer` for each candidate it acquires.
pub struct ProviderDispatchPlugin {
    providers: Arc<ProviderRegistry>,
    orchestrator: Arc<Orchestrator>,
    runner_config: RunnerConfig,
    clock: Arc<dyn Clock>,
}

impl ProviderDispatchPlugin {
    /// Builds the plugin against `providers`/`orchestrator`, using `clock`
    /// to stamp the dispatch attempt.
    #[must_use]
    pub fn new(providers: Arc<ProviderRegistry>, orchestrator: Arc<Orchestrator>, runner_config: RunnerConfig, clock: Arc<dyn Clock>) -> Self {
        Self { providers, orchestrator, runner_config, clock }
    }
}

#[async_trait]
impl PhasePlugin for ProviderDispatchPlugin {
    fn id(&self) -> &str {
        "kernel.provider-dispatch"
    }

    fn phase(&self) -> Phase {
        Phase::ProviderDispatch
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<(), PipelineError> {
        let phase = self.phase();
        let (manifest, ranked, provider_request) = read_routing_plan(ctx, phase)?;

        let providers = Arc::clone(&self.providers);
        let now = self.clock.now();
        let response = self
            .orchestrator
            .dispatch(
                manifest.model_id.as_str(),
                &ranked,
                &ctx.tenant,
                &manifest,
                &self.runner_config,
                now,
                move |runner| {
                    let providers = Arc::clone(&providers);
                    let provider_request = provider_request.clone();
                    async move {
                        let provider = providers.get(runner.id().as_str()).ok_or_else(|| {
                            DispatchError(kernel_providers::ProviderError::Unreachable {
                                provider_id: runner.id().to_string(),
                                message: "no provider registered for this runner id".to_owned(),
                                retryable: false,
                            })
                        })?;
                        provider.infer(provider_request).await.map_err(DispatchError)
                    }
                },
            )
            .await
            .map_err(|error| PipelineError::phase_failed(phase, ErrorKind::Provider, error.to_string()))?;

        publish_variable(
            ctx,
            "provider_response",
            serde_json::to_value(&response).map_err(|error| PipelineError::phase_failed(phase, ErrorKind::Internal, error.to_string()))?,
        );
        Ok(())
    }
}

// ============================================================================
// SECTION: PostProcessing
// ============================================================================

/// Normalizes the `ProviderResponse` into the final `InferenceResponse`.
pub struct PostProcessingPlugin {
    clock: Arc<dyn Clock>,
}

impl PostProcessingPlugin {
    /// Builds the plugin, using `clock` to stamp and time the response.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl PhasePlugin for PostProcessingPlugin {
    fn id(&self) -> &str {
        "kernel.post-processing"
    }

    fn phase(&self) -> Phase {
        Phase::PostProcessing
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<(), PipelineError> {
        let phase = self.phase();
        let token = ctx.snapshot();
        let request_id = read_request(ctx, phase)?.request_id;
        let response_value = token
            .variables
            .get("provider_response")
            .ok_or_else(|| PipelineError::phase_failed(phase, ErrorKind::Internal, "no provider response published to the execution token"))?;
        let provider_response: ProviderResponse = serde_json::from_value(response_value.clone())
            .map_err(|error| PipelineError::phase_failed(phase, ErrorKind::Internal, error.to_string()))?;
        let now = self.clock.now();
        let duration_ms = u64::try_from(token.created_at.elapsed_until(now).as_millis()).unwrap_or(u64::MAX);
        drop(token);

        let response = InferenceResponse {
            request_id,
            content: provider_response.content,
            model_id: provider_response.model_id,
            tokens_used: provider_response.tokens_used,
            duration_ms,
            timestamp: now,
            metadata: std::collections::BTreeMap::new(),
            finish_reason: provider_response.finish_reason,
        };
        publish_variable(
            ctx,
            "response",
            serde_json::to_value(&response).map_err(|error| PipelineError::phase_failed(phase, ErrorKind::Internal, error.to_string()))?,
        );
        Ok(())
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Emits a tamper-evident audit event summarizing this execution.
pub struct AuditPlugin {
    sink: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl AuditPlugin {
    /// Builds the plugin against `sink`, stamping events with `clock`.
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>, clock: Arc<dyn Clock>) -> Self {
        Self { sink, clock }
    }
}

#[async_trait]
impl PhasePlugin for AuditPlugin {
    fn id(&self) -> &str {
        "kernel.audit"
    }

    fn phase(&self) -> Phase {
        Phase::Audit
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<(), PipelineError> {
        let token = ctx.snapshot();
        let (event_name, level) = if ctx.has_error() {
            ("execution.failure", AuditLevel::Error)
        } else {
            ("execution.success", AuditLevel::Info)
        };
        let event = kernel_core::AuditEvent::new(
            self.clock.now(),
            token.execution_id.clone(),
            "kernel",
            Actor {
                kind: ActorKind::System,
                id: "kernel".to_owned(),
                role: None,
            },
            event_name,
            level,
        );
        self.sink.record(event).await;
        Ok(())
    }
}

// ============================================================================
// SECTION: Observability
// ============================================================================

/// Emits a phase-completion observability event summarizing this execution.
pub struct ObservabilityPlugin {
    observer: Arc<dyn KernelObserver>,
}

impl ObservabilityPlugin {
    /// Builds the plugin against `observer`.
    #[must_use]
    pub fn new(observer: Arc<dyn KernelObserver>) -> Self {
        Self { observer }
    }
}

#[async_trait]
impl PhasePlugin for ObservabilityPlugin {
    fn id(&self) -> &str {
        "kernel.observability"
    }

    fn phase(&self) -> Phase {
        Phase::Observability
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<(), PipelineError> {
        let token = ctx.snapshot();
        let outcome = if ctx.has_error() { Outcome::Error } else { Outcome::Ok };
        self.observer.record_phase(PhaseEvent {
            execution_id: token.execution_id.clone(),
            phase: token.current_phase.unwrap_or(self.phase()),
            outcome,
            error_kind: ctx.error().map(|envelope| error_kind_label(envelope.kind)),
        });
        Ok(())
    }
}

fn error_kind_label(kind: kernel_core::ErrorKind) -> &'static str {
    match kind {
        kernel_core::ErrorKind::Validation => "validation",
        kernel_core::ErrorKind::Authorization => "authorization",
        kernel_core::ErrorKind::Quota => "quota",
        kernel_core::ErrorKind::ModelFormat => "model_format",
        kernel_core::ErrorKind::DeviceRuntime => "device_runtime",
        kernel_core::ErrorKind::Provider => "provider",
        kernel_core::ErrorKind::NetworkStream => "network_stream",
        kernel_core::ErrorKind::Internal => "internal",
    }
}

// ============================================================================
// SECTION: Cleanup
// ============================================================================

/// Releases resources held for this execution. No session state is held at
/// the facade level (providers are dispatched statelessly), so cleanup is a
/// no-op hook for a deployment that wants to hang resource release here.
pub struct CleanupPlugin;

#[async_trait]
impl PhasePlugin for CleanupPlugin {
    fn id(&self) -> &str {
        "kernel.cleanup"
    }

    fn phase(&self) -> Phase {
        Phase::Cleanup
    }

    async fn execute(&self, _ctx: &ExecutionContext) -> Result<(), PipelineError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use kernel_core::FinishReason;
    use kernel_core::FixedClock;
    use kernel_core::Message;
    use kernel_core::ModelFormat;
    use kernel_core::ArtifactLocation;
    use kernel_core::ResourceRequirements;
    use kernel_core::Role;
    use kernel_core::TokenUsage;
    use kernel_providers::ProviderCapabilities;
    use kernel_providers::ProviderMetadata;
    use time::macros::datetime;

    use super::*;

    fn fixed_now() -> kernel_core::Timestamp {
        kernel_core::Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC))
    }

    fn sample_request() -> InferenceRequest {
        InferenceRequest::builder("req-1", "llama-3-8b", vec![Message::new(Role::User, "hello")])
            .build()
            .expect("sample request is well-formed")
    }

    fn ctx_with_request(request: &InferenceRequest) -> ExecutionContext {
        let mut token = kernel_core::ExecutionToken::new("exec-1", request.request_id.clone(), fixed_now());
        token.variables.insert("request".to_owned(), serde_json::to_value(request).expect("request serializes"));
        ExecutionContext::new(token, kernel_core::TenantContext::new("acme"))
    }

    #[tokio::test]
    async fn pre_validate_rejects_empty_messages() {
        let mut request = sample_request();
        request.messages.clear();
        let ctx = ctx_with_request(&request);
        assert!(PreValidatePlugin.execute(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn pre_validate_accepts_well_formed_request() {
        let request = sample_request();
        let ctx = ctx_with_request(&request);
        assert!(PreValidatePlugin.execute(&ctx).await.is_ok());
    }

    #[tokio::test]
    async fn validate_rejects_temperature_out_of_range() {
        let mut request = sample_request();
        request.params.temperature = Some(3.0);
        let ctx = ctx_with_request(&request);
        assert!(ValidatePlugin.execute(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn validate_rejects_zero_max_tokens() {
        let mut request = sample_request();
        request.params.max_tokens = Some(0);
        let ctx = ctx_with_request(&request);
        assert!(ValidatePlugin.execute(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn authorize_rejects_unentitled_model() {
        let request = sample_request();
        let ctx = ctx_with_request(&request);
        let entitlements = Arc::new(EntitlementRegistry::new());
        entitlements.restrict("acme", vec!["gpt-4o".into()]);
        let plugin = AuthorizePlugin::new(entitlements);
        assert!(plugin.execute(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn authorize_accepts_entitled_model() {
        let request = sample_request();
        let ctx = ctx_with_request(&request);
        let entitlements = Arc::new(EntitlementRegistry::new());
        entitlements.restrict("acme", vec!["llama-3-8b".into()]);
        let plugin = AuthorizePlugin::new(entitlements);
        assert!(plugin.execute(&ctx).await.is_ok());
    }

    struct EchoProvider {
        id: &'static str,
    }

    #[async_trait]
    impl kernel_providers::Provider for EchoProvider {
        fn id(&self) -> &str {
            self.id
        }

        fn metadata(&self) -> ProviderMetadata {
            ProviderMetadata {
                name: self.id.to_owned(),
                version: "1.0.0".to_owned(),
                vendor: "test".to_owned(),
                description: "echoes the last message".to_owned(),
            }
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities::default()
        }

        async fn initialize(&self, _tenant: &kernel_core::TenantContext) -> Result<(), kernel_providers::ProviderError> {
            Ok(())
        }

        async fn infer(&self, request: ProviderRequest) -> Result<ProviderResponse, kernel_providers::ProviderError> {
            let content = request.messages.last().map(|message| message.content.clone()).unwrap_or_default();
            Ok(ProviderResponse {
                provider_id: self.id.to_owned(),
                content,
                model_id: request.model_id,
                tokens_used: TokenUsage {
                    prompt_tokens: 1,
                    completion_tokens: 1,
                    total_tokens: 2,
                },
                finish_reason: FinishReason::Stop,
            })
        }

        async fn health(&self, clock: &dyn Clock) -> kernel_core::ProviderHealth {
            kernel_core::ProviderHealth {
                status: HealthStatus::Healthy,
                message: "ok".to_owned(),
                timestamp: clock.now(),
                details: BTreeMap::new(),
            }
        }

        async fn shutdown(&self) {}
    }

    fn sample_manifest() -> ModelManifest {
        ModelManifest {
            model_id: "llama-3-8b".into(),
            display_name: "Llama 3 8B".to_owned(),
            version: "1.0.0".to_owned(),
            tenant_id: "acme".into(),
            artifacts: BTreeMap::from([(
                ModelFormat::Gguf,
                ArtifactLocation {
                    uri: "file:///models/llama-3-8b.gguf".to_owned(),
                    checksum: Some("sha256:deadbeef".to_owned()),
                    size_bytes: 1,
                    mime_type: "application/octet-stream".to_owned(),
                },
            )]),
            supported_devices: vec!["cpu".to_owned()],
            resources: ResourceRequirements::default(),
            metadata: BTreeMap::new(),
            created_at: fixed_now(),
            updated_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn route_then_dispatch_round_trips_through_an_echo_provider() {
        let request = sample_request();
        let ctx = ctx_with_request(&request);
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(fixed_now()));

        let mut registry = ProviderRegistry::new();
        registry.insert(Arc::new(EchoProvider { id: "echo" }));
        let providers = Arc::new(registry);
        let manifests = Arc::new(ManifestStore::from_manifests(vec![sample_manifest()]));

        let route = RoutePlugin::new(Arc::clone(&manifests), Arc::clone(&providers), Arc::clone(&clock));
        route.execute(&ctx).await.expect("routing should succeed against the echo provider");

        PreProcessingPlugin.execute(&ctx).await.expect("pre-processing should normalize the request");

        let runner_builder = Arc::new(crate::provider_runner::ProviderRunnerBuilder::new(Arc::clone(&providers), Arc::clone(&clock)));
        let factory = Arc::new(kernel_runtime::RunnerFactory::new(runner_builder, kernel_runtime::RunnerFactoryConfig::default()));
        let breaker_config = kernel_config::CircuitBreakerSettings::default().to_breaker_config();
        let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&factory), breaker_config));
        let dispatch = ProviderDispatchPlugin::new(Arc::clone(&providers), orchestrator, RunnerConfig::default(), Arc::clone(&clock));
        dispatch.execute(&ctx).await.expect("dispatch should succeed against the echo provider");

        let post = PostProcessingPlugin::new(Arc::clone(&clock));
        post.execute(&ctx).await.expect("post-processing should build the final response");

        let token = ctx.snapshot();
        let response: InferenceResponse =
            serde_json::from_value(token.variables.get("response").expect("response should be published").clone())
                .expect("response should decode");
        assert_eq!(response.content, "hello");
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn ranked_candidate_wire_round_trips() {
        let wire = RankedCandidateWire {
            runner_id: "echo".to_owned(),
            score: 42,
        };
        let value = serde_json::to_value(&wire).expect("wire serializes");
        let decoded: RankedCandidateWire = serde_json::from_value(value).expect("wire deserializes");
        assert_eq!(decoded.runner_id, "echo");
        assert_eq!(decoded.score, 42);
    }
}
