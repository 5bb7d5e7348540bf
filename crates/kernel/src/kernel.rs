// kernel/src/kernel.rs
// ============================================================================
// Module: Kernel Facade
// Description: Wires providers, the runtime warm pool, broker dispatch,
// resilience primitives, and configuration into the ten-phase pipeline.
// Purpose: The single entry point an embedder constructs and calls
// `execute`/`health` against.
// Dependencies: kernel-core, kernel-providers, kernel-runtime, kernel-broker,
// kernel-resilience, kernel-config, crate::{phases, provider_runner,
// manifest_store, entitlements, audit_sink, error}
// ============================================================================

//! ## Overview
//! `Kernel` owns every long-lived subsystem and assembles the built-in
//! [`kernel_core::Pipeline`] once at construction, mirroring how the teacher
//! repo's `ControlPlane` assembles its phase graph once and reuses it across
//! runs. Admission (tenant rate limiting) happens before an execution token
//! even exists; once a token exists, failures are reported through the
//! returned `InferenceResponse` rather than `Err`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use kernel_broker::Orchestrator;
use kernel_config::KernelConfig;
use kernel_config::RateLimiterSettings;
use kernel_core::Actor;
use kernel_core::ActorKind;
use kernel_core::AuditEvent;
use kernel_core::AuditLevel;
use kernel_core::Clock;
use kernel_core::ExecutionContext;
use kernel_core::ExecutionId;
use kernel_core::ExecutionToken;
use kernel_core::FinishReason;
use kernel_core::InferenceRequest;
use kernel_core::InferenceResponse;
use kernel_core::KernelHealth;
use kernel_core::KernelObserver;
use kernel_core::ModelManifest;
use kernel_core::NoopObserver;
use kernel_core::Outcome;
use kernel_core::Phase;
use kernel_core::PhaseEvent;
use kernel_core::PhasePlugin;
use kernel_core::Pipeline;
use kernel_core::ProviderHealth;
use kernel_core::StreamChunk;
use kernel_core::SystemClock;
use kernel_core::TenantContext;
use kernel_core::TenantId;
use kernel_core::Timestamp;
use kernel_core::TokenUsage;
use kernel_providers::Provider;
use kernel_providers::ProviderRegistry;
use kernel_providers::StreamingProvider;
use kernel_resilience::CircuitBreakerConfig;
use kernel_resilience::SlidingWindowLimiter;
use kernel_resilience::TokenBucketLimiter;
use kernel_runtime::RunnerConfig;
use kernel_runtime::RunnerFactory;
use tokio_stream::wrappers::ReceiverStream;

use crate::audit_sink::AuditSink;
use crate::audit_sink::NoopAuditSink;
use crate::entitlements::EntitlementRegistry;
use crate::error::KernelError;
use crate::manifest_store::ManifestStore;
use crate::phases::AuditPlugin;
use crate::phases::AuthorizePlugin;
use crate::phases::CleanupPlugin;
use crate::phases::ObservabilityPlugin;
use crate::phases::PostProcessingPlugin;
use crate::phases::PreProcessingPlugin;
use crate::phases::PreValidatePlugin;
use crate::phases::ProviderDispatchPlugin;
use crate::phases::RoutePlugin;
use crate::phases::ValidatePlugin;
use crate::provider_runner::DispatchError;
use crate::provider_runner::ProviderRunnerBuilder;

/// Either rate limiter implementation, selected by
/// [`kernel_config::RateLimiterSettings`].
enum TenantLimiter {
    TokenBucket(TokenBucketLimiter),
    SlidingWindow(SlidingWindowLimiter),
}

impl TenantLimiter {
    fn from_settings(settings: RateLimiterSettings, now: Timestamp) -> Self {
        match settings {
            RateLimiterSettings::TokenBucket { capacity, refill_period_ms } => {
                Self::TokenBucket(TokenBucketLimiter::new(capacity, std::time::Duration::from_millis(refill_period_ms), now))
            }
            RateLimiterSettings::SlidingWindow { capacity, window_ms } => {
                Self::SlidingWindow(SlidingWindowLimiter::new(capacity, std::time::Duration::from_millis(window_ms)))
            }
        }
    }

    fn try_acquire(&self, now: Timestamp) -> bool {
        match self {
            Self::TokenBucket(limiter) => limiter.try_acquire(1, now),
            Self::SlidingWindow(limiter) => limiter.try_acquire(now),
        }
    }
}

/// Wires every kernel subsystem and drives inference requests through the
/// ten-phase execution pipeline.
pub struct Kernel {
    providers: Arc<ProviderRegistry>,
    manifests: Arc<ManifestStore>,
    entitlements: Arc<EntitlementRegistry>,
    orchestrator: Arc<Orchestrator>,
    runner_config: RunnerConfig,
    audit_sink: Arc<dyn AuditSink>,
    observer: Arc<dyn KernelObserver>,
    streaming_providers: Arc<BTreeMap<String, Arc<dyn StreamingProvider>>>,
    pipeline: Pipeline,
    rate_limiter_settings: RateLimiterSettings,
    limiters: StdMutex<BTreeMap<TenantId, TenantLimiter>>,
    clock: Arc<dyn Clock>,
}

impl Kernel {
    /// Builds a kernel from `config`, initializing every provider in
    /// `providers` against `system_tenant` before indexing them.
    ///
    /// `streaming_providers` is consulted only by
    /// [`Kernel::execute_streaming`]; a provider that offers both blocking
    /// and streaming inference must appear in both `providers` and
    /// `streaming_providers` under the same `id()`, since [`Provider`] and
    /// [`StreamingProvider`] are separate traits the registry never
    /// downcasts between.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Internal`] when a provider fails to initialize
    /// or the configuration fails validation.
    pub async fn new(
        config: KernelConfig,
        providers: Vec<Arc<dyn Provider>>,
        streaming_providers: Vec<Arc<dyn StreamingProvider>>,
        manifests: impl IntoIterator<Item = ModelManifest>,
        system_tenant: &TenantContext,
        entitlements: Arc<EntitlementRegistry>,
        audit_sink: Arc<dyn AuditSink>,
        observer: Arc<dyn KernelObserver>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, KernelError> {
        config.validate().map_err(|error| KernelError::Internal(error.to_string()))?;
        let streaming_providers: Arc<BTreeMap<String, Arc<dyn StreamingProvider>>> =
            Arc::new(streaming_providers.into_iter().map(|provider| (provider.id().to_owned(), provider)).collect());

        let registry = ProviderRegistry::discover(providers, system_tenant)
            .await
            .map_err(|error| KernelError::Internal(error.to_string()))?;
        let providers = Arc::new(registry);
        let manifest_store = Arc::new(ManifestStore::from_manifests(manifests));

        let runner_builder = Arc::new(ProviderRunnerBuilder::new(Arc::clone(&providers), Arc::clone(&clock)));
        let factory = Arc::new(RunnerFactory::new(runner_builder, config.runner_pool.to_factory_config()));
        let _sweeper = factory.spawn_sweeper(Arc::clone(&clock));

        let breaker_config: CircuitBreakerConfig = config.circuit_breaker.to_breaker_config();
        let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&factory), breaker_config));
        let runner_config = RunnerConfig::default();

        let mut pipeline = Pipeline::new();
        pipeline
            .register(Box::new(PreValidatePlugin))
            .register(Box::new(ValidatePlugin))
            .register(Box::new(AuthorizePlugin::new(Arc::clone(&entitlements))))
            .register(Box::new(RoutePlugin::new(Arc::clone(&manifest_store), Arc::clone(&providers), Arc::clone(&clock))))
            .register(Box::new(PreProcessingPlugin))
            .register(Box::new(ProviderDispatchPlugin::new(
                Arc::clone(&providers),
                Arc::clone(&orchestrator),
                runner_config.clone(),
                Arc::clone(&clock),
            )))
            .register(Box::new(PostProcessingPlugin::new(Arc::clone(&clock))))
            .register(Box::new(AuditPlugin::new(Arc::clone(&audit_sink), Arc::clone(&clock))))
            .register(Box::new(ObservabilityPlugin::new(Arc::clone(&observer))))
            .register(Box::new(CleanupPlugin));
        pipeline.initialize().await.map_err(|error| KernelError::Internal(error.to_string()))?;

        Ok(Self {
            providers,
            manifests: manifest_store,
            entitlements,
            orchestrator,
            runner_config,
            audit_sink,
            observer,
            streaming_providers,
            pipeline,
            rate_limiter_settings: config.rate_limiter,
            limiters: StdMutex::new(BTreeMap::new()),
            clock,
        })
    }

    /// Builds a kernel with the no-op audit sink and observer, using the
    /// system wall clock.
    ///
    /// # Errors
    ///
    /// See [`Kernel::new`].
    pub async fn with_defaults(
        config: KernelConfig,
        providers: Vec<Arc<dyn Provider>>,
        streaming_providers: Vec<Arc<dyn StreamingProvider>>,
        manifests: impl IntoIterator<Item = ModelManifest>,
        system_tenant: &TenantContext,
        entitlements: Arc<EntitlementRegistry>,
    ) -> Result<Self, KernelError> {
        Self::new(
            config,
            providers,
            streaming_providers,
            manifests,
            system_tenant,
            entitlements,
            Arc::new(NoopAuditSink),
            Arc::new(NoopObserver),
            Arc::new(SystemClock),
        )
        .await
    }

    fn admit(&self, tenant_id: &TenantId, now: Timestamp) -> bool {
        let mut limiters = self.limiters.lock().expect("rate limiter map lock poisoned");
        let limiter = limiters
            .entry(tenant_id.clone())
            .or_insert_with(|| TenantLimiter::from_settings(self.rate_limiter_settings, now));
        limiter.try_acquire(now)
    }

    /// Executes `request` on behalf of `tenant`.
    ///
    /// Pipeline-level failures (validation, authorization, routing, provider
    /// dispatch) are reported through the returned `InferenceResponse`'s
    /// `finish_reason`, not through `Err`. `Err` is reserved for rejection
    /// before an execution even begins.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::RateLimited`] when the tenant has exceeded its
    /// configured rate limit.
    pub async fn execute(&self, request: InferenceRequest, tenant: TenantContext) -> Result<InferenceResponse, KernelError> {
        let now = self.clock.now();
        if !self.admit(&tenant.tenant_id, now) {
            return Err(KernelError::RateLimited { tenant_id: tenant.tenant_id });
        }

        let execution_id = ExecutionId::new(format!("exec-{}", request.request_id));
        let request_id = request.request_id.clone();
        let mut token = ExecutionToken::new(execution_id, request_id.clone(), now);
        token.variables.insert(
            "request".to_owned(),
            serde_json::to_value(&request).map_err(|error| KernelError::Internal(error.to_string()))?,
        );
        let ctx = ExecutionContext::new(token, tenant);

        // A pipeline-phase failure is already recorded in `ctx`'s error slot
        // by `Pipeline::run`; the returned `PipelineError` itself is not
        // needed here.
        let _ = self.pipeline.run(&ctx, self.clock.as_ref()).await;

        let final_token = ctx.snapshot();
        if let Some(response_value) = final_token.variables.get("response") {
            let response: InferenceResponse =
                serde_json::from_value(response_value.clone()).map_err(|error| KernelError::Internal(error.to_string()))?;
            return Ok(response);
        }

        let message = ctx.error().map_or_else(|| "execution failed with no recorded error".to_owned(), |envelope| envelope.message);
        Ok(InferenceResponse {
            request_id,
            content: message,
            model_id: request.model_id,
            tokens_used: TokenUsage::default(),
            duration_ms: u64::try_from(final_token.created_at.elapsed_until(self.clock.now()).as_millis()).unwrap_or(u64::MAX),
            timestamp: self.clock.now(),
            metadata: BTreeMap::new(),
            finish_reason: FinishReason::Error,
        })
    }

    /// Executes `request` as a streaming call.
    ///
    /// The pre-validate/validate/authorize/route/pre-processing phases run
    /// synchronously before this returns, mirroring [`Kernel::execute`]'s
    /// setup; provider dispatch then hands back a live chunk stream instead
    /// of waiting for a complete response. Audit and observability events
    /// for the execution are recorded once the returned stream is fully
    /// drained, in a detached task, so a caller that drops the stream early
    /// still produces a final audit record.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::RateLimited`] when the tenant has exceeded its
    /// configured rate limit, or [`KernelError::Internal`] when a setup
    /// phase or the provider dispatch itself fails before a stream can be
    /// established.
    pub async fn execute_streaming(
        &self,
        request: InferenceRequest,
        tenant: TenantContext,
    ) -> Result<ReceiverStream<Result<StreamChunk, KernelError>>, KernelError> {
        let now = self.clock.now();
        if !self.admit(&tenant.tenant_id, now) {
            return Err(KernelError::RateLimited { tenant_id: tenant.tenant_id });
        }

        let execution_id = ExecutionId::new(format!("exec-{}", request.request_id));
        let mut token = ExecutionToken::new(execution_id, request.request_id.clone(), now);
        token.variables.insert(
            "request".to_owned(),
            serde_json::to_value(&request).map_err(|error| KernelError::Internal(error.to_string()))?,
        );
        let ctx = ExecutionContext::new(token, tenant);

        let setup_plugins: Vec<Box<dyn PhasePlugin>> = vec![
            Box::new(PreValidatePlugin),
            Box::new(ValidatePlugin),
            Box::new(AuthorizePlugin::new(Arc::clone(&self.entitlements))),
            Box::new(RoutePlugin::new(Arc::clone(&self.manifests), Arc::clone(&self.providers), Arc::clone(&self.clock))),
            Box::new(PreProcessingPlugin),
        ];
        for plugin in &setup_plugins {
            plugin.execute(&ctx).await.map_err(|error| KernelError::Internal(error.to_string()))?;
        }

        let (manifest, ranked, provider_request) =
            crate::phases::read_routing_plan(&ctx, Phase::ProviderDispatch).map_err(|error| KernelError::Internal(error.to_string()))?;

        let streaming_providers = Arc::clone(&self.streaming_providers);
        let provider_stream = self
            .orchestrator
            .dispatch(
                manifest.model_id.as_str(),
                &ranked,
                &ctx.tenant,
                &manifest,
                &self.runner_config,
                now,
                move |runner| {
                    let streaming_providers = Arc::clone(&streaming_providers);
                    let provider_request = provider_request.clone();
                    async move {
                        let provider = streaming_providers.get(runner.id().as_str()).ok_or_else(|| {
                            DispatchError(kernel_providers::ProviderError::Unreachable {
                                provider_id: runner.id().to_string(),
                                message: "no streaming-capable provider registered for this runner id".to_owned(),
                                retryable: false,
                            })
                        })?;
                        provider.stream(provider_request).await.map_err(DispatchError)
                    }
                },
            )
            .await
            .map_err(|error| KernelError::Internal(error.to_string()))?;

        let execution_id = ctx.snapshot().execution_id.clone();
        let (tx, rx) = tokio::sync::mpsc::channel(32);
        let audit_sink = Arc::clone(&self.audit_sink);
        let observer = Arc::clone(&self.observer);
        let clock = Arc::clone(&self.clock);
        tokio::spawn(async move {
            let mut provider_stream = provider_stream;
            let mut saw_error = false;
            while let Some(item) = futures::StreamExt::next(&mut provider_stream).await {
                let forwarded = item.map_err(|error| KernelError::Internal(error.to_string()));
                saw_error |= forwarded.is_err();
                if tx.send(forwarded).await.is_err() {
                    break;
                }
            }

            let (event_name, level, outcome) = if saw_error {
                ("execution.failure", AuditLevel::Error, Outcome::Error)
            } else {
                ("execution.success", AuditLevel::Info, Outcome::Ok)
            };
            audit_sink
                .record(AuditEvent::new(
                    clock.now(),
                    execution_id.clone(),
                    "kernel",
                    Actor {
                        kind: ActorKind::System,
                        id: "kernel".to_owned(),
                        role: None,
                    },
                    event_name,
                    level,
                ))
                .await;
            observer.record_phase(PhaseEvent {
                execution_id,
                phase: Phase::ProviderDispatch,
                outcome,
                error_kind: if saw_error { Some("provider") } else { None },
            });
        });

        Ok(ReceiverStream::new(rx))
    }

    /// Reports liveness, readiness, and per-provider health.
    pub async fn health(&self) -> KernelHealth {
        let all_providers = self.providers.all();
        let mut providers = BTreeMap::new();
        for provider in &all_providers {
            let health: ProviderHealth = provider.health(self.clock.as_ref()).await;
            providers.insert(provider.id().into(), health);
        }
        KernelHealth {
            liveness: true,
            readiness: !all_providers.is_empty(),
            providers,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use kernel_config::RateLimiterSettings;
    use kernel_core::ArtifactLocation;
    use kernel_core::FinishReason;
    use kernel_core::Message;
    use kernel_core::ModelFormat;
    use kernel_core::ResourceRequirements;
    use kernel_core::Role;
    use kernel_providers::ProviderCapabilities;
    use kernel_providers::ProviderError;
    use kernel_providers::ProviderMetadata;
    use kernel_providers::ProviderRequest;
    use kernel_providers::ProviderResponse;

    use super::*;

    struct EchoProvider {
        id: &'static str,
    }

    #[async_trait]
    impl Provider for EchoProvider {
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

        async fn initialize(&self, _tenant: &TenantContext) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn infer(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
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

        async fn health(&self, clock: &dyn Clock) -> ProviderHealth {
            ProviderHealth {
                status: kernel_core::HealthStatus::Healthy,
                message: "ok".to_owned(),
                timestamp: clock.now(),
                details: BTreeMap::new(),
            }
        }

        async fn shutdown(&self) {}
    }

    #[async_trait]
    impl StreamingProvider for EchoProvider {
        async fn stream(
            &self,
            request: ProviderRequest,
        ) -> Result<ReceiverStream<Result<kernel_providers::ProviderStreamChunk, ProviderError>>, ProviderError> {
            let content = request.messages.last().map(|message| message.content.clone()).unwrap_or_default();
            let request_id = request.request_id;
            let (tx, rx) = tokio::sync::mpsc::channel(4);
            tokio::spawn(async move {
                let _ = tx.send(Ok(StreamChunk::new(request_id.clone(), content, 0))).await;
                let _ = tx.send(Ok(StreamChunk::terminal(request_id, 1, FinishReason::Stop))).await;
            });
            Ok(ReceiverStream::new(rx))
        }
    }

    fn sample_manifest(now: Timestamp) -> ModelManifest {
        ModelManifest {
            model_id: "llama-3-8b".into(),
            display_name: "Llama 3 8B".to_owned(),
            version: "1.0.0".to_owned(),
            tenant_id: "system".into(),
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
            created_at: now,
            updated_at: now,
        }
    }

    async fn build_kernel(config: KernelConfig) -> Kernel {
        let system_tenant = TenantContext::new("system");
        let now = SystemClock.now();
        let echo: Arc<EchoProvider> = Arc::new(EchoProvider { id: "echo" });
        Kernel::with_defaults(
            config,
            vec![echo.clone()],
            vec![echo],
            vec![sample_manifest(now)],
            &system_tenant,
            Arc::new(EntitlementRegistry::new()),
        )
        .await
        .expect("kernel should build against a healthy echo provider")
    }

    #[tokio::test]
    async fn execute_round_trips_through_the_echo_provider() {
        let kernel = build_kernel(KernelConfig::default()).await;
        let request = InferenceRequest::builder("req-1", "llama-3-8b", vec![Message::new(Role::User, "hi")])
            .build()
            .expect("request is well-formed");
        let response = kernel
            .execute(request, TenantContext::new("acme"))
            .await
            .expect("execution should not be rate limited");
        assert_eq!(response.content, "hi");
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn health_reports_the_registered_provider() {
        let kernel = build_kernel(KernelConfig::default()).await;
        let health = kernel.health().await;
        assert!(health.liveness);
        assert!(health.readiness);
        assert_eq!(health.providers.len(), 1);
    }

    #[tokio::test]
    async fn execute_rejects_the_second_call_once_the_bucket_is_exhausted() {
        let config = KernelConfig {
            rate_limiter: RateLimiterSettings::TokenBucket {
                capacity: 1,
                refill_period_ms: 60_000,
            },
            ..KernelConfig::default()
        };
        let kernel = build_kernel(config).await;
        let tenant = TenantContext::new("acme");

        let first = InferenceRequest::builder("req-1", "llama-3-8b", vec![Message::new(Role::User, "hi")])
            .build()
            .expect("request is well-formed");
        kernel.execute(first, tenant.clone()).await.expect("first call should be admitted");

        let second = InferenceRequest::builder("req-2", "llama-3-8b", vec![Message::new(Role::User, "hi")])
            .build()
            .expect("request is well-formed");
        let result = kernel.execute(second, tenant).await;
        assert!(matches!(result, Err(KernelError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn execute_streaming_round_trips_through_the_echo_provider() {
        let kernel = build_kernel(KernelConfig::default()).await;
        let request = InferenceRequest::builder("req-1", "llama-3-8b", vec![Message::new(Role::User, "hi")])
            .build()
            .expect("request is well-formed");

        let mut stream = kernel
            .execute_streaming(request, TenantContext::new("acme"))
            .await
            .expect("execution should not be rate limited");

        let mut chunks = Vec::new();
        while let Some(chunk) = futures::StreamExt::next(&mut stream).await {
            chunks.push(chunk.expect("provider stream should not error"));
        }

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].delta, "hi");
        assert!(!chunks[0].last);
        assert!(chunks[1].last);
        assert_eq!(chunks[1].finish_reason, Some(FinishReason::Stop));
    }
}
