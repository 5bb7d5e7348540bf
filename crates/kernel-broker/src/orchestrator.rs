// kernel-broker/src/orchestrator.rs
// ============================================================================
// Module: Orchestrator
// Description: Walks a ranked candidate list, acquiring each runner from
// the factory and invoking it inside a per-runner circuit breaker, falling
// back to the next candidate on a retryable failure.
// Purpose: Turn a static ranking into the spec's fallback loop without
// coupling the broker to any specific provider wire protocol.
// Dependencies: kernel-core, kernel-resilience, kernel-runtime
// ============================================================================

//! ## Overview
//! [`Orchestrator::dispatch`] is the generalized form of
//! `decision-gate-broker`'s `CompositeBroker`: that broker resolved one
//! source then delivered to a single configured sink; this orchestrator
//! resolves (acquires) each of N ranked runners in turn and delivers to a
//! caller-supplied `call` closure, stopping at the first success. The
//! closure stays generic over the actual request/response shape so this
//! crate never needs to depend on `kernel-providers`: whatever invokes a
//! runner's session to produce a response lives with the caller (typically
//! the `kernel` facade crate).

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use kernel_core::ModelManifest;
use kernel_core::RunnerId;
use kernel_core::TenantContext;
use kernel_core::Timestamp;
use kernel_resilience::CallOutcome;
use kernel_resilience::CircuitBreaker;
use kernel_resilience::CircuitBreakerConfig;
use kernel_runtime::Runner;
use kernel_runtime::RunnerConfig;
use kernel_runtime::RunnerFactory;
use tokio::sync::Mutex;

use crate::error::BrokerError;
use crate::selection::RankedCandidate;

/// Classification a dispatch closure's error reports back to the
/// orchestrator: whether it is worth falling back to the next candidate.
pub trait ClassifyOutcome: std::fmt::Display {
    /// Returns true when the orchestrator should try the next ranked
    /// candidate rather than surface this error immediately.
    fn is_retryable(&self) -> bool;
}

/// Walks ranked candidates, acquiring each from a [`RunnerFactory`] and
/// invoking a caller-supplied closure inside a per-runner [`CircuitBreaker`].
pub struct Orchestrator {
    factory: Arc<RunnerFactory>,
    breaker_config: CircuitBreakerConfig,
    breakers: Mutex<HashMap<RunnerId, Arc<CircuitBreaker>>>,
}

impl Orchestrator {
    /// Builds an orchestrator driving `factory`, guarding every distinct
    /// candidate runner with its own breaker configured by `breaker_config`.
    #[must_use]
    pub fn new(factory: Arc<RunnerFactory>, breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            factory,
            breaker_config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    async fn breaker_for(&self, runner_id: &RunnerId) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().await;
        Arc::clone(
            breakers
                .entry(runner_id.clone())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(self.breaker_config))),
        )
    }

    /// Walks `ranked` in order. For each candidate: acquires the runner
    /// from the factory, then invokes `call` with it inside that runner's
    /// breaker. Returns the first success; a retryable failure falls back
    /// to the next candidate, a non-retryable one surfaces immediately.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::NoCompatibleProviderAvailable`] when `ranked`
    /// is empty, [`BrokerError::NonRetryable`] when a candidate fails with
    /// a non-retryable error, or [`BrokerError::AllRunnersFailed`] wrapping
    /// the last error once every candidate has been tried.
    pub async fn dispatch<F, Fut, R, E>(
        &self,
        model_id: &str,
        ranked: &[RankedCandidate],
        tenant: &TenantContext,
        manifest: &ModelManifest,
        runner_config: &RunnerConfig,
        now: Timestamp,
        call: F,
    ) -> Result<R, BrokerError>
    where
        F: Fn(Arc<dyn Runner>) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: ClassifyOutcome,
    {
        if ranked.is_empty() {
            return Err(BrokerError::NoCompatibleProviderAvailable {
                model_id: model_id.to_owned(),
            });
        }

        let mut last_error: Option<String> = None;
        for candidate in ranked {
            let breaker = self.breaker_for(&candidate.runner_id).await;
            if breaker.try_acquire(now).is_err() {
                last_error = Some(format!("{} circuit open", candidate.runner_id));
                continue;
            }

            let runner = match self
                .factory
                .acquire(tenant, manifest, &candidate.runner_id, runner_config, now)
                .await
            {
                Ok(runner) => runner,
                Err(error) => {
                    breaker.record_outcome(CallOutcome::Failure, now);
                    last_error = Some(error.to_string());
                    continue;
                }
            };

            match call(runner).await {
                Ok(response) => {
                    breaker.record_outcome(CallOutcome::Success, now);
                    return Ok(response);
                }
                Err(error) => {
                    breaker.record_outcome(CallOutcome::Failure, now);
                    if !error.is_retryable() {
                        return Err(BrokerError::NonRetryable {
                            message: error.to_string(),
                        });
                    }
                    last_error = Some(error.to_string());
                }
            }
        }

        Err(BrokerError::AllRunnersFailed {
            model_id: model_id.to_owned(),
            last_error: last_error.unwrap_or_else(|| "no candidate was attempted".to_owned()),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use async_trait::async_trait;
    use kernel_core::ArtifactLocation;
    use kernel_core::ModelFormat;
    use kernel_core::ModelManifest;
    use kernel_core::ResourceRequirements;
    use kernel_core::TenantContext;
    use kernel_core::Timestamp;
    use kernel_runtime::Runner;
    use kernel_runtime::Session;
    use kernel_runtime::RunnerBuilder;
    use kernel_runtime::RunnerConfig;
    use kernel_runtime::RunnerError;
    use kernel_runtime::RunnerFactory;
    use kernel_runtime::RunnerFactoryConfig;
    use kernel_resilience::CircuitBreakerConfig;
    use time::macros::datetime;

    use super::ClassifyOutcome;
    use super::Orchestrator;
    use crate::selection::RankedCandidate;

    struct StubRunner {
        id: kernel_core::RunnerId,
        fails: bool,
    }

    #[async_trait]
    impl Runner for StubRunner {
        fn id(&self) -> &kernel_core::RunnerId {
            &self.id
        }

        async fn initialize(
            &self,
            _manifest: &ModelManifest,
            _config: &RunnerConfig,
            _tenant: &TenantContext,
        ) -> Result<(), RunnerError> {
            Ok(())
        }

        async fn warmup(&self, _sample_count: usize) -> Result<(), RunnerError> {
            Ok(())
        }

        async fn create_session(&self, _tenant: &TenantContext) -> Result<Session, RunnerError> {
            if self.fails {
                Err(RunnerError::SessionCreationFailed {
                    runner_id: self.id.to_string(),
                    message: "stub failure".to_owned(),
                })
            } else {
                Ok(Session {
                    session_id: "sess-1".into(),
                    created_at: Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC)),
                })
            }
        }

        async fn close_session(&self, _session: Session) -> Result<(), RunnerError> {
            Ok(())
        }

        async fn close(&self) {}
    }

    struct StubBuilder {
        fails: Vec<String>,
    }

    #[async_trait]
    impl RunnerBuilder for StubBuilder {
        async fn build(
            &self,
            _tenant: &TenantContext,
            _manifest: &ModelManifest,
            runner_id: &kernel_core::RunnerId,
            _config: &RunnerConfig,
            _warmup: bool,
        ) -> Result<Arc<dyn Runner>, RunnerError> {
            Ok(Arc::new(StubRunner {
                id: runner_id.clone(),
                fails: self.fails.iter().any(|id| id == runner_id.as_str()),
            }))
        }
    }

    #[derive(Debug)]
    struct StubCallError(bool);

    impl std::fmt::Display for StubCallError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "stub call error")
        }
    }

    impl ClassifyOutcome for StubCallError {
        fn is_retryable(&self) -> bool {
            self.0
        }
    }

    fn manifest() -> ModelManifest {
        let mut artifacts = BTreeMap::new();
        artifacts.insert(
            ModelFormat::Gguf,
            ArtifactLocation {
                uri: "file:///m.gguf".to_owned(),
                checksum: None,
                size_bytes: 1,
                mime_type: "application/octet-stream".to_owned(),
            },
        );
        ModelManifest {
            model_id: "m".into(),
            display_name: "M".to_owned(),
            version: "1".to_owned(),
            tenant_id: "acme".into(),
            artifacts,
            supported_devices: vec!["cpu".to_owned()],
            resources: ResourceRequirements::default(),
            metadata: BTreeMap::new(),
            created_at: Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC)),
            updated_at: Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC)),
        }
    }

    #[tokio::test]
    async fn first_candidate_success_short_circuits() {
        let factory = Arc::new(RunnerFactory::new(Arc::new(StubBuilder { fails: vec![] }), RunnerFactoryConfig::default()));
        let orchestrator = Orchestrator::new(Arc::clone(&factory), CircuitBreakerConfig {
            failure_threshold: 3,
            failure_rate_threshold: 0.5,
            window_size: 4,
            open_duration: std::time::Duration::from_secs(60),
            half_open_probes: 1,
            half_open_success_threshold: 1,
        });
        let ranked = vec![
            RankedCandidate {
                runner_id: "r1".into(),
                score: 100,
            },
            RankedCandidate {
                runner_id: "r2".into(),
                score: 50,
            },
        ];
        let tenant = TenantContext::new("acme");
        let manifest = manifest();
        let config = RunnerConfig::default();
        let now = Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC));
        let calls = AtomicUsize::new(0);
        let result = orchestrator
            .dispatch(manifest.model_id.as_str(), &ranked, &tenant, &manifest, &config, now, |runner| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    runner
                        .create_session(&TenantContext::new("acme"))
                        .await
                        .map_err(|_| StubCallError(true))
                }
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retryable_failure_falls_back_to_next_candidate() {
        let factory = Arc::new(RunnerFactory::new(
            Arc::new(StubBuilder {
                fails: vec!["r1".to_owned()],
            }),
            RunnerFactoryConfig::default(),
        ));
        let orchestrator = Orchestrator::new(Arc::clone(&factory), CircuitBreakerConfig {
            failure_threshold: 3,
            failure_rate_threshold: 0.5,
            window_size: 4,
            open_duration: std::time::Duration::from_secs(60),
            half_open_probes: 1,
            half_open_success_threshold: 1,
        });
        let ranked = vec![
            RankedCandidate {
                runner_id: "r1".into(),
                score: 100,
            },
            RankedCandidate {
                runner_id: "r2".into(),
                score: 50,
            },
        ];
        let tenant = TenantContext::new("acme");
        let manifest = manifest();
        let config = RunnerConfig::default();
        let now = Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC));
        let result = orchestrator
            .dispatch(manifest.model_id.as_str(), &ranked, &tenant, &manifest, &config, now, |runner| async move {
                runner
                    .create_session(&TenantContext::new("acme"))
                    .await
                    .map_err(|_| StubCallError(true))
            })
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn non_retryable_failure_surfaces_immediately() {
        let factory = Arc::new(RunnerFactory::new(Arc::new(StubBuilder { fails: vec![] }), RunnerFactoryConfig::default()));
        let orchestrator = Orchestrator::new(Arc::clone(&factory), CircuitBreakerConfig {
            failure_threshold: 3,
            failure_rate_threshold: 0.5,
            window_size: 4,
            open_duration: std::time::Duration::from_secs(60),
            half_open_probes: 1,
            half_open_success_threshold: 1,
        });
        let ranked = vec![
            RankedCandidate {
                runner_id: "r1".into(),
                score: 100,
            },
            RankedCandidate {
                runner_id: "r2".into(),
                score: 50,
            },
        ];
        let tenant = TenantContext::new("acme");
        let manifest = manifest();
        let config = RunnerConfig::default();
        let now = Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC));
        let result: Result<Session, _> = orchestrator
            .dispatch(manifest.model_id.as_str(), &ranked, &tenant, &manifest, &config, now, |_runner| async move {
                Err(StubCallError(false))
            })
            .await;
        assert!(matches!(result, Err(super::BrokerError::NonRetryable { .. })));
    }

    #[tokio::test]
    async fn empty_ranking_is_no_compatible_provider() {
        let factory = Arc::new(RunnerFactory::new(Arc::new(StubBuilder { fails: vec![] }), RunnerFactoryConfig::default()));
        let orchestrator = Orchestrator::new(factory, CircuitBreakerConfig {
            failure_threshold: 3,
            failure_rate_threshold: 0.5,
            window_size: 4,
            open_duration: std::time::Duration::from_secs(60),
            half_open_probes: 1,
            half_open_success_threshold: 1,
        });
        let tenant = TenantContext::new("acme");
        let manifest = manifest();
        let config = RunnerConfig::default();
        let now = Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC));
        let result: Result<Session, _> = orchestrator
            .dispatch(manifest.model_id.as_str(), &[], &tenant, &manifest, &config, now, |_runner| async move {
                Err(StubCallError(true))
            })
            .await;
        assert!(matches!(result, Err(super::BrokerError::NoCompatibleProviderAvailable { .. })));
    }
}
