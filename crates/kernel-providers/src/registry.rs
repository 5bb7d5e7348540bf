// kernel-providers/src/registry.rs
// ============================================================================
// Module: Provider Registry
// Description: Process-scoped registry of initialized providers.
// Purpose: Discover, index, and look up providers by identifier, model, or
// streaming support.
// Dependencies: kernel-core, crate::provider
// ============================================================================

//! ## Overview
//! [`ProviderRegistry`] is built once at kernel startup from a list of
//! already-constructed [`Provider`] trait objects, `initialize`s each, and
//! indexes them by identifier in a `BTreeMap` — read-mostly after startup,
//! written only during init and shutdown, per the kernel's concurrency model.

use std::collections::BTreeMap;
use std::sync::Arc;

use kernel_core::TenantContext;

use crate::provider::Provider;
use crate::provider::ProviderError;

/// Process-scoped registry of initialized providers, indexed by identifier.
///
/// # Invariants
/// - Provider identifiers are unique within the registry.
/// - `discover` initializes every provider before indexing it; a provider
///   that fails to initialize is excluded and its error surfaced to the
///   caller rather than silently dropped.
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: BTreeMap::new(),
        }
    }

    /// Initializes and indexes every provider in `candidates`, for the given
    /// tenant. Stops at the first initialization failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`ProviderError`] any candidate's `initialize`
    /// raises.
    pub async fn discover(
        candidates: Vec<Arc<dyn Provider>>,
        tenant: &TenantContext,
    ) -> Result<Self, ProviderError> {
        let mut registry = Self::new();
        for provider in candidates {
            provider.initialize(tenant).await?;
            registry.providers.insert(provider.id().to_owned(), provider);
        }
        Ok(registry)
    }

    /// Registers an already-initialized provider directly, for tests and
    /// incremental registration.
    pub fn insert(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.id().to_owned(), provider);
    }

    /// Looks up a provider by identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(id).cloned()
    }

    /// Returns every registered provider.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<dyn Provider>> {
        self.providers.values().cloned().collect()
    }

    /// Returns providers whose capabilities support `model_id`.
    #[must_use]
    pub fn for_model(&self, model_id: &str) -> Vec<Arc<dyn Provider>> {
        self.providers
            .values()
            .filter(|provider| provider.capabilities().supports_model(model_id))
            .cloned()
            .collect()
    }

    /// Returns providers whose capabilities include streaming support.
    #[must_use]
    pub fn streaming(&self) -> Vec<Arc<dyn Provider>> {
        self.providers
            .values()
            .filter(|provider| provider.capabilities().streaming)
            .cloned()
            .collect()
    }

    /// Shuts down every registered provider.
    pub async fn shutdown(&self) {
        for provider in self.providers.values() {
            provider.shutdown().await;
        }
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use kernel_core::Clock;
    use kernel_core::FixedClock;
    use kernel_core::ProviderHealth;
    use kernel_core::TenantContext;
    use kernel_core::Timestamp;

    use super::ProviderRegistry;
    use crate::capabilities::ProviderCapabilities;
    use crate::provider::Provider;
    use crate::provider::ProviderError;
    use crate::provider::ProviderMetadata;
    use crate::wire::ProviderRequest;
    use crate::wire::ProviderResponse;
    use std::sync::Arc;
    use time::macros::datetime;

    struct StubProvider {
        id: &'static str,
        models: Vec<String>,
        streaming: bool,
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn id(&self) -> &str {
            self.id
        }

        fn metadata(&self) -> ProviderMetadata {
            ProviderMetadata {
                name: self.id.to_owned(),
                version: "0.0.0".to_owned(),
                vendor: "test".to_owned(),
                description: String::new(),
            }
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities {
                streaming: self.streaming,
                supported_models: self.models.iter().cloned().collect(),
                ..ProviderCapabilities::default()
            }
        }

        async fn initialize(&self, _tenant: &TenantContext) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn infer(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::Unreachable {
                provider_id: self.id.to_owned(),
                message: "stub".to_owned(),
                retryable: true,
            })
        }

        async fn health(&self, clock: &dyn Clock) -> ProviderHealth {
            ProviderHealth::unknown(clock.now())
        }

        async fn shutdown(&self) {}
    }

    fn clock() -> FixedClock {
        FixedClock(Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC)))
    }

    #[tokio::test]
    async fn discover_indexes_every_candidate_by_id() {
        let candidates: Vec<Arc<dyn Provider>> = vec![
            Arc::new(StubProvider {
                id: "p1",
                models: vec!["m1".to_owned()],
                streaming: false,
            }),
            Arc::new(StubProvider {
                id: "p2",
                models: vec![],
                streaming: true,
            }),
        ];
        let registry = ProviderRegistry::discover(candidates, &TenantContext::new("acme"))
            .await
            .expect("discovery should succeed");
        assert!(registry.get("p1").is_some());
        assert!(registry.get("p2").is_some());
        assert_eq!(registry.all().len(), 2);
    }

    #[tokio::test]
    async fn for_model_filters_by_capability() {
        let mut registry = ProviderRegistry::new();
        registry.insert(Arc::new(StubProvider {
            id: "p1",
            models: vec!["m1".to_owned()],
            streaming: false,
        }));
        registry.insert(Arc::new(StubProvider {
            id: "p2",
            models: vec!["m2".to_owned()],
            streaming: false,
        }));
        let matches = registry.for_model("m1");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id(), "p1");
    }

    #[tokio::test]
    async fn streaming_returns_only_streaming_capable_providers() {
        let mut registry = ProviderRegistry::new();
        registry.insert(Arc::new(StubProvider {
            id: "p1",
            models: vec![],
            streaming: false,
        }));
        registry.insert(Arc::new(StubProvider {
            id: "p2",
            models: vec![],
            streaming: true,
        }));
        let matches = registry.streaming();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id(), "p2");
        let _ = clock();
    }
}
