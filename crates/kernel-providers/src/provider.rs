// kernel-providers/src/provider.rs
// ============================================================================
// Module: Provider Trait & Health Cache
// Description: The async provider contract and its TTL-cached health value.
// Purpose: Give every backend (local runtime or remote API) one contract to
// satisfy: identity, capabilities, lifecycle, inference, health, shutdown.
// Dependencies: async-trait, tokio, kernel-core
// ============================================================================

//! ## Overview
//! [`Provider`] is the contract every backend satisfies. `initialize` MUST be
//! idempotent: the registry may call it more than once (e.g. on a reload) and
//! a provider must tolerate that without re-acquiring exclusive resources
//! twice. Streaming-capable providers additionally implement [`StreamingProvider`].
//! [`ProviderHealthCache`] gives a provider a default TTL-cached health value
//! so a hot path doesn't have to probe a backend on every call; `Provider::health`
//! implementations are expected to consult their own cache and refresh on miss.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use kernel_core::Clock;
use kernel_core::ProviderHealth;
use kernel_core::TenantContext;
use kernel_core::Timestamp;
use thiserror::Error;

use crate::capabilities::ProviderCapabilities;
use crate::wire::ProviderRequest;
use crate::wire::ProviderResponse;

/// Default TTL for a cached provider health snapshot.
pub const DEFAULT_HEALTH_TTL: Duration = Duration::from_secs(30);

/// Static, non-capability metadata describing a provider implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMetadata {
    /// Human-readable name.
    pub name: String,
    /// Provider implementation version.
    pub version: String,
    /// Vendor or maintainer.
    pub vendor: String,
    /// Short description.
    pub description: String,
}

/// Errors a provider implementation may raise.
///
/// # Invariants
/// - `retryable` reflects this specific failure, not just the variant's
///   usual default; a provider may downgrade or upgrade it based on context
///   (e.g. a rate-limit response is retryable even though it arrives as
///   `Unreachable` from some backends).
#[derive(Debug, Error, Clone)]
pub enum ProviderError {
    /// The provider could not be reached (connection refused, DNS, timeout).
    #[error("provider {provider_id} unreachable: {message}")]
    Unreachable {
        /// Identifier of the provider that failed.
        provider_id: String,
        /// Human-readable detail.
        message: String,
        /// Whether the orchestrator should fall back to another candidate.
        retryable: bool,
    },
    /// The provider responded but the response could not be parsed or was
    /// semantically invalid.
    #[error("provider {provider_id} returned an invalid response: {message}")]
    InvalidResponse {
        /// Identifier of the provider that failed.
        provider_id: String,
        /// Human-readable detail.
        message: String,
    },
    /// The provider rejected the request as invalid (non-retryable).
    #[error("provider {provider_id} rejected request: {message}")]
    Validation {
        /// Identifier of the provider that failed.
        provider_id: String,
        /// Human-readable detail.
        message: String,
    },
    /// The provider reported a quota or concurrency-limit failure.
    #[error("provider {provider_id} quota exceeded: {message}")]
    Quota {
        /// Identifier of the provider that failed.
        provider_id: String,
        /// Human-readable detail.
        message: String,
    },
    /// The stream disconnected mid-flight.
    #[error("provider {provider_id} stream disconnected: {message}")]
    StreamDisconnected {
        /// Identifier of the provider that failed.
        provider_id: String,
        /// Human-readable detail.
        message: String,
    },
}

impl ProviderError {
    /// Returns the identifier of the provider that raised this error.
    #[must_use]
    pub fn provider_id(&self) -> &str {
        match self {
            Self::Unreachable { provider_id, .. }
            | Self::InvalidResponse { provider_id, .. }
            | Self::Validation { provider_id, .. }
            | Self::Quota { provider_id, .. }
            | Self::StreamDisconnected { provider_id, .. } => provider_id,
        }
    }

    /// Returns true when the orchestrator should fall back to the next
    /// candidate rather than surfacing the error immediately.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation { .. } => false,
            Self::Unreachable { retryable, .. } => *retryable,
            Self::InvalidResponse { .. } | Self::Quota { .. } | Self::StreamDisconnected { .. } => true,
        }
    }
}

/// A single chunk of a streamed provider response.
pub type ProviderStreamChunk = kernel_core::StreamChunk;

/// Backend capable of producing an inference response from a normalized
/// [`ProviderRequest`].
///
/// `initialize` MUST be idempotent. Streaming support is a separate trait
/// ([`StreamingProvider`]) rather than an optional method here, so the
/// registry's `streaming()` lookup can be a plain downcast-free type filter
/// at registration time.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier for this provider within the registry.
    fn id(&self) -> &str;

    /// Static metadata describing this provider.
    fn metadata(&self) -> ProviderMetadata;

    /// Static capabilities this provider exposes.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Prepares the provider for use. Idempotent: safe to call more than
    /// once.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when initialization fails.
    async fn initialize(&self, tenant: &TenantContext) -> Result<(), ProviderError>;

    /// Performs a blocking inference call.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the call fails.
    async fn infer(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Returns the current health of this provider, consulting and
    /// refreshing its TTL cache as needed.
    async fn health(&self, clock: &dyn Clock) -> ProviderHealth;

    /// Releases any resources held by this provider.
    async fn shutdown(&self);
}

/// Backend capable of streaming a response as a sequence of chunks.
#[async_trait]
pub trait StreamingProvider: Provider {
    /// Performs a streaming inference call, returning chunks as they arrive.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the stream cannot be established.
    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<tokio_stream::wrappers::ReceiverStream<Result<ProviderStreamChunk, ProviderError>>, ProviderError>;
}

/// TTL-guarded cache of a provider's last-observed health snapshot.
///
/// # Invariants
/// - A cached value older than `ttl` is never returned by [`ProviderHealthCache::get`];
///   the caller must refresh via [`ProviderHealthCache::set`].
pub struct ProviderHealthCache {
    ttl: Duration,
    cached: Mutex<Option<(Timestamp, ProviderHealth)>>,
}

impl ProviderHealthCache {
    /// Builds an empty cache with the given TTL.
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cached: Mutex::new(None),
        }
    }

    /// Builds an empty cache with [`DEFAULT_HEALTH_TTL`].
    #[must_use]
    pub const fn with_default_ttl() -> Self {
        Self::new(DEFAULT_HEALTH_TTL)
    }

    /// Returns the cached health value if it is still within its TTL as of
    /// `now`, else `None`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn get(&self, now: Timestamp) -> Option<ProviderHealth> {
        let guard = self.cached.lock().expect("health cache mutex poisoned");
        let (observed_at, health) = guard.as_ref()?;
        if observed_at.elapsed_until(now) <= self.ttl {
            Some(health.clone())
        } else {
            None
        }
    }

    /// Replaces the cached value, stamped with `now`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set(&self, now: Timestamp, health: ProviderHealth) {
        *self.cached.lock().expect("health cache mutex poisoned") = Some((now, health));
    }
}

#[cfg(test)]
mod tests {
    use kernel_core::HealthStatus;
    use time::macros::datetime;

    use super::ProviderHealthCache;
    use super::DEFAULT_HEALTH_TTL;
    use kernel_core::ProviderHealth;
    use kernel_core::Timestamp;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn health_at(ts: Timestamp) -> ProviderHealth {
        ProviderHealth {
            status: HealthStatus::Healthy,
            message: "ok".to_owned(),
            timestamp: ts,
            details: BTreeMap::new(),
        }
    }

    #[test]
    fn returns_none_before_any_value_is_set() {
        let cache = ProviderHealthCache::with_default_ttl();
        let now = Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC));
        assert!(cache.get(now).is_none());
    }

    #[test]
    fn returns_cached_value_within_ttl() {
        let cache = ProviderHealthCache::new(Duration::from_secs(30));
        let t0 = Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC));
        cache.set(t0, health_at(t0));
        let t1 = Timestamp::from_offset(datetime!(2026-01-01 00:00:10 UTC));
        assert!(cache.get(t1).is_some());
    }

    #[test]
    fn expires_after_ttl() {
        let cache = ProviderHealthCache::new(DEFAULT_HEALTH_TTL);
        let t0 = Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC));
        cache.set(t0, health_at(t0));
        let t1 = Timestamp::from_offset(datetime!(2026-01-01 00:00:31 UTC));
        assert!(cache.get(t1).is_none());
    }
}
