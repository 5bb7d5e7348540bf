// kernel-core/src/health.rs
// ============================================================================
// Module: Kernel Health Surface
// Description: Plain serializable liveness/readiness snapshot.
// Purpose: Let a caller mount kernel health behind any transport without the
// kernel shipping an HTTP endpoint itself.
// Dependencies: serde, serde_json, crate::{identifiers, time}
// ============================================================================

//! ## Overview
//! [`KernelHealth`] is a point-in-time snapshot a caller requests and
//! serializes however it likes (HTTP, gRPC, a CLI). Building one is the
//! responsibility of the `kernel` facade crate, which has visibility into
//! every subsystem; this module only defines the shape. [`ProviderHealth`]
//! is the per-provider value each provider caches with a TTL and refreshes
//! on demand.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::identifiers::ProviderId;
use crate::time::Timestamp;

/// Health status of a single provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Passing recent health checks.
    Healthy,
    /// Degraded but still accepting traffic.
    Degraded,
    /// Failing health checks; excluded from selection.
    Unhealthy,
    /// No health check has completed yet.
    Unknown,
}

/// Health snapshot for a single provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealth {
    /// Current health status.
    pub status: HealthStatus,
    /// Human-readable status message.
    pub message: String,
    /// Timestamp this snapshot was produced.
    pub timestamp: Timestamp,
    /// Free-form health details.
    pub details: BTreeMap<String, Value>,
}

impl ProviderHealth {
    /// Builds an initial `UNKNOWN` health snapshot.
    #[must_use]
    pub fn unknown(now: Timestamp) -> Self {
        Self {
            status: HealthStatus::Unknown,
            message: "no health check has completed yet".to_owned(),
            timestamp: now,
            details: BTreeMap::new(),
        }
    }
}

/// Whole-kernel liveness/readiness snapshot.
///
/// # Invariants
/// - `readiness` is only true when `liveness` is also true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelHealth {
    /// Whether the kernel process is alive and responsive.
    pub liveness: bool,
    /// Whether the kernel is ready to accept new requests.
    pub readiness: bool,
    /// Per-provider health snapshots.
    pub providers: BTreeMap<ProviderId, ProviderHealth>,
}

impl KernelHealth {
    /// Returns true when every provider is at least [`HealthStatus::Degraded`].
    #[must_use]
    pub fn all_providers_usable(&self) -> bool {
        self.providers
            .values()
            .all(|health| matches!(health.status, HealthStatus::Healthy | HealthStatus::Degraded))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::HealthStatus;
    use super::KernelHealth;
    use super::ProviderHealth;
    use crate::time::Timestamp;
    use time::macros::datetime;

    fn at(status: HealthStatus) -> ProviderHealth {
        ProviderHealth {
            status,
            message: String::new(),
            timestamp: Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC)),
            details: BTreeMap::new(),
        }
    }

    #[test]
    fn all_providers_usable_is_false_when_one_is_unhealthy() {
        let mut providers = BTreeMap::new();
        providers.insert("openai".into(), at(HealthStatus::Healthy));
        providers.insert("local".into(), at(HealthStatus::Unhealthy));
        let health = KernelHealth {
            liveness: true,
            readiness: true,
            providers,
        };
        assert!(!health.all_providers_usable());
    }

    #[test]
    fn all_providers_usable_is_true_when_degraded_but_not_unhealthy() {
        let mut providers = BTreeMap::new();
        providers.insert("openai".into(), at(HealthStatus::Degraded));
        let health = KernelHealth {
            liveness: true,
            readiness: true,
            providers,
        };
        assert!(health.all_providers_usable());
    }
}
