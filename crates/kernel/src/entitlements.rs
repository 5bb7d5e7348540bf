// kernel/src/entitlements.rs
// ============================================================================
// Module: Entitlements
// Description: Per-tenant model entitlement lookup for the AUTHORIZE phase.
// Purpose: Let AUTHORIZE reject a tenant/model pairing without coupling the
// pipeline phase itself to a storage backend.
// Dependencies: kernel-core
// ============================================================================

//! ## Overview
//! An empty entitlement set for a tenant means unrestricted access, mirroring
//! [`kernel_providers::ProviderCapabilities::supports_model`]'s "empty means
//! all" convention. Entitlements are resolved once at startup here; a
//! downstream deployment wanting a live entitlement service implements its
//! own lookup against the same shape.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::RwLock;

use kernel_core::ModelId;
use kernel_core::TenantId;

/// Per-tenant model entitlement lookup.
///
/// # Invariants
/// - A tenant absent from the map, or mapped to an empty set, is entitled to
///   every model.
pub struct EntitlementRegistry {
    entitlements: RwLock<BTreeMap<TenantId, BTreeSet<ModelId>>>,
}

impl EntitlementRegistry {
    /// Builds a registry with no restrictions: every tenant is entitled to
    /// every model until [`EntitlementRegistry::restrict`] is called.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entitlements: RwLock::new(BTreeMap::new()),
        }
    }

    /// Restricts `tenant_id` to exactly `models`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn restrict(&self, tenant_id: impl Into<TenantId>, models: impl IntoIterator<Item = ModelId>) {
        self.entitlements
            .write()
            .expect("entitlement registry lock poisoned")
            .insert(tenant_id.into(), models.into_iter().collect());
    }

    /// Returns true when `tenant_id` may use `model_id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn is_entitled(&self, tenant_id: &TenantId, model_id: &ModelId) -> bool {
        self.entitlements
            .read()
            .expect("entitlement registry lock poisoned")
            .get(tenant_id)
            .is_none_or(|models| models.is_empty() || models.contains(model_id))
    }
}

impl Default for EntitlementRegistry {
    fn default() -> Self {
        Self::new()
    }
}
