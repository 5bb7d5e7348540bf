// kernel-core/src/tenant.rs
// ============================================================================
// Module: Tenant Context
// Description: Per-request tenant identity and role/attribute posture.
// Purpose: Let authorization, rate-limiting, and audit phases reason about
// "who is asking" without threading raw strings through the pipeline.
// Dependencies: serde, crate::identifiers
// ============================================================================

//! ## Overview
//! `TenantContext` is attached to an execution at admission time and carried
//! unchanged through every phase. Two contexts are equal iff their tenant
//! identifiers match, regardless of their roles or attributes.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::TenantId;

/// Identity and role posture of the caller on whose behalf an execution
/// runs.
///
/// # Invariants
/// - `tenant_id` is non-empty.
/// - Equality (`PartialEq`) considers only `tenant_id`: two contexts for the
///   same tenant are equal even if their roles or attributes differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantContext {
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Optional end-user identifier within the tenant.
    pub user_id: Option<String>,
    /// Roles held by the caller.
    pub roles: BTreeSet<String>,
    /// Free-form tenant attributes.
    pub attributes: BTreeMap<String, String>,
}

impl TenantContext {
    /// Builds a tenant context with the given identifier and no roles or
    /// attributes.
    #[must_use]
    pub fn new(tenant_id: impl Into<TenantId>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: None,
            roles: BTreeSet::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Returns true when the caller holds `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

impl PartialEq for TenantContext {
    fn eq(&self, other: &Self) -> bool {
        self.tenant_id == other.tenant_id
    }
}

impl Eq for TenantContext {}
