// kernel/src/manifest_store.rs
// ============================================================================
// Module: Manifest Store
// Description: Process-scoped lookup of model manifests by model identifier.
// Purpose: Give the ROUTE phase a manifest to rank candidates against,
// mirroring kernel-providers's ProviderRegistry indexing pattern.
// Dependencies: kernel-core
// ============================================================================

//! ## Overview
//! `ManifestStore` is deliberately as small as `ProviderRegistry`: a
//! `BTreeMap` populated once at startup (manifest loading from an external
//! registry is out of scope) and read on every request thereafter.

use std::collections::BTreeMap;
use std::sync::RwLock;

use kernel_core::ModelId;
use kernel_core::ModelManifest;

/// Errors raised while resolving a manifest.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ManifestStoreError {
    /// No manifest is registered for the requested model.
    #[error("no manifest registered for model {model_id}")]
    NotFound {
        /// Requested model identifier.
        model_id: String,
    },
}

/// Process-scoped registry of static model manifests, indexed by model
/// identifier.
pub struct ManifestStore {
    manifests: RwLock<BTreeMap<ModelId, ModelManifest>>,
}

impl ManifestStore {
    /// Builds an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            manifests: RwLock::new(BTreeMap::new()),
        }
    }

    /// Builds a store pre-populated from `manifests`.
    #[must_use]
    pub fn from_manifests(manifests: impl IntoIterator<Item = ModelManifest>) -> Self {
        let store = Self::new();
        for manifest in manifests {
            store.insert(manifest);
        }
        store
    }

    /// Registers or replaces a manifest, indexed by its own `model_id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn insert(&self, manifest: ModelManifest) {
        self.manifests.write().expect("manifest store lock poisoned").insert(manifest.model_id.clone(), manifest);
    }

    /// Resolves the manifest for `model_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestStoreError::NotFound`] when no manifest is
    /// registered for `model_id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn get(&self, model_id: &ModelId) -> Result<ModelManifest, ManifestStoreError> {
        self.manifests
            .read()
            .expect("manifest store lock poisoned")
            .get(model_id)
            .cloned()
            .ok_or_else(|| ManifestStoreError::NotFound {
                model_id: model_id.to_string(),
            })
    }
}

impl Default for ManifestStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use kernel_core::ResourceRequirements;
    use kernel_core::Timestamp;
    use time::macros::datetime;

    use super::ManifestStore;

    fn manifest(model_id: &str) -> kernel_core::ModelManifest {
        kernel_core::ModelManifest {
            model_id: model_id.into(),
            display_name: model_id.to_owned(),
            version: "1.0.0".to_owned(),
            tenant_id: "acme".into(),
            artifacts: BTreeMap::new(),
            supported_devices: vec!["cpu".to_owned()],
            resources: ResourceRequirements::default(),
            metadata: BTreeMap::new(),
            created_at: Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC)),
            updated_at: Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC)),
        }
    }

    #[test]
    fn missing_manifest_is_not_found() {
        let store = ManifestStore::new();
        assert!(store.get(&"llama-3-8b".into()).is_err());
    }

    #[test]
    fn inserted_manifest_round_trips() {
        let store = ManifestStore::new();
        store.insert(manifest("llama-3-8b"));
        let found = store.get(&"llama-3-8b".into()).expect("manifest should be found");
        assert_eq!(found.model_id, "llama-3-8b".into());
    }
}
