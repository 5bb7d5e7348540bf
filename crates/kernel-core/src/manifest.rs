// kernel-core/src/manifest.rs
// ============================================================================
// Module: Model Manifest
// Description: Static description of a loadable model: formats, artifact
// locations, supported devices, and resource requirements.
// Purpose: Let runner selection and warm-pool sizing reason about a model
// without touching its artifact.
// Dependencies: serde, serde_json, time, crate::{identifiers, time}
// ============================================================================

//! ## Overview
//! A [`ModelManifest`] is resolved once per model identifier (typically from
//! a registry file or config) and handed to [`crate::pipeline`] phases and
//! `kernel-runtime`'s runner factory. It carries no runtime state; a single
//! manifest may list several [`ModelFormat`] realizations of the same model
//! (e.g. a GGUF quantization and a Safetensors checkpoint), each with its
//! own artifact location.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::identifiers::ModelId;
use crate::identifiers::TenantId;
use crate::time::Timestamp;

/// On-disk or wire format tag of a model artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFormat {
    /// GGUF quantized format.
    Gguf,
    /// ONNX graph format.
    Onnx,
    /// NVIDIA TensorRT engine format.
    TensorRt,
    /// TorchScript traced/scripted format.
    TorchScript,
    /// TensorFlow SavedModel format.
    TensorFlowSavedModel,
    /// Safetensors weight format.
    Safetensors,
    /// Raw PyTorch checkpoint format.
    PyTorch,
    /// Format could not be determined.
    Unknown,
}

/// Where a single format realization of a model's artifact lives.
///
/// # Invariants
/// - `uri` uses the scheme `file://` for local paths or `http(s)://` for
///   remote locations; providers treat the URI opaquely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLocation {
    /// Artifact URI.
    pub uri: String,
    /// Optional content checksum (e.g. `sha256:...`).
    pub checksum: Option<String>,
    /// Artifact size in bytes.
    pub size_bytes: u64,
    /// MIME type of the artifact.
    pub mime_type: String,
}

/// Resource requirements to load and run a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    /// Minimum device memory in megabytes.
    pub min_memory_mb: u64,
    /// Recommended device memory in megabytes.
    pub recommended_memory_mb: u64,
    /// Minimum VRAM in megabytes.
    pub min_vram_mb: u64,
    /// Minimum CPU core count, when constrained.
    pub min_cores: Option<u32>,
    /// Minimum free disk space in megabytes, when constrained.
    pub min_disk_mb: Option<u64>,
}

/// Static description of a model the kernel can route requests to.
///
/// # Invariants
/// - `model_id` uniquely identifies the manifest within a single kernel
///   instance.
/// - `artifacts` is never empty: a manifest with no realized format cannot
///   be scheduled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    /// Model identifier.
    pub model_id: ModelId,
    /// Human-readable display name.
    pub display_name: String,
    /// Manifest version string.
    pub version: String,
    /// Tenant this manifest is scoped to.
    pub tenant_id: TenantId,
    /// Artifact location for each realized format.
    pub artifacts: BTreeMap<ModelFormat, ArtifactLocation>,
    /// Devices this model can run on, e.g. `"cpu"`, `"cuda:0"`.
    pub supported_devices: Vec<String>,
    /// Resource requirements to load this model.
    pub resources: ResourceRequirements,
    /// Free-form manifest metadata.
    pub metadata: BTreeMap<String, Value>,
    /// Timestamp the manifest was created.
    pub created_at: Timestamp,
    /// Timestamp the manifest was last updated.
    pub updated_at: Timestamp,
}

impl ModelManifest {
    /// Returns true when `format` is one of this manifest's realized
    /// artifact formats.
    #[must_use]
    pub fn supports_format(&self, format: ModelFormat) -> bool {
        self.artifacts.contains_key(&format)
    }

    /// Returns true when this manifest has no local artifact and can only
    /// be served by a remote provider.
    #[must_use]
    pub fn is_remote_only(&self) -> bool {
        self.artifacts.values().all(|location| {
            location.uri.starts_with("http://") || location.uri.starts_with("https://")
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::ArtifactLocation;
    use super::ModelFormat;
    use super::ModelManifest;
    use super::ResourceRequirements;
    use crate::time::Timestamp;
    use time::macros::datetime;

    fn sample_manifest(artifacts: BTreeMap<ModelFormat, ArtifactLocation>) -> ModelManifest {
        ModelManifest {
            model_id: "llama-3-8b".into(),
            display_name: "Llama 3 8B".to_owned(),
            version: "1.0.0".to_owned(),
            tenant_id: "acme".into(),
            artifacts,
            supported_devices: vec!["cpu".to_owned()],
            resources: ResourceRequirements::default(),
            metadata: BTreeMap::new(),
            created_at: Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC)),
            updated_at: Timestamp::from_offset(datetime!(2026-01-01 00:00:00 UTC)),
        }
    }

    #[test]
    fn supports_format_reflects_artifact_map() {
        let mut artifacts = BTreeMap::new();
        artifacts.insert(
            ModelFormat::Gguf,
            ArtifactLocation {
                uri: "file:///models/llama-3-8b.gguf".to_owned(),
                checksum: None,
                size_bytes: 4_000_000_000,
                mime_type: "application/octet-stream".to_owned(),
            },
        );
        let manifest = sample_manifest(artifacts);
        assert!(manifest.supports_format(ModelFormat::Gguf));
        assert!(!manifest.supports_format(ModelFormat::Onnx));
    }

    #[test]
    fn http_only_artifacts_are_remote_only() {
        let mut artifacts = BTreeMap::new();
        artifacts.insert(
            ModelFormat::Unknown,
            ArtifactLocation {
                uri: "https://api.openai.com/v1/models/gpt-4o".to_owned(),
                checksum: None,
                size_bytes: 0,
                mime_type: "application/json".to_owned(),
            },
        );
        assert!(sample_manifest(artifacts).is_remote_only());
    }
}
