// kernel-providers/src/capabilities.rs
// ============================================================================
// Module: Provider Capabilities
// Description: Static description of what a provider can do.
// Purpose: Let the selection policy and registry filter providers by model
// and feature support without invoking them.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! `ProviderCapabilities` is returned once, at registration time, by every
//! provider and never changes while a kernel instance runs.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

/// Static capability description of a provider.
///
/// # Invariants
/// - An empty `supported_models` means the provider supports every model
///   (no restriction), per spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    /// Whether the provider can stream a response.
    pub streaming: bool,
    /// Whether the provider supports function/tool calling.
    pub function_calling: bool,
    /// Whether the provider accepts multimodal input.
    pub multimodal: bool,
    /// Whether the provider can produce embeddings.
    pub embeddings: bool,
    /// Maximum input context window, in tokens.
    pub max_context_tokens: u32,
    /// Maximum output length, in tokens.
    pub max_output_tokens: u32,
    /// Model identifiers this provider supports; empty means all.
    pub supported_models: BTreeSet<String>,
    /// Supported language codes (e.g. `en`, `fr`).
    pub supported_languages: Vec<String>,
    /// Free-form capability feature tags.
    pub feature_tags: BTreeSet<String>,
}

impl ProviderCapabilities {
    /// Returns true when this provider can serve `model_id`.
    #[must_use]
    pub fn supports_model(&self, model_id: &str) -> bool {
        self.supported_models.is_empty() || self.supported_models.contains(model_id)
    }
}

#[cfg(test)]
mod tests {
    use super::ProviderCapabilities;

    #[test]
    fn empty_supported_models_means_unrestricted() {
        let capabilities = ProviderCapabilities::default();
        assert!(capabilities.supports_model("anything"));
    }

    #[test]
    fn non_empty_supported_models_restricts() {
        let mut capabilities = ProviderCapabilities::default();
        capabilities.supported_models.insert("gpt-4o".to_owned());
        assert!(capabilities.supports_model("gpt-4o"));
        assert!(!capabilities.supports_model("gpt-3.5"));
    }
}
