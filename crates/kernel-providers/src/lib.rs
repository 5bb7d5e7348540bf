// kernel-providers/src/lib.rs
// ============================================================================
// Module: Kernel Providers Library
// Description: Public API surface for the provider abstraction crate.
// Purpose: Expose the async provider trait, capabilities, wire
// normalization, and the process-scoped provider registry.
// Dependencies: crate::{capabilities, provider, registry, wire}
// ============================================================================

//! ## Overview
//! `kernel-providers` defines the seam between the kernel's pipeline and any
//! concrete backend (local GGUF/ONNX runtime or remote LLM API). It has no
//! opinion about which backends exist; `kernel-runtime` and deployment code
//! supply the concrete [`Provider`] implementations this crate registers and
//! dispatches through.

pub mod capabilities;
pub mod provider;
pub mod registry;
pub mod wire;

pub use capabilities::ProviderCapabilities;
pub use provider::DEFAULT_HEALTH_TTL;
pub use provider::Provider;
pub use provider::ProviderError;
pub use provider::ProviderHealthCache;
pub use provider::ProviderMetadata;
pub use provider::ProviderStreamChunk;
pub use provider::StreamingProvider;
pub use registry::ProviderRegistry;
pub use wire::ProviderRequest;
pub use wire::ProviderResponse;
