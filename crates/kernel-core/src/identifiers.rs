// kernel-core/src/identifiers.rs
// ============================================================================
// Module: Kernel Identifiers
// Description: Canonical opaque identifiers used throughout the kernel.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every identifier in the kernel is a thin, string-backed newtype rather than
//! a bare `String`. This keeps request/execution/tenant/model/runner/session
//! identifiers from being interchanged by accident at call sites. Validation
//! (non-empty, charset) is the caller's responsibility at construction
//! boundaries; these wrappers only guarantee a stable serialized form.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Macro
// ============================================================================

/// Defines a string-backed identifier newtype with the kernel's standard
/// conversions (`new`, `as_str`, `Display`, `From<&str>`, `From<String>`).
macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true when the identifier is empty.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

string_identifier!(
    /// Identifier of an `InferenceRequest`, caller-supplied and unique.
    RequestId
);
string_identifier!(
    /// Identifier of a single kernel execution (the lifetime of one request
    /// inside the pipeline).
    ExecutionId
);
string_identifier!(
    /// Identifier of a model manifest / model artifact.
    ModelId
);
string_identifier!(
    /// Identifier of a tenant scope.
    TenantId
);
string_identifier!(
    /// Identifier of a runner implementation (a provider binding instance).
    RunnerId
);
string_identifier!(
    /// Identifier of a warm session inside a runner's session pool.
    SessionId
);
string_identifier!(
    /// Identifier of a registered provider.
    ProviderId
);
string_identifier!(
    /// Caller-supplied correlation identifier threaded through logs and audit
    /// events.
    CorrelationId
);
