// kernel-core/src/time.rs
// ============================================================================
// Module: Kernel Time Model
// Description: Canonical timestamp representation and an injectable clock.
// Purpose: Keep wall-clock reads behind a seam so tests can fix time.
// Dependencies: time, serde
// ============================================================================

//! ## Overview
//! The kernel never calls `OffsetDateTime::now_utc()` directly from business
//! logic; every component that needs "now" takes a `&dyn Clock`. This keeps
//! execution-token timestamps, session idle/age accounting, and circuit
//! breaker open-duration checks deterministic under test.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Wall-clock timestamp used throughout the kernel's data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(#[serde(with = "timestamp_rfc3339")] OffsetDateTime);

impl Timestamp {
    /// Wraps a raw `OffsetDateTime`.
    #[must_use]
    pub const fn from_offset(value: OffsetDateTime) -> Self {
        Self(value)
    }

    /// Returns the underlying `OffsetDateTime`.
    #[must_use]
    pub const fn as_offset(&self) -> OffsetDateTime {
        self.0
    }

    /// Returns the duration elapsed from `self` to `other`, or zero when
    /// `other` precedes `self`.
    #[must_use]
    pub fn elapsed_until(&self, other: Timestamp) -> Duration {
        let delta = other.0 - self.0;
        delta.try_into().unwrap_or(Duration::ZERO)
    }

    /// Renders the timestamp as an RFC 3339 string.
    ///
    /// # Errors
    ///
    /// Returns a formatting error when the underlying value cannot be
    /// rendered, which cannot happen for values produced by this module.
    pub fn to_rfc3339(&self) -> Result<String, time::error::Format> {
        self.0.format(&Rfc3339)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Ok(text) => f.write_str(&text),
            Err(_) => fmt::Debug::fmt(&self.0, f),
        }
    }
}

/// Serializes/deserializes `OffsetDateTime` as an RFC 3339 string.
mod timestamp_rfc3339 {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    /// Serializes the timestamp as RFC 3339.
    ///
    /// # Errors
    ///
    /// Returns a serializer error when formatting fails.
    pub fn serialize<S: Serializer>(value: &OffsetDateTime, ser: S) -> Result<S::Ok, S::Error> {
        let text = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        ser.serialize_str(&text)
    }

    /// Deserializes an RFC 3339 timestamp.
    ///
    /// # Errors
    ///
    /// Returns a deserializer error when the string is not valid RFC 3339.
    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<OffsetDateTime, D::Error> {
        let text = String::deserialize(de)?;
        OffsetDateTime::parse(&text, &Rfc3339).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Source of wall-clock time for kernel components.
pub trait Clock: Send + Sync {
    /// Returns the current timestamp.
    fn now(&self) -> Timestamp;
}

/// Clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_offset(OffsetDateTime::now_utc())
    }
}

/// Clock that always returns a fixed timestamp, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}
