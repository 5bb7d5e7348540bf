// kernel-resilience/src/metrics.rs
// ============================================================================
// Module: Rate Limiter Metrics
// Description: Shared accepted/rejected counters exposed by both limiter
// implementations.
// Purpose: Give operators accepted/rejected totals, rejection rate, and
// utilization without depending on a specific metrics backend.
// Dependencies: std::sync::atomic
// ============================================================================

//! ## Overview
//! Both [`crate::token_bucket::TokenBucketLimiter`] and
//! [`crate::sliding_window::SlidingWindowLimiter`] embed a
//! [`RateLimiterCounters`] and expose a [`RateLimiterMetrics`] snapshot
//! through it — the resilience-layer instance of the same dependency-light
//! counter pattern `kernel_core::observability` uses for phase/provider
//! events.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Point-in-time snapshot of a rate limiter's accept/reject behavior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiterMetrics {
    /// Total permits accepted since construction.
    pub accepted: u64,
    /// Total permits rejected since construction.
    pub rejected: u64,
    /// `rejected / (accepted + rejected)`, or `0.0` when no calls were made.
    pub rejection_rate: f64,
    /// `current_count / capacity`, or `0.0` when capacity is zero.
    pub utilization: f64,
    /// Current in-window or in-bucket count (interpretation is
    /// limiter-specific: tokens consumed for a bucket, timestamps held for a
    /// window).
    pub current_count: u64,
}

/// Atomic accepted/rejected counters shared by both limiter implementations.
#[derive(Debug, Default)]
pub(crate) struct RateLimiterCounters {
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl RateLimiterCounters {
    pub(crate) fn record_accept(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reject(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, capacity: u64, current_count: u64) -> RateLimiterMetrics {
        let accepted = self.accepted.load(Ordering::Relaxed);
        let rejected = self.rejected.load(Ordering::Relaxed);
        let total = accepted + rejected;
        RateLimiterMetrics {
            accepted,
            rejected,
            rejection_rate: if total == 0 {
                0.0
            } else {
                rejected as f64 / total as f64
            },
            utilization: if capacity == 0 {
                0.0
            } else {
                current_count as f64 / capacity as f64
            },
            current_count,
        }
    }
}
