// kernel-resilience/src/lib.rs
// ============================================================================
// Crate: kernel-resilience
// Description: Rate limiting and circuit breaking primitives shared by
// kernel-broker and kernel-runtime.
// ============================================================================

//! Rate limiters and circuit breakers for guarding providers, runners, and
//! tenants against overload and cascading failure.
//!
//! All primitives here are synchronous and short-lock: they hold a
//! `std::sync::Mutex` only across a bounded, non-blocking critical section
//! and never across an `.await`. Callers in async contexts call them inline
//! without a `tokio::sync::Mutex`.

pub mod circuit_breaker;
pub mod metrics;
pub mod sliding_window;
pub mod token_bucket;

pub use circuit_breaker::BreakerState;
pub use circuit_breaker::CallOutcome;
pub use circuit_breaker::CircuitBreaker;
pub use circuit_breaker::CircuitBreakerConfig;
pub use circuit_breaker::CircuitBreakerOpenError;
pub use metrics::RateLimiterMetrics;
pub use sliding_window::SlidingWindowLimiter;
pub use token_bucket::TokenBucketLimiter;
