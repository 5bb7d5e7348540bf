// kernel-runtime/src/lib.rs
// ============================================================================
// Crate: kernel-runtime
// Description: Runner warm pool and per-runner session pooling.
// ============================================================================

//! Runner lifecycle and session pooling for local, native model runtimes.
//!
//! `kernel-runtime` owns the "keep a model loaded and ready" problem:
//! [`RunnerFactory`] caches initialized [`Runner`]s keyed on `(tenant,
//! model, runner)`, and [`SessionManager`] pools warm sessions within a
//! runner. It has no opinion about which native runtime backs a [`Runner`]
//! implementation (GGUF/ONNX/TensorRT bindings are out of scope); it only
//! provides the pooling and eviction machinery around the trait.

pub mod factory;
pub mod runner;
pub mod session;

pub use factory::RunnerBuilder;
pub use factory::RunnerFactory;
pub use factory::RunnerFactoryConfig;
pub use factory::RunnerKey;
pub use runner::Runner;
pub use runner::RunnerConfig;
pub use runner::RunnerError;
pub use session::Session;
pub use session::SessionManager;
pub use session::SessionPool;
pub use session::SessionPoolConfig;
pub use session::SessionPoolError;
