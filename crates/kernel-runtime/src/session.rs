// kernel-runtime/src/session.rs
// ============================================================================
// Module: Session Pool
// Description: Per-(model, tenant) bounded session pool with idle/age
// eviction and wait-with-timeout acquisition.
// Purpose: Let a runner reuse warm sessions across requests instead of
// minting one per call.
// Dependencies: tokio::sync::{Mutex, Notify}, kernel-core, crate::runner
// ============================================================================

//! ## Overview
//! [`SessionManager`] owns one [`SessionPool`] per `(ModelId, TenantId)` pair
//! within a single [`crate::runner::Runner`]. Acquire semantics follow the
//! warm-pool contract exactly: poll the available queue for a non-expired
//! session, else mint a new one below `max_concurrent`, else wait up to the
//! caller's timeout for a release. Release offers the session back to the
//! queue unless it is expired or reuse is disabled, in which case the
//! runner closes it.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use kernel_core::ModelId;
use kernel_core::TenantContext;
use kernel_core::TenantId;
use kernel_core::Timestamp;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::sync::Notify;

use crate::runner::Runner;

/// A warm session minted by a [`Runner`].
#[derive(Debug, Clone)]
pub struct Session {
    /// Identifier of this session within its pool.
    pub session_id: kernel_core::SessionId,
    /// Timestamp the session was created.
    pub created_at: Timestamp,
}

/// Bounds and policy for a single [`SessionPool`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionPoolConfig {
    /// Maximum sessions concurrently checked out.
    pub max_concurrent: usize,
    /// A returned session idle longer than this is closed instead of reused.
    pub idle_timeout: Duration,
    /// A session older than this (since creation) is closed instead of
    /// reused.
    pub max_age: Duration,
    /// Whether released sessions are offered back to the queue at all.
    pub reuse: bool,
    /// Number of sessions to keep pre-warmed; `0` disables pre-warming.
    pub warm_pool_count: usize,
}

impl Default for SessionPoolConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            idle_timeout: Duration::from_secs(5 * 60),
            max_age: Duration::from_secs(60 * 60),
            reuse: true,
            warm_pool_count: 0,
        }
    }
}

/// Errors raised while acquiring a session from a [`SessionPool`].
#[derive(Debug, Error, Clone)]
pub enum SessionPoolError {
    /// No session became available within the caller's wait timeout.
    #[error("timed out waiting for an available session")]
    Timeout,
    /// The pool needed to mint a new session and the runner failed.
    #[error("session creation failed: {0}")]
    CreationFailed(String),
}

struct PooledSession {
    session: Session,
    last_used_at: Timestamp,
}

struct PoolState {
    available: VecDeque<PooledSession>,
    active_count: usize,
}

/// Bounded pool of warm sessions for one `(model, tenant)` pair.
pub struct SessionPool {
    config: SessionPoolConfig,
    runner: Arc<dyn Runner>,
    tenant: TenantContext,
    model_id: ModelId,
    state: Mutex<PoolState>,
    notify: Notify,
}

impl SessionPool {
    /// Builds an empty pool for `tenant`/`model_id` against `runner`.
    #[must_use]
    pub fn new(runner: Arc<dyn Runner>, tenant: TenantContext, model_id: ModelId, config: SessionPoolConfig) -> Self {
        Self {
            config,
            runner,
            tenant,
            model_id,
            state: Mutex::new(PoolState {
                available: VecDeque::new(),
                active_count: 0,
            }),
            notify: Notify::new(),
        }
    }

    /// Model this pool serves sessions for.
    #[must_use]
    pub const fn model_id(&self) -> &ModelId {
        &self.model_id
    }

    fn is_expired(&self, pooled: &PooledSession, now: Timestamp) -> bool {
        pooled.last_used_at.elapsed_until(now) > self.config.idle_timeout
            || pooled.session.created_at.elapsed_until(now) > self.config.max_age
    }

    /// Acquires a session, waiting up to `wait_timeout` (measured against
    /// the real clock, independent of `now`) if none is immediately
    /// available and the pool is at capacity.
    ///
    /// `now` is used only for idle/age expiry checks, so tests can fix it
    /// independently of the real wait-timeout clock.
    ///
    /// # Errors
    ///
    /// Returns [`SessionPoolError::Timeout`] if no session becomes available
    /// in time, or [`SessionPoolError::CreationFailed`] if the pool must
    /// mint a new session and the runner fails to do so.
    pub async fn acquire(&self, now: Timestamp, wait_timeout: Duration) -> Result<Session, SessionPoolError> {
        let deadline = tokio::time::Instant::now() + wait_timeout;
        loop {
            {
                let mut state = self.state.lock().await;
                while let Some(pooled) = state.available.pop_front() {
                    if self.is_expired(&pooled, now) {
                        let _ = self.runner.close_session(pooled.session).await;
                        continue;
                    }
                    return Ok(pooled.session);
                }
                if state.active_count < self.config.max_concurrent {
                    state.active_count += 1;
                    drop(state);
                    return match self.runner.create_session(&self.tenant).await {
                        Ok(session) => Ok(session),
                        Err(error) => {
                            let mut state = self.state.lock().await;
                            state.active_count = state.active_count.saturating_sub(1);
                            Err(SessionPoolError::CreationFailed(error.to_string()))
                        }
                    };
                }
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(SessionPoolError::Timeout);
            }
            if tokio::time::timeout(remaining, self.notify.notified()).await.is_err() {
                return Err(SessionPoolError::Timeout);
            }
        }
    }

    /// Releases a previously acquired session back to the pool.
    ///
    /// Closes the session instead of returning it to the queue when it is
    /// expired or `reuse` is disabled.
    pub async fn release(&self, session: Session, now: Timestamp) {
        let expired =
            session.created_at.elapsed_until(now) > self.config.max_age || !self.config.reuse;
        let mut state = self.state.lock().await;
        state.active_count = state.active_count.saturating_sub(1);
        if expired {
            drop(state);
            let _ = self.runner.close_session(session).await;
        } else {
            state.available.push_back(PooledSession {
                session,
                last_used_at: now,
            });
        }
        self.notify.notify_one();
    }

    /// Closes every idle- or age-expired session currently queued.
    pub async fn cleanup(&self, now: Timestamp) {
        let expired = {
            let mut state = self.state.lock().await;
            let mut keep = VecDeque::with_capacity(state.available.len());
            let mut expired = Vec::new();
            while let Some(pooled) = state.available.pop_front() {
                if self.is_expired(&pooled, now) {
                    expired.push(pooled.session);
                } else {
                    keep.push_back(pooled);
                }
            }
            state.available = keep;
            expired
        };
        for session in expired {
            let _ = self.runner.close_session(session).await;
        }
    }

    /// Current number of sessions checked out (not counting queued ones).
    pub async fn active_count(&self) -> usize {
        self.state.lock().await.active_count
    }

    /// Current number of sessions sitting idle in the queue.
    pub async fn available_count(&self) -> usize {
        self.state.lock().await.available.len()
    }
}

/// Owns one [`SessionPool`] per `(ModelId, TenantId)` pair for a single
/// runner.
pub struct SessionManager {
    runner: Arc<dyn Runner>,
    default_config: SessionPoolConfig,
    pools: Mutex<HashMap<(ModelId, TenantId), Arc<SessionPool>>>,
}

impl SessionManager {
    /// Builds a manager over `runner` using `default_config` for every pool
    /// it creates.
    #[must_use]
    pub fn new(runner: Arc<dyn Runner>, default_config: SessionPoolConfig) -> Self {
        Self {
            runner,
            default_config,
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the pool for `(model_id, tenant)`, creating it on first
    /// access.
    pub async fn pool_for(&self, model_id: &ModelId, tenant: &TenantContext) -> Arc<SessionPool> {
        let key = (model_id.clone(), tenant.tenant_id.clone());
        let mut pools = self.pools.lock().await;
        Arc::clone(pools.entry(key).or_insert_with(|| {
            Arc::new(SessionPool::new(
                Arc::clone(&self.runner),
                tenant.clone(),
                model_id.clone(),
                self.default_config,
            ))
        }))
    }

    /// Acquires a session from the pool for `(model_id, tenant)`.
    ///
    /// # Errors
    ///
    /// See [`SessionPool::acquire`].
    pub async fn acquire(
        &self,
        model_id: &ModelId,
        tenant: &TenantContext,
        now: Timestamp,
        wait_timeout: Duration,
    ) -> Result<Session, SessionPoolError> {
        self.pool_for(model_id, tenant).await.acquire(now, wait_timeout).await
    }

    /// Releases a session back to the pool for `(model_id, tenant)`.
    pub async fn release(&self, model_id: &ModelId, tenant: &TenantContext, session: Session, now: Timestamp) {
        self.pool_for(model_id, tenant).await.release(session, now).await;
    }

    /// Runs [`SessionPool::cleanup`] against every pool this manager owns.
    pub async fn cleanup_all(&self, now: Timestamp) {
        let pools: Vec<Arc<SessionPool>> = self.pools.lock().await.values().cloned().collect();
        for pool in pools {
            pool.cleanup(now).await;
        }
    }
}
