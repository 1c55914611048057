//! Counter store subsystem.
//!
//! # Data Flow
//! ```text
//! security (attack detector, rate limiter)
//!     → TimedStore (per-call deadline, error metrics)
//!     → dyn CounterStore (INCR / GET / SETEX / DEL with TTL)
//!     → memory.rs (in-process DashMap) or any shared backend
//! ```
//!
//! # Design Decisions
//! - Correctness of counters rests on the backend's atomic increment,
//!   never on in-process locking in the callers
//! - Every round-trip has a deadline; callers fail open on error
//! - Keys carry their own TTL so expired windows and blocks vanish

pub mod memory;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::observability::metrics;

pub use memory::MemoryStore;

/// Errors returned by a counter store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("store backend error: {0}")]
    Backend(String),

    /// The round-trip exceeded its deadline.
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    /// A key holds a value of the wrong kind for the operation.
    #[error("key '{0}' holds a non-counter value")]
    WrongType(String),

    /// A stored record could not be (de)serialized.
    #[error("store codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Key-value operations the guard needs from its shared store.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment `key`, creating it with `ttl` when absent or
    /// expired. Returns the value after the increment.
    async fn incr(&self, key: &str, ttl: Duration) -> Result<u64, StoreError>;

    /// Read a key. Counters are returned in decimal.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` under `key`, replacing any previous value and TTL.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Remove a key. Returns whether a live key was removed.
    async fn del(&self, key: &str) -> Result<bool, StoreError>;
}

/// Store handle that bounds every call by a deadline.
#[derive(Clone)]
pub struct TimedStore {
    inner: Arc<dyn CounterStore>,
    timeout: Duration,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn CounterStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn incr(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        self.run("incr", self.inner.incr(key, ttl)).await
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.run("get", self.inner.get(key)).await
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.run("set_ex", self.inner.set_ex(key, value, ttl)).await
    }

    pub async fn del(&self, key: &str) -> Result<bool, StoreError> {
        self.run("del", self.inner.del(key)).await
    }

    async fn run<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        };
        if let Err(e) = &result {
            metrics::record_store_error(op);
            tracing::debug!(op, error = %e, "Store operation failed");
        }
        result
    }
}

/// Store key layout.
pub mod keys {
    use crate::config::TierName;

    pub fn rate_limit(tier: TierName, identifier: &str, window_start: u64) -> String {
        format!("ratelimit:{}:{}:{}", tier, identifier, window_start)
    }

    pub fn attack_rate(identifier: &str, minute_start: u64) -> String {
        format!("attack:{}:{}", identifier, minute_start)
    }

    pub fn block(identifier: &str) -> String {
        format!("block:{}", identifier)
    }
}
