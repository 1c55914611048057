//! In-process counter store.
//!
//! Backed by a `DashMap`; each key carries an expiry deadline. Suitable for a
//! single guard instance. Several instances behind a load balancer need a
//! shared backend implementing [`CounterStore`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{CounterStore, StoreError};

#[derive(Debug, Clone)]
enum SlotValue {
    Counter(u64),
    Text(String),
}

#[derive(Debug, Clone)]
struct Slot {
    value: SlotValue,
    expires_at: Instant,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// A thread-safe key-value store with per-key TTL.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, Slot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held, expired or not.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop expired keys. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, slot| !slot.is_expired(now));
        before.saturating_sub(self.inner.len())
    }

    /// Sweep expired keys every `interval` until shutdown.
    pub fn spawn_sweeper(
        &self,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, remaining = store.len(), "Swept expired store keys");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Store sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn incr(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        let now = Instant::now();
        let fresh = || Slot {
            value: SlotValue::Counter(0),
            expires_at: now + ttl,
        };

        let mut slot = self.inner.entry(key.to_string()).or_insert_with(fresh);
        if slot.is_expired(now) {
            *slot = fresh();
        }

        match &mut slot.value {
            SlotValue::Counter(count) => {
                *count += 1;
                Ok(*count)
            }
            SlotValue::Text(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let value = self.inner.get(key).and_then(|slot| {
            if slot.is_expired(now) {
                return None;
            }
            Some(match &slot.value {
                SlotValue::Counter(count) => count.to_string(),
                SlotValue::Text(text) => text.clone(),
            })
        });
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.inner.insert(
            key.to_string(),
            Slot {
                value: SlotValue::Text(value.to_string()),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        Ok(self
            .inner
            .remove(key)
            .is_some_and(|(_, slot)| !slot.is_expired(now)))
    }
}
