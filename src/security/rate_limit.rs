//! Fixed-window rate limiting.
//!
//! Windows align to the epoch: `window_start = now / window * window`. Each
//! (tier, identifier, window_start) gets its own counter whose TTL equals the
//! window length, so old windows expire on their own and need no cleanup.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::config::{RateLimitTiers, TierName, TierPolicy};
use crate::store::{keys, StoreError, TimedStore};

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub success: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, at least one.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        (self.reset_at - now).num_seconds().max(1) as u64
    }
}

pub struct RateLimiter {
    store: TimedStore,
    tiers: RateLimitTiers,
}

impl RateLimiter {
    pub fn new(store: TimedStore, tiers: RateLimitTiers) -> Self {
        Self { store, tiers }
    }

    pub fn policy(&self, tier: TierName) -> &TierPolicy {
        self.tiers.get(tier)
    }

    /// Count one request from `identifier` against `tier`.
    pub async fn limit(&self, identifier: &str, tier: TierName) -> Result<RateLimitDecision, StoreError> {
        self.limit_at(identifier, tier, Utc::now()).await
    }

    pub async fn limit_at(
        &self,
        identifier: &str,
        tier: TierName,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, StoreError> {
        let policy = self.tiers.get(tier);
        let window_start = window_start(now, policy.window_secs);
        let reset_secs = window_start.saturating_add(policy.window_secs);

        let count = self
            .store
            .incr(
                &keys::rate_limit(tier, identifier, window_start),
                Duration::from_secs(policy.window_secs),
            )
            .await?;

        let decision = RateLimitDecision {
            success: count <= policy.requests,
            limit: policy.requests,
            remaining: policy.requests.saturating_sub(count),
            reset_at: Utc
                .timestamp_opt(reset_secs as i64, 0)
                .single()
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        if !decision.success {
            tracing::debug!(identifier, %tier, count, limit = policy.requests, "Rate limit exceeded");
        }
        Ok(decision)
    }
}

/// Start of the epoch-aligned window containing `now`.
pub fn window_start(now: DateTime<Utc>, window_secs: u64) -> u64 {
    let secs = now.timestamp().max(0) as u64;
    let window = window_secs.max(1);
    secs / window * window
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CounterStore, MemoryStore};
    use std::sync::Arc;

    fn limiter(store: &MemoryStore) -> RateLimiter {
        RateLimiter::new(
            TimedStore::new(Arc::new(store.clone()), Duration::from_millis(100)),
            RateLimitTiers::default(),
        )
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_exactly_limit_requests_succeed() {
        let store = MemoryStore::new();
        let limiter = limiter(&store);
        let now = at(1_700_000_040);

        for i in 1..=100 {
            let decision = limiter.limit_at("1.2.3.4", TierName::Api, now).await.unwrap();
            assert!(decision.success, "request {} should pass", i);
            assert_eq!(decision.remaining, 100 - i);
        }

        let denied = limiter.limit_at("1.2.3.4", TierName::Api, now).await.unwrap();
        assert!(!denied.success);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.limit, 100);
        assert_eq!(denied.reset_at, at(1_700_000_040 + 60 - 1_700_000_040 % 60));
    }

    #[tokio::test]
    async fn test_window_rollover_resets_count() {
        let store = MemoryStore::new();
        let limiter = limiter(&store);
        let start = window_start(at(1_700_000_000), 900) as i64;

        for _ in 0..5 {
            assert!(limiter.limit_at("ip", TierName::Contact, at(start)).await.unwrap().success);
        }
        assert!(!limiter.limit_at("ip", TierName::Contact, at(start + 899)).await.unwrap().success);

        let next = limiter.limit_at("ip", TierName::Contact, at(start + 900)).await.unwrap();
        assert!(next.success);
        assert_eq!(next.remaining, 4);
        let key = keys::rate_limit(TierName::Contact, "ip", (start + 900) as u64);
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_tiers_and_identifiers_are_independent() {
        let store = MemoryStore::new();
        let limiter = limiter(&store);
        let now = at(1_700_000_000);

        for _ in 0..5 {
            limiter.limit_at("a", TierName::Contact, now).await.unwrap();
        }
        assert!(!limiter.limit_at("a", TierName::Contact, now).await.unwrap().success);
        assert!(limiter.limit_at("a", TierName::Api, now).await.unwrap().success);
        assert!(limiter.limit_at("b", TierName::Contact, now).await.unwrap().success);
    }

    #[test]
    fn test_window_alignment() {
        assert_eq!(window_start(at(125), 60), 120);
        assert_eq!(window_start(at(120), 60), 120);
        assert_eq!(window_start(at(-5), 60), 0);
    }

    #[test]
    fn test_retry_after() {
        let decision = RateLimitDecision {
            success: false,
            limit: 1,
            remaining: 0,
            reset_at: at(160),
        };
        assert_eq!(decision.retry_after_secs(at(130)), 30);
        assert_eq!(decision.retry_after_secs(at(170)), 1);
    }
}
