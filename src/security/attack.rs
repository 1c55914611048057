//! Attack detection and the blocklist.
//!
//! # Responsibilities
//! - Scan decoded path, query string and body snippet against signatures
//! - Count requests per identifier per minute and flag rate breaches
//! - Read, write, extend and remove block entries
//!
//! # Design Decisions
//! - Signatures are scanned before touching the store, so a store outage
//!   never hides a signature match
//! - Blocks are keyed purely by identifier
//! - A block only ever moves later when re-applied

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AttackDetectionConfig;
use crate::security::patterns::SignatureSet;
use crate::store::{keys, StoreError, TimedStore};

/// Request material inspected for signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContent<'a> {
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub body: Option<&'a [u8]>,
}

/// Why a request was classified as an attack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttackVerdict {
    Signature {
        name: String,
        location: &'static str,
    },
    RateBreach {
        count: u64,
        limit: u64,
    },
}

impl AttackVerdict {
    /// Short label for metrics.
    pub fn label(&self) -> &str {
        match self {
            AttackVerdict::Signature { name, .. } => name,
            AttackVerdict::RateBreach { .. } => "request_rate",
        }
    }
}

impl fmt::Display for AttackVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttackVerdict::Signature { name, location } => {
                write!(f, "{} signature in {}", name, location)
            }
            AttackVerdict::RateBreach { count, limit } => {
                write!(f, "{} requests/minute exceeds {}", count, limit)
            }
        }
    }
}

/// A live or expired block on an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEntry {
    pub identifier: String,
    pub blocked_until: DateTime<Utc>,
    pub reason: String,
}

impl BlockEntry {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until > now
    }

    /// Time left on the block, zero once expired.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.blocked_until - now).to_std().unwrap_or_default()
    }
}

pub struct AttackDetector {
    store: TimedStore,
    signatures: SignatureSet,
    config: AttackDetectionConfig,
}

impl AttackDetector {
    pub fn new(store: TimedStore, config: AttackDetectionConfig) -> Self {
        Self::with_signatures(store, config, SignatureSet::builtin())
    }

    pub fn with_signatures(
        store: TimedStore,
        config: AttackDetectionConfig,
        signatures: SignatureSet,
    ) -> Self {
        Self {
            store,
            signatures,
            config,
        }
    }

    pub fn config(&self) -> &AttackDetectionConfig {
        &self.config
    }

    pub fn signatures(&self) -> &SignatureSet {
        &self.signatures
    }

    /// True iff a live block exists for `identifier`.
    pub async fn is_blocked(&self, identifier: &str) -> Result<bool, StoreError> {
        Ok(self.block_entry(identifier).await?.is_some())
    }

    /// The live block for `identifier`, if any.
    pub async fn block_entry(&self, identifier: &str) -> Result<Option<BlockEntry>, StoreError> {
        self.block_entry_at(identifier, Utc::now()).await
    }

    pub async fn block_entry_at(
        &self,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<BlockEntry>, StoreError> {
        let Some(raw) = self.store.get(&keys::block(identifier)).await? else {
            return Ok(None);
        };
        let entry: BlockEntry = serde_json::from_str(&raw)?;
        Ok(entry.is_active_at(now).then_some(entry))
    }

    /// True when the request looks like an attack.
    pub async fn check_for_attack(
        &self,
        identifier: &str,
        content: &RequestContent<'_>,
    ) -> Result<bool, StoreError> {
        Ok(self.detect(identifier, content).await?.is_some())
    }

    /// Classify a request, naming the first signature matched or the rate breach.
    pub async fn detect(
        &self,
        identifier: &str,
        content: &RequestContent<'_>,
    ) -> Result<Option<AttackVerdict>, StoreError> {
        self.detect_at(identifier, content, Utc::now()).await
    }

    pub async fn detect_at(
        &self,
        identifier: &str,
        content: &RequestContent<'_>,
        now: DateTime<Utc>,
    ) -> Result<Option<AttackVerdict>, StoreError> {
        if let Some(verdict) = self.scan(content) {
            return Ok(Some(verdict));
        }

        let minute_start = now.timestamp().max(0) as u64 / 60 * 60;
        let count = self
            .store
            .incr(&keys::attack_rate(identifier, minute_start), Duration::from_secs(60))
            .await?;

        let limit = self.config.requests_per_minute;
        Ok((count > limit).then_some(AttackVerdict::RateBreach { count, limit }))
    }

    /// Signature scan only. Never touches the store.
    pub fn scan(&self, content: &RequestContent<'_>) -> Option<AttackVerdict> {
        let path = decode(content.path);
        if let Some(name) = self.signatures.first_match(&path) {
            return Some(signature(name, "path"));
        }

        if let Some(query) = content.query.filter(|q| !q.is_empty()) {
            let query = query.replace('+', " ");
            let query = decode(&query);
            if let Some(name) = self.signatures.first_match(&query) {
                return Some(signature(name, "query"));
            }
        }

        if let Some(body) = content.body.filter(|b| !b.is_empty()) {
            let snippet = &body[..body.len().min(self.config.max_scan_bytes)];
            let text = String::from_utf8_lossy(snippet);
            if let Some(name) = self.signatures.first_match(&text) {
                return Some(signature(name, "body"));
            }
            let decoded = decode(&text);
            if decoded != text {
                if let Some(name) = self.signatures.first_match(&decoded) {
                    return Some(signature(name, "body"));
                }
            }
        }

        None
    }

    /// Block `identifier` for `duration`, extending any later existing block.
    pub async fn block_identifier(
        &self,
        identifier: &str,
        duration: Duration,
        reason: &str,
    ) -> Result<BlockEntry, StoreError> {
        let now = Utc::now();
        let requested = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let blocked_until = match self.block_entry_at(identifier, now).await? {
            Some(existing) if existing.blocked_until > requested => existing.blocked_until,
            _ => requested,
        };

        let entry = BlockEntry {
            identifier: identifier.to_string(),
            blocked_until,
            reason: reason.to_string(),
        };
        let ttl = entry.remaining_at(now).max(Duration::from_secs(1));
        self.store
            .set_ex(&keys::block(identifier), &serde_json::to_string(&entry)?, ttl)
            .await?;

        tracing::info!(
            identifier,
            reason,
            blocked_until = %entry.blocked_until,
            "Identifier blocked"
        );
        Ok(entry)
    }

    /// Lift a block. Returns whether one was present.
    pub async fn unblock(&self, identifier: &str) -> Result<bool, StoreError> {
        self.store.del(&keys::block(identifier)).await
    }
}

fn signature(name: &str, location: &'static str) -> AttackVerdict {
    AttackVerdict::Signature {
        name: name.to_string(),
        location,
    }
}

fn decode(input: &str) -> Cow<'_, str> {
    urlencoding::decode(input).unwrap_or(Cow::Borrowed(input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn detector(requests_per_minute: u64) -> AttackDetector {
        let store = TimedStore::new(Arc::new(MemoryStore::new()), Duration::from_millis(100));
        AttackDetector::new(
            store,
            AttackDetectionConfig {
                requests_per_minute,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_body_signature_detected() {
        let detector = detector(300);
        let body = br#"{"message":"' OR 1=1--"}"#;
        let content = RequestContent {
            path: "/api/contact",
            query: None,
            body: Some(body),
        };

        let verdict = detector.detect("1.2.3.4", &content).await.unwrap();
        assert_eq!(
            verdict,
            Some(AttackVerdict::Signature {
                name: "sql_injection".into(),
                location: "body",
            })
        );
        assert!(detector.check_for_attack("1.2.3.4", &content).await.unwrap());
    }

    #[tokio::test]
    async fn test_encoded_query_is_decoded() {
        let detector = detector(300);
        let content = RequestContent {
            path: "/search",
            query: Some("q=%3Cscript%3Ealert(1)%3C%2Fscript%3E"),
            body: None,
        };
        assert_eq!(detector.scan(&content).map(|v| v.label().to_string()), Some("xss".into()));
    }

    #[tokio::test]
    async fn test_clean_request_passes() {
        let detector = detector(300);
        let content = RequestContent {
            path: "/portfolio",
            query: Some("page=2"),
            body: None,
        };
        assert!(!detector.check_for_attack("1.2.3.4", &content).await.unwrap());
    }

    #[tokio::test]
    async fn test_rate_breach() {
        let detector = detector(3);
        let content = RequestContent {
            path: "/",
            ..Default::default()
        };
        let now = Utc::now();
        for _ in 0..3 {
            assert_eq!(detector.detect_at("5.6.7.8", &content, now).await.unwrap(), None);
        }
        assert_eq!(
            detector.detect_at("5.6.7.8", &content, now).await.unwrap(),
            Some(AttackVerdict::RateBreach { count: 4, limit: 3 })
        );
        // Other identifiers are unaffected.
        assert_eq!(detector.detect_at("9.9.9.9", &content, now).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_scan_respects_body_limit() {
        let store = TimedStore::new(Arc::new(MemoryStore::new()), Duration::from_millis(100));
        let detector = AttackDetector::new(
            store,
            AttackDetectionConfig {
                max_scan_bytes: 16,
                ..Default::default()
            },
        );
        let mut body = vec![b'a'; 64];
        body.extend_from_slice(b"<script>");
        let content = RequestContent {
            path: "/",
            query: None,
            body: Some(&body),
        };
        assert_eq!(detector.scan(&content), None);
    }

    #[tokio::test]
    async fn test_block_lifecycle() {
        let detector = detector(300);
        assert!(!detector.is_blocked("1.2.3.4").await.unwrap());

        let entry = detector
            .block_identifier("1.2.3.4", Duration::from_secs(600), "test")
            .await
            .unwrap();
        assert!(detector.is_blocked("1.2.3.4").await.unwrap());
        assert_eq!(entry.reason, "test");

        // A shorter block never shortens an existing one.
        let extended = detector
            .block_identifier("1.2.3.4", Duration::from_secs(5), "again")
            .await
            .unwrap();
        assert_eq!(extended.blocked_until, entry.blocked_until);

        assert!(detector.unblock("1.2.3.4").await.unwrap());
        assert!(!detector.is_blocked("1.2.3.4").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_entry_is_not_blocking() {
        let detector = detector(300);
        let entry = detector
            .block_identifier("1.2.3.4", Duration::from_secs(60), "test")
            .await
            .unwrap();
        let later = entry.blocked_until + chrono::Duration::seconds(1);
        assert_eq!(detector.block_entry_at("1.2.3.4", later).await.unwrap(), None);
        assert_eq!(entry.remaining_at(later), Duration::ZERO);
    }
}
