//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the security guard.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Site the guard forwards admitted requests to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting tiers and route mapping.
    pub rate_limit: RateLimitConfig,

    /// Attack detection thresholds.
    pub attack_detection: AttackDetectionConfig,

    /// CORS allowlist for API routes.
    pub cors: CorsConfig,

    /// Content Security Policy sources.
    pub csp: CspConfig,

    /// Pipeline mode and request handling limits.
    pub security: SecurityConfig,

    /// Counter store settings.
    pub store: StoreConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream site configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000"). `None` disables forwarding.
    pub address: Option<String>,

    /// Upstream response timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: None,
            timeout_secs: 15,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Named rate limit tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TierName {
    Contact,
    Api,
    Analytics,
    Admin,
}

impl TierName {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierName::Contact => "contact",
            TierName::Api => "api",
            TierName::Analytics => "analytics",
            TierName::Admin => "admin",
        }
    }
}

impl fmt::Display for TierName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy for a single tier: `requests` per `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TierPolicy {
    /// Requests admitted per window.
    pub requests: u64,

    /// Window length in seconds.
    pub window_secs: u64,

    /// How long an identifier is blocked after exceeding the tier.
    pub block_duration_secs: u64,
}

impl TierPolicy {
    pub const fn new(requests: u64, window_secs: u64, block_duration_secs: u64) -> Self {
        Self {
            requests,
            window_secs,
            block_duration_secs,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn block_duration(&self) -> Duration {
        Duration::from_secs(self.block_duration_secs)
    }
}

/// The four tiers. Immutable once loaded.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitTiers {
    pub contact: TierPolicy,
    pub api: TierPolicy,
    pub analytics: TierPolicy,
    pub admin: TierPolicy,
}

impl RateLimitTiers {
    pub fn get(&self, tier: TierName) -> &TierPolicy {
        match tier {
            TierName::Contact => &self.contact,
            TierName::Api => &self.api,
            TierName::Analytics => &self.analytics,
            TierName::Admin => &self.admin,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (TierName, &TierPolicy)> {
        [
            (TierName::Contact, &self.contact),
            (TierName::Api, &self.api),
            (TierName::Analytics, &self.analytics),
            (TierName::Admin, &self.admin),
        ]
        .into_iter()
    }
}

impl Default for RateLimitTiers {
    fn default() -> Self {
        Self {
            contact: TierPolicy::new(5, 900, 3600),
            api: TierPolicy::new(100, 60, 300),
            analytics: TierPolicy::new(200, 60, 60),
            admin: TierPolicy::new(30, 60, 900),
        }
    }
}

/// Maps a path prefix to a tier. Longest prefix wins.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TierRoute {
    pub path_prefix: String,
    pub tier: TierName,
}

impl TierRoute {
    pub fn new(path_prefix: impl Into<String>, tier: TierName) -> Self {
        Self {
            path_prefix: path_prefix.into(),
            tier,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Turn a rate limit denial into a block for the tier's block duration.
    pub escalate_to_block: bool,

    pub tiers: RateLimitTiers,

    /// Path prefixes subject to rate limiting. Unmatched paths are not limited.
    pub routes: Vec<TierRoute>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            escalate_to_block: true,
            tiers: RateLimitTiers::default(),
            routes: vec![
                TierRoute::new("/api/contact", TierName::Contact),
                TierRoute::new("/api/analytics", TierName::Analytics),
                TierRoute::new("/api/admin", TierName::Admin),
                TierRoute::new("/admin", TierName::Admin),
                TierRoute::new("/api", TierName::Api),
            ],
        }
    }
}

/// Attack detection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AttackDetectionConfig {
    /// Enable signature scanning and request-rate detection.
    pub enabled: bool,

    /// Requests per minute from one identifier treated as an attack.
    pub requests_per_minute: u64,

    /// Block duration applied when an attack is detected.
    pub block_duration_secs: u64,

    /// Bytes of the request body inspected for signatures.
    pub max_scan_bytes: usize,
}

impl AttackDetectionConfig {
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs(self.block_duration_secs)
    }
}

impl Default for AttackDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 300,
            block_duration_secs: 3600,
            max_scan_bytes: 8 * 1024,
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed to call API routes. Matched exactly.
    pub allowed_origins: Vec<String>,

    pub allowed_methods: String,

    pub allowed_headers: String,

    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: "GET, POST, PUT, DELETE, OPTIONS".to_string(),
            allowed_headers: "Content-Type, Authorization, X-Requested-With".to_string(),
            max_age_secs: 86400,
        }
    }
}

/// Content Security Policy sources.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CspConfig {
    /// Where browsers send violation reports.
    pub report_uri: Option<String>,

    /// Path of the built-in violation report endpoint.
    pub report_path: String,

    /// Identity provider script, connect and frame origins.
    pub identity_provider_domains: Vec<String>,

    /// Identity provider image origins.
    pub image_domains: Vec<String>,

    /// Analytics beacon origins allowed in `connect-src`.
    pub analytics_domains: Vec<String>,
}

impl Default for CspConfig {
    fn default() -> Self {
        Self {
            report_uri: None,
            report_path: "/api/csp-report".to_string(),
            identity_provider_domains: vec![
                "https://*.clerk.accounts.dev".to_string(),
                "https://clerk.com".to_string(),
                "https://*.clerk.com".to_string(),
                "https://challenges.cloudflare.com".to_string(),
            ],
            image_domains: vec![
                "https://img.clerk.com".to_string(),
                "https://images.clerk.dev".to_string(),
            ],
            analytics_domains: vec![
                "https://vitals.vercel-insights.com".to_string(),
                "https://va.vercel-scripts.com".to_string(),
            ],
        }
    }
}

/// Which middleware pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MiddlewareMode {
    /// Headers, nonce, CORS and request id only.
    Basic,
    /// Full pipeline: blocklist, attack scan and rate limiting as well.
    #[default]
    Secure,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub mode: MiddlewareMode,

    pub environment: Environment,

    /// Trust client IP headers set by a fronting proxy.
    pub trust_proxy: bool,

    /// Maximum body size in bytes.
    pub max_body_size: usize,

    /// Paths under this prefix are API routes.
    pub api_prefix: String,

    /// Path prefixes that skip the pipeline entirely.
    pub bypass_prefixes: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            mode: MiddlewareMode::Secure,
            environment: Environment::Production,
            trust_proxy: false,
            max_body_size: 2 * 1024 * 1024, // 2MB
            api_prefix: "/api".to_string(),
            bypass_prefixes: vec![
                "/_next/static".to_string(),
                "/_next/image".to_string(),
                "/favicon.ico".to_string(),
                "/healthz".to_string(),
            ],
        }
    }
}

/// Counter store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Deadline for a single store round-trip. Exceeding it fails open.
    pub timeout_ms: u64,

    /// How often the in-process store drops expired keys.
    pub sweep_interval_secs: u64,
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 50,
            sweep_interval_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: GuardConfig = toml::from_str(
            r#"
            [rate_limit.tiers.api]
            requests = 10
            window_secs = 1
            block_duration_secs = 5

            [security]
            mode = "basic"
            "#,
        )
        .unwrap();

        assert_eq!(config.rate_limit.tiers.api, TierPolicy::new(10, 1, 5));
        assert_eq!(config.rate_limit.tiers.contact, TierPolicy::new(5, 900, 3600));
        assert_eq!(config.security.mode, MiddlewareMode::Basic);
        assert_eq!(config.cors.max_age_secs, 86400);
        assert_eq!(config.rate_limit.routes.len(), 5);
    }

    #[test]
    fn test_tier_lookup() {
        let tiers = RateLimitTiers::default();
        assert_eq!(tiers.get(TierName::Api).requests, 100);
        assert_eq!(tiers.get(TierName::Api).window(), Duration::from_secs(60));
        assert_eq!(tiers.iter().count(), 4);
        assert_eq!(TierName::Analytics.to_string(), "analytics");
    }
}
