//! Route table lookup.
//!
//! # Responsibilities
//! - Decide whether a path bypasses the guard (static assets, health)
//! - Classify the path as an API route or a page route
//! - Map the path to its rate limit tier, if any
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) prefix scan (acceptable for typical route counts)

use crate::config::{RateLimitConfig, SecurityConfig, TierName};
use crate::routing::matcher::PathPrefixMatcher;

/// How the guard treats a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// JSON endpoints: hardening headers and CORS, no CSP.
    Api,
    /// Rendered pages: nonce and full CSP.
    Page,
}

impl RouteClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Api => "api",
            RouteClass::Page => "page",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    api: PathPrefixMatcher,
    bypass: Vec<PathPrefixMatcher>,
    /// Sorted by prefix length, longest first.
    tiers: Vec<(PathPrefixMatcher, TierName)>,
}

impl RouteTable {
    pub fn from_config(security: &SecurityConfig, rate_limit: &RateLimitConfig) -> Self {
        let mut tiers: Vec<_> = rate_limit
            .routes
            .iter()
            .map(|r| (PathPrefixMatcher::new(r.path_prefix.clone()), r.tier))
            .collect();
        tiers.sort_by(|a, b| b.0.prefix().len().cmp(&a.0.prefix().len()));

        Self {
            api: PathPrefixMatcher::new(security.api_prefix.clone()),
            bypass: security
                .bypass_prefixes
                .iter()
                .cloned()
                .map(PathPrefixMatcher::new)
                .collect(),
            tiers,
        }
    }

    pub fn is_bypassed(&self, path: &str) -> bool {
        self.bypass.iter().any(|m| m.matches(path))
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        if self.api.matches(path) {
            RouteClass::Api
        } else {
            RouteClass::Page
        }
    }

    pub fn tier_for(&self, path: &str) -> Option<TierName> {
        self.tiers
            .iter()
            .find(|(matcher, _)| matcher.matches(path))
            .map(|(_, tier)| *tier)
    }
}
