//! CORS decoration for API routes.

use std::collections::HashSet;

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE,
};
use axum::http::{HeaderMap, HeaderValue};

use crate::config::CorsConfig;
use crate::security::headers::HeaderError;

/// Exact-match origin allowlist with precomputed header values.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed_origins: HashSet<String>,
    methods: HeaderValue,
    headers: HeaderValue,
    max_age: HeaderValue,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Result<Self, HeaderError> {
        let value = |name: &'static str, raw: &str| {
            HeaderValue::from_str(raw).map_err(|source| HeaderError::InvalidValue { name, source })
        };

        Ok(Self {
            allowed_origins: config.allowed_origins.iter().cloned().collect(),
            methods: value("access-control-allow-methods", &config.allowed_methods)?,
            headers: value("access-control-allow-headers", &config.allowed_headers)?,
            max_age: HeaderValue::from(config.max_age_secs),
        })
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.contains(origin)
    }

    /// Add CORS headers iff `origin` is allowlisted. Returns whether it was.
    pub fn apply(&self, origin: Option<&HeaderValue>, headers: &mut HeaderMap) -> bool {
        let Some(origin) = origin else {
            return false;
        };
        let allowed = origin.to_str().map(|o| self.is_allowed(o)).unwrap_or(false);
        if !allowed {
            return false;
        }

        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, self.methods.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, self.headers.clone());
        headers.insert(ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CorsPolicy {
        CorsPolicy::from_config(&CorsConfig {
            allowed_origins: vec!["https://site.example".into()],
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_allowed_origin_gets_headers() {
        let mut headers = HeaderMap::new();
        let origin = HeaderValue::from_static("https://site.example");

        assert!(policy().apply(Some(&origin), &mut headers));
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "https://site.example");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "GET, POST, PUT, DELETE, OPTIONS");
        assert_eq!(
            headers[ACCESS_CONTROL_ALLOW_HEADERS],
            "Content-Type, Authorization, X-Requested-With"
        );
        assert_eq!(headers[ACCESS_CONTROL_MAX_AGE], "86400");
    }

    #[test]
    fn test_match_is_exact() {
        for origin in [
            "https://site.example/",
            "http://site.example",
            "https://SITE.example",
            "https://site.example.evil.com",
        ] {
            let mut headers = HeaderMap::new();
            let value = HeaderValue::from_str(origin).unwrap();
            assert!(!policy().apply(Some(&value), &mut headers), "{origin} should be rejected");
            assert!(headers.is_empty());
        }

        let mut headers = HeaderMap::new();
        assert!(!policy().apply(None, &mut headers));
    }
}
