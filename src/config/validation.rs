//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (tier sizes > 0, timeouts > 0)
//! - Check origins, report URI and bind addresses are well formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::uri::Authority;
use axum::http::HeaderValue;
use thiserror::Error;
use url::Url;

use crate::config::schema::{GuardConfig, TierName};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("tier '{tier}' must have a non-zero {field}")]
    ZeroTierValue { tier: TierName, field: &'static str },

    #[error("rate limit route '{0}' must start with '/'")]
    RoutePrefix(String),

    #[error("allowed origin '{0}' must be a scheme://host[:port] origin")]
    InvalidOrigin(String),

    #[error("CSP report URI '{0}' is not a valid URL or absolute path")]
    InvalidReportUri(String),

    #[error("CSP report path '{0}' must start with '/' and not shadow another route")]
    InvalidReportPath(String),

    #[error("CSP source '{value}' in {field} is not a valid source expression")]
    InvalidCspSource { field: &'static str, value: String },

    #[error("{field} '{value}' is not a valid socket address")]
    InvalidBindAddress { field: &'static str, value: String },

    #[error("upstream address '{0}' is not a valid host:port")]
    InvalidUpstream(String),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
}

pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (tier, policy) in config.rate_limit.tiers.iter() {
        if policy.requests == 0 {
            errors.push(ValidationError::ZeroTierValue { tier, field: "requests" });
        }
        if policy.window_secs == 0 {
            errors.push(ValidationError::ZeroTierValue { tier, field: "window_secs" });
        }
    }

    for route in &config.rate_limit.routes {
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::RoutePrefix(route.path_prefix.clone()));
        }
    }

    for origin in &config.cors.allowed_origins {
        if !is_origin(origin) {
            errors.push(ValidationError::InvalidOrigin(origin.clone()));
        }
    }

    if let Some(uri) = &config.csp.report_uri {
        if !uri.starts_with('/') && Url::parse(uri).is_err() {
            errors.push(ValidationError::InvalidReportUri(uri.clone()));
        }
    }

    if !is_report_path(&config.csp.report_path) {
        errors.push(ValidationError::InvalidReportPath(config.csp.report_path.clone()));
    }

    for (field, sources) in [
        ("csp.identity_provider_domains", &config.csp.identity_provider_domains),
        ("csp.image_domains", &config.csp.image_domains),
        ("csp.analytics_domains", &config.csp.analytics_domains),
    ] {
        for source in sources.iter().filter(|s| !is_csp_source(s)) {
            errors.push(ValidationError::InvalidCspSource {
                field,
                value: source.clone(),
            });
        }
    }

    check_bind(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.admin.enabled {
        check_bind(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }
    if config.observability.metrics_enabled {
        check_bind(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if let Some(addr) = &config.upstream.address {
        if Authority::from_str(addr).is_err() {
            errors.push(ValidationError::InvalidUpstream(addr.clone()));
        }
    }

    if config.store.timeout_ms == 0 {
        errors.push(ValidationError::ZeroValue("store.timeout_ms"));
    }
    if config.attack_detection.requests_per_minute == 0 {
        errors.push(ValidationError::ZeroValue("attack_detection.requests_per_minute"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_origin(origin: &str) -> bool {
    match Url::parse(origin) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some()
                && url.path() == "/"
                && url.query().is_none()
                && url.fragment().is_none()
                && !origin.ends_with('/')
        }
        Err(_) => false,
    }
}

fn is_report_path(path: &str) -> bool {
    path.starts_with('/')
        && path.len() > 1
        && path != "/healthz"
        && !path.contains(|c: char| c.is_whitespace() || c.is_control() || matches!(c, '{' | '}' | '*' | '?' | '#'))
}

/// A single CSP source: one token that is a legal header value.
fn is_csp_source(source: &str) -> bool {
    !source.is_empty()
        && HeaderValue::from_str(source).is_ok()
        && !source.contains(|c: char| c == ';' || c == ',' || c.is_whitespace())
}

fn check_bind(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress {
            field,
            value: value.to_string(),
        });
    }
}
