//! Security response headers.
//!
//! # Responsibilities
//! - Build the Content Security Policy around a per-request nonce
//! - Stamp the hardening headers on every response
//! - Fall back to a minimal safe set when the full set cannot be built
//!
//! # Design Decisions
//! - Page responses get the full CSP; API responses never carry one
//! - HSTS is sent unconditionally
//! - Header values derived from config are validated when stamped; constant
//!   values never fail

use axum::http::header::{
    CONTENT_SECURITY_POLICY, REFERRER_POLICY, STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS,
    X_FRAME_OPTIONS,
};
use axum::http::header::InvalidHeaderValue;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::CspConfig;
use crate::security::cors::CorsPolicy;
use crate::security::nonce::Nonce;

pub const HSTS: &str = "max-age=31536000; includeSubDomains; preload";
pub const FRAME_OPTIONS: &str = "DENY";
pub const CONTENT_TYPE_OPTIONS: &str = "nosniff";
pub const REFERRER: &str = "strict-origin-when-cross-origin";
pub const PERMISSIONS: &str = "camera=(), microphone=(), geolocation=(), payment=(), usb=(), \
                               magnetometer=(), gyroscope=(), accelerometer=()";
pub const MINIMAL_CSP: &str = "default-src 'self'; frame-ancestors 'none'";

pub const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("invalid value for {name}: {source}")]
    InvalidValue {
        name: &'static str,
        #[source]
        source: InvalidHeaderValue,
    },
}

/// Inputs to one page response's CSP.
#[derive(Debug, Clone, Copy)]
pub struct CspOptions<'a> {
    pub nonce: &'a Nonce,
    pub is_development: bool,
    pub report_uri: Option<&'a str>,
}

fn directive<'a>(name: &str, sources: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = name.to_string();
    for source in sources {
        out.push(' ');
        out.push_str(source);
    }
    out
}

/// Render the full policy string.
pub fn build_csp(sources: &CspConfig, opts: &CspOptions<'_>) -> String {
    let nonce = format!("'nonce-{}'", opts.nonce);
    let idp = sources.identity_provider_domains.iter().map(String::as_str);
    let dev = opts.is_development;

    let mut directives = vec![
        directive("default-src", ["'self'"]),
        directive(
            "script-src",
            ["'self'", nonce.as_str(), "'strict-dynamic'"]
                .into_iter()
                .chain(idp.clone())
                .chain(dev.then_some("'unsafe-eval'")),
        ),
        directive("style-src", ["'self'", nonce.as_str()]),
        directive(
            "img-src",
            ["'self'", "data:", "blob:"]
                .into_iter()
                .chain(sources.image_domains.iter().map(String::as_str)),
        ),
        directive("font-src", ["'self'", "data:"]),
        directive(
            "connect-src",
            ["'self'"]
                .into_iter()
                .chain(idp.clone())
                .chain(sources.analytics_domains.iter().map(String::as_str))
                .chain(dev.then_some("ws:")),
        ),
        directive("frame-src", ["'self'"].into_iter().chain(idp)),
        directive("worker-src", ["'self'", "blob:"]),
        directive("object-src", ["'none'"]),
        directive("base-uri", ["'self'"]),
        directive("form-action", ["'self'"]),
        directive("frame-ancestors", ["'none'"]),
    ];
    if !dev {
        directives.push("upgrade-insecure-requests".to_string());
    }
    if let Some(uri) = opts.report_uri {
        directives.push(directive("report-uri", [uri]));
    }

    directives.join("; ")
}

/// Full header set for a rendered page.
pub fn apply_security_headers(
    headers: &mut HeaderMap,
    sources: &CspConfig,
    opts: &CspOptions<'_>,
) -> Result<(), HeaderError> {
    let csp = HeaderValue::from_str(&build_csp(sources, opts)).map_err(|source| {
        HeaderError::InvalidValue {
            name: "content-security-policy",
            source,
        }
    })?;
    headers.insert(CONTENT_SECURITY_POLICY, csp);
    apply_hardening(headers);
    Ok(())
}

/// Header set for an API response: hardening plus CORS when the origin is
/// allowed. Returns whether CORS headers were added.
pub fn apply_api_security_headers(
    headers: &mut HeaderMap,
    origin: Option<&HeaderValue>,
    cors: &CorsPolicy,
) -> bool {
    headers.remove(CONTENT_SECURITY_POLICY);
    apply_hardening(headers);
    cors.apply(origin, headers)
}

/// Safe defaults used when the full set could not be built.
pub fn apply_minimal_headers(headers: &mut HeaderMap, include_csp: bool) {
    if include_csp {
        headers.insert(CONTENT_SECURITY_POLICY, HeaderValue::from_static(MINIMAL_CSP));
    }
    apply_hardening(headers);
}

fn apply_hardening(headers: &mut HeaderMap) {
    headers.insert(STRICT_TRANSPORT_SECURITY, HeaderValue::from_static(HSTS));
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static(FRAME_OPTIONS));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static(CONTENT_TYPE_OPTIONS));
    headers.insert(REFERRER_POLICY, HeaderValue::from_static(REFERRER));
    headers.insert(PERMISSIONS_POLICY, HeaderValue::from_static(PERMISSIONS));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorsConfig;
    use crate::security::nonce::generate_nonce;

    fn options(nonce: &Nonce) -> CspOptions<'_> {
        CspOptions {
            nonce,
            is_development: false,
            report_uri: Some("/api/csp-report"),
        }
    }

    fn directive_of<'a>(csp: &'a str, name: &str) -> &'a str {
        csp.split("; ")
            .find(|d| d.starts_with(name))
            .unwrap_or_else(|| panic!("missing {name} in {csp}"))
    }

    #[test]
    fn test_nonce_in_script_and_style() {
        let nonce = generate_nonce();
        let csp = build_csp(&CspConfig::default(), &options(&nonce));
        let expected = format!("'nonce-{}'", nonce);

        assert!(directive_of(&csp, "script-src").contains(&expected));
        assert!(directive_of(&csp, "style-src").contains(&expected));
        assert!(directive_of(&csp, "frame-src").contains("https://challenges.cloudflare.com"));
        assert!(directive_of(&csp, "connect-src").contains("https://vitals.vercel-insights.com"));
        assert_eq!(directive_of(&csp, "report-uri"), "report-uri /api/csp-report");
        assert!(csp.contains("upgrade-insecure-requests"));
        assert!(!csp.contains("'unsafe-eval'"));
    }

    #[test]
    fn test_development_relaxations() {
        let nonce = generate_nonce();
        let csp = build_csp(
            &CspConfig::default(),
            &CspOptions {
                nonce: &nonce,
                is_development: true,
                report_uri: None,
            },
        );
        assert!(directive_of(&csp, "script-src").ends_with("'unsafe-eval'"));
        assert!(directive_of(&csp, "connect-src").ends_with("ws:"));
        assert!(!csp.contains("upgrade-insecure-requests"));
        assert!(!csp.contains("report-uri"));
    }

    #[test]
    fn test_page_header_set() {
        let nonce = generate_nonce();
        let mut headers = HeaderMap::new();
        apply_security_headers(&mut headers, &CspConfig::default(), &options(&nonce)).unwrap();

        assert_eq!(headers[STRICT_TRANSPORT_SECURITY], HSTS);
        assert_eq!(headers[X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[REFERRER_POLICY], "strict-origin-when-cross-origin");
        assert_eq!(headers["permissions-policy"], PERMISSIONS);
        assert!(headers.contains_key(CONTENT_SECURITY_POLICY));
    }

    #[test]
    fn test_invalid_source_is_an_error() {
        let nonce = generate_nonce();
        let mut sources = CspConfig::default();
        sources.image_domains.push("https://bad\nhost".into());
        let mut headers = HeaderMap::new();

        let err = apply_security_headers(&mut headers, &sources, &options(&nonce)).unwrap_err();
        assert!(matches!(err, HeaderError::InvalidValue { name: "content-security-policy", .. }));
        assert!(headers.is_empty());

        apply_minimal_headers(&mut headers, true);
        assert_eq!(headers[CONTENT_SECURITY_POLICY], MINIMAL_CSP);
        assert_eq!(headers[STRICT_TRANSPORT_SECURITY], HSTS);
        assert_eq!(headers["permissions-policy"], PERMISSIONS);
        assert_eq!(headers[X_FRAME_OPTIONS], "DENY");
    }

    #[test]
    fn test_api_headers_strip_csp() {
        let cors = CorsPolicy::from_config(&CorsConfig::default()).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_SECURITY_POLICY, HeaderValue::from_static("default-src *"));

        let cors_applied = apply_api_security_headers(&mut headers, None, &cors);
        assert!(!cors_applied);
        assert!(!headers.contains_key(CONTENT_SECURITY_POLICY));
        assert_eq!(headers[STRICT_TRANSPORT_SECURITY], HSTS);
    }
}
