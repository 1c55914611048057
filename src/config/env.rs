//! Environment variable overrides.
//!
//! Applied after the config file is parsed and before validation, so a
//! deployment can tune origins and proxy trust without shipping a file.

use crate::config::schema::{Environment, GuardConfig};

pub const ALLOWED_ORIGINS: &str = "ALLOWED_ORIGINS";
pub const APP_URL: &str = "NEXT_PUBLIC_APP_URL";
pub const CSP_REPORT_URI: &str = "CSP_REPORT_URI";
pub const NODE_ENV: &str = "NODE_ENV";
pub const VERCEL: &str = "VERCEL";
pub const TRUST_PROXY: &str = "TRUST_PROXY";

const DEV_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

/// Read a variable from the process environment.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Apply overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut GuardConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(NODE_ENV).as_deref().map(str::trim) {
        Some("development") => config.security.environment = Environment::Development,
        Some("production") => config.security.environment = Environment::Production,
        _ => {}
    }

    if let Some(origins) = lookup(ALLOWED_ORIGINS) {
        for origin in origins.split(',') {
            push_origin(config, origin);
        }
    }

    if let Some(app_url) = lookup(APP_URL) {
        push_origin(config, &app_url);
    }

    if config.security.environment.is_development() {
        for origin in DEV_ORIGINS {
            push_origin(config, origin);
        }
    }

    if let Some(uri) = lookup(CSP_REPORT_URI).filter(|v| !v.trim().is_empty()) {
        config.csp.report_uri = Some(uri.trim().to_string());
    }

    if lookup(VERCEL).is_some_and(|v| is_truthy(&v)) {
        config.security.trust_proxy = true;
    }
    if let Some(value) = lookup(TRUST_PROXY) {
        config.security.trust_proxy = is_truthy(&value);
    }
}

fn push_origin(config: &mut GuardConfig, origin: &str) {
    let origin = origin.trim().trim_end_matches('/');
    if origin.is_empty() {
        return;
    }
    if !config.cors.allowed_origins.iter().any(|o| o == origin) {
        config.cors.allowed_origins.push(origin.to_string());
    }
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.eq_ignore_ascii_case("false") && value != "0"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_origins_are_merged_and_deduplicated() {
        let mut config = GuardConfig::default();
        config.cors.allowed_origins.push("https://a.example".into());

        apply_env_overrides(
            &mut config,
            lookup_from(&[
                (ALLOWED_ORIGINS, "https://a.example, https://b.example,,"),
                (APP_URL, "https://site.example/"),
            ]),
        );

        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://a.example", "https://b.example", "https://site.example"]
        );
        assert!(!config.security.trust_proxy);
    }

    #[test]
    fn test_development_adds_localhost() {
        let mut config = GuardConfig::default();
        apply_env_overrides(&mut config, lookup_from(&[(NODE_ENV, "development")]));

        assert!(config.security.environment.is_development());
        assert!(config
            .cors
            .allowed_origins
            .contains(&"http://localhost:3000".to_string()));
    }

    #[test]
    fn test_proxy_trust_flags() {
        let mut config = GuardConfig::default();
        apply_env_overrides(&mut config, lookup_from(&[(VERCEL, "1")]));
        assert!(config.security.trust_proxy);

        let mut config = GuardConfig::default();
        apply_env_overrides(
            &mut config,
            lookup_from(&[(VERCEL, "1"), (TRUST_PROXY, "false")]),
        );
        assert!(!config.security.trust_proxy);
    }

    #[test]
    fn test_report_uri_override() {
        let mut config = GuardConfig::default();
        apply_env_overrides(
            &mut config,
            lookup_from(&[(CSP_REPORT_URI, "https://reports.example/csp")]),
        );
        assert_eq!(
            config.csp.report_uri.as_deref(),
            Some("https://reports.example/csp")
        );
    }
}
