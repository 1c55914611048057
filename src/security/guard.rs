//! The assembled security components shared by every request.

use std::sync::Arc;

use crate::config::{CspConfig, GuardConfig, MiddlewareMode};
use crate::routing::RouteTable;
use crate::security::attack::AttackDetector;
use crate::security::cors::CorsPolicy;
use crate::security::headers::{CspOptions, HeaderError};
use crate::security::nonce::Nonce;
use crate::security::patterns::SignatureSet;
use crate::security::rate_limit::RateLimiter;
use crate::store::{CounterStore, TimedStore};

/// Immutable guard state, built once at startup and shared via `Arc`.
pub struct SecurityGuard {
    config: GuardConfig,
    routes: RouteTable,
    detector: AttackDetector,
    limiter: RateLimiter,
    cors: CorsPolicy,
}

impl SecurityGuard {
    pub fn new(config: GuardConfig, store: Arc<dyn CounterStore>) -> Result<Self, HeaderError> {
        Self::with_signatures(config, store, SignatureSet::builtin())
    }

    pub fn with_signatures(
        config: GuardConfig,
        store: Arc<dyn CounterStore>,
        signatures: SignatureSet,
    ) -> Result<Self, HeaderError> {
        let store = TimedStore::new(store, config.store.timeout());
        let cors = CorsPolicy::from_config(&config.cors)?;

        Ok(Self {
            routes: RouteTable::from_config(&config.security, &config.rate_limit),
            detector: AttackDetector::with_signatures(
                store.clone(),
                config.attack_detection.clone(),
                signatures,
            ),
            limiter: RateLimiter::new(store, config.rate_limit.tiers.clone()),
            cors,
            config,
        })
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn mode(&self) -> MiddlewareMode {
        self.config.security.mode
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn detector(&self) -> &AttackDetector {
        &self.detector
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn cors(&self) -> &CorsPolicy {
        &self.cors
    }

    pub fn csp_sources(&self) -> &CspConfig {
        &self.config.csp
    }

    pub fn csp_options<'a>(&'a self, nonce: &'a Nonce) -> CspOptions<'a> {
        CspOptions {
            nonce,
            is_development: self.config.security.environment.is_development(),
            report_uri: self.config.csp.report_uri.as_deref(),
        }
    }
}
