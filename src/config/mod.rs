//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML), optional
//!     → loader.rs (parse & deserialize, or defaults)
//!     → env.rs (ALLOWED_ORIGINS, CSP_REPORT_URI, NODE_ENV, TRUST_PROXY ...)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; tiers never change at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_runtime_config, ConfigError};
pub use schema::{
    AdminConfig, AttackDetectionConfig, CorsConfig, CspConfig, Environment, GuardConfig,
    ListenerConfig, LogFormat, MiddlewareMode, ObservabilityConfig, RateLimitConfig,
    RateLimitTiers, SecurityConfig, StoreConfig, TierName, TierPolicy, TierRoute,
    UpstreamConfig,
};
