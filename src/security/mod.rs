//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_ip.rs (derive the client identifier)
//!     → attack.rs (blocklist check, signature scan, request-rate breach)
//!     → rate_limit.rs (fixed-window tier limits)
//!     → nonce.rs + headers.rs (CSP and hardening headers for pages)
//!     → cors.rs (allowlisted origins on API routes)
//!     → Pass to upstream
//! ```
//!
//! # Design Decisions
//! - Defense in depth: several coarse layers rather than one precise one
//! - Fail open on store trouble: the guard must not become the outage
//! - Counters and blocks live in the store, never in guard memory

pub mod attack;
pub mod client_ip;
pub mod cors;
pub mod guard;
pub mod headers;
pub mod nonce;
pub mod patterns;
pub mod rate_limit;

pub use attack::{AttackDetector, AttackVerdict, BlockEntry, RequestContent};
pub use client_ip::ClientIdentifier;
pub use cors::CorsPolicy;
pub use guard::SecurityGuard;
pub use headers::{CspOptions, HeaderError};
pub use nonce::{generate_nonce, Nonce, NONCE_HEADER};
pub use patterns::SignatureSet;
pub use rate_limit::{RateLimitDecision, RateLimiter};
