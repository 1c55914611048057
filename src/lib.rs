//! Site guard: request security middleware for a public web site.
//!
//! Sits in front of the site, screening every request for blocked clients,
//! attack signatures and rate limit breaches before it is decorated with
//! security headers, CSP nonces and CORS and forwarded upstream.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;
pub mod store;

pub use config::GuardConfig;
pub use http::GuardServer;
pub use lifecycle::Shutdown;
pub use security::SecurityGuard;
pub use store::{CounterStore, MemoryStore};
