//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (identifier, tier, request_id) on every security event
//! - Request ID flows from the guard to the upstream site
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
