//! Route classification.
//!
//! # Data Flow
//! ```text
//! Request path
//!     → matcher.rs (segment-aware prefix matching)
//!     → router.rs (route class: bypass / api / page, and rate limit tier)
//! ```
//!
//! # Design Decisions
//! - Tables compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Longest matching prefix wins for tiers

pub mod matcher;
pub mod router;

pub use matcher::PathPrefixMatcher;
pub use router::{RouteClass, RouteTable};
