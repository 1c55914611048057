//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → middleware.rs (blocklist, attack scan, rate limit, headers)
//!     → request.rs (request id)
//!     → csp_report.rs | forward.rs (local handler or upstream site)
//!     → response.rs (guard-generated denials)
//!     → Send to client
//! ```

pub mod csp_report;
pub mod forward;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use middleware::security_middleware;
pub use request::{RequestId, RequestIdExt, X_REQUEST_ID};
pub use server::GuardServer;
