//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the Axum router: health, CSP reports, upstream fallback
//! - Wrap every route in the security guard
//! - Apply request timeout and HTTP tracing
//! - Serve with peer addresses and graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GuardConfig;
use crate::http::csp_report::csp_report_handler;
use crate::http::forward::{forward_handler, Upstream};
use crate::http::middleware::security_middleware;
use crate::security::SecurityGuard;

/// The public-facing guard server.
pub struct GuardServer {
    router: Router,
    guard: Arc<SecurityGuard>,
}

impl GuardServer {
    pub fn new(guard: Arc<SecurityGuard>) -> Self {
        let router = Self::build_router(guard.clone());
        Self { router, guard }
    }

    /// Build the router with the guard and all layers applied.
    #[allow(deprecated)]
    pub fn build_router(guard: Arc<SecurityGuard>) -> Router {
        let config: &GuardConfig = guard.config();
        let upstream = Upstream::from_config(&config.upstream);
        if !upstream.is_configured() {
            tracing::warn!("No upstream configured, unmatched routes will answer 404");
        }

        Router::new()
            .route("/healthz", get(health))
            .route(&config.csp.report_path, post(csp_report_handler))
            .fallback(forward_handler)
            .with_state(upstream)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::from_fn_with_state(guard.clone(), security_middleware))
            .layer(TraceLayer::new_for_http())
    }

    pub fn guard(&self) -> &Arc<SecurityGuard> {
        &self.guard
    }

    /// Serve until a shutdown signal arrives on `shutdown`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mode = ?self.guard.mode(),
            "Guard server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Guard server stopped");
        Ok(())
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
