//! Operator API for inspecting and managing blocks.
//!
//! Served on its own listener, never through the public guard.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::security::SecurityGuard;

#[derive(Clone)]
pub struct AdminState {
    pub guard: Arc<SecurityGuard>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(guard: Arc<SecurityGuard>) -> Self {
        let api_key = Arc::from(guard.config().admin.api_key.as_str());
        Self { guard, api_key }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route(
            "/admin/blocks/{identifier}",
            get(get_block).post(post_block).delete(delete_block),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
