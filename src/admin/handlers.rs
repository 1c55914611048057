use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::AdminState;
use crate::config::{Environment, MiddlewareMode};
use crate::http::response;
use crate::security::BlockEntry;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub mode: MiddlewareMode,
    pub environment: Environment,
    pub rate_limit_enabled: bool,
    pub attack_detection_enabled: bool,
    pub signatures: Vec<String>,
}

#[derive(Serialize)]
pub struct BlockStatus {
    pub identifier: String,
    pub blocked: bool,
    pub entry: Option<BlockEntry>,
}

#[derive(Deserialize)]
pub struct BlockRequest {
    pub duration_secs: u64,
    #[serde(default = "default_reason")]
    pub reason: String,
}

fn default_reason() -> String {
    "manual block".to_string()
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let config = state.guard.config();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        mode: config.security.mode,
        environment: config.security.environment,
        rate_limit_enabled: config.rate_limit.enabled,
        attack_detection_enabled: config.attack_detection.enabled,
        signatures: state
            .guard
            .detector()
            .signatures()
            .names()
            .map(str::to_string)
            .collect(),
    })
}

pub async fn get_block(
    State(state): State<AdminState>,
    Path(identifier): Path<String>,
) -> Response {
    match state.guard.detector().block_entry(&identifier).await {
        Ok(entry) => Json(BlockStatus {
            blocked: entry.is_some(),
            identifier,
            entry,
        })
        .into_response(),
        Err(e) => store_unavailable(e),
    }
}

pub async fn post_block(
    State(state): State<AdminState>,
    Path(identifier): Path<String>,
    Json(body): Json<BlockRequest>,
) -> Response {
    if body.duration_secs == 0 {
        return response::error(StatusCode::BAD_REQUEST, "duration_secs must be positive");
    }

    let duration = Duration::from_secs(body.duration_secs);
    match state
        .guard
        .detector()
        .block_identifier(&identifier, duration, &body.reason)
        .await
    {
        Ok(entry) => (
            StatusCode::CREATED,
            Json(BlockStatus {
                identifier,
                blocked: true,
                entry: Some(entry),
            }),
        )
            .into_response(),
        Err(e) => store_unavailable(e),
    }
}

pub async fn delete_block(
    State(state): State<AdminState>,
    Path(identifier): Path<String>,
) -> Response {
    match state.guard.detector().unblock(&identifier).await {
        Ok(removed) => {
            tracing::info!(identifier = %identifier, removed, "Identifier unblocked");
            Json(serde_json::json!({ "identifier": identifier, "removed": removed })).into_response()
        }
        Err(e) => store_unavailable(e),
    }
}

fn store_unavailable(e: crate::store::StoreError) -> Response {
    tracing::error!(error = %e, "Admin store operation failed");
    response::error(StatusCode::SERVICE_UNAVAILABLE, "Store unavailable")
}
