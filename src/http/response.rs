//! Guard-generated responses.
//!
//! Denials are terse JSON bodies. Nothing about internal state, matched
//! signatures or store errors is ever included.

use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::security::{BlockEntry, RateLimitDecision};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// JSON error body with the given status.
pub fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// 403 for a blocked identifier.
pub fn blocked(entry: &BlockEntry, now: DateTime<Utc>) -> Response {
    let mut response = error(StatusCode::FORBIDDEN, "Access denied");
    let retry_after = entry.remaining_at(now).as_secs().max(1);
    response
        .headers_mut()
        .insert(RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

/// 429 for a rate limit denial.
pub fn rate_limited(decision: &RateLimitDecision, now: DateTime<Utc>) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": "Too many requests",
            "remaining": decision.remaining,
            "resetAt": decision.reset_at,
        })),
    )
        .into_response();

    let headers = response.headers_mut();
    apply_rate_limit_headers(headers, decision);
    headers.insert(RETRY_AFTER, HeaderValue::from(decision.retry_after_secs(now)));
    response
}

/// Quota metadata for admitted and denied requests alike.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(
        X_RATELIMIT_RESET,
        HeaderValue::from(decision.reset_at.timestamp().max(0) as u64),
    );
}

/// 413 for bodies that are too large or could not be read.
pub fn payload_too_large() -> Response {
    error(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large")
}
