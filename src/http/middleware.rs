//! The request guard.
//!
//! Runs in front of every route. In secure mode each request passes, in
//! order, the blocklist, the attack detector and the tier rate limiter
//! before being decorated and handed on. Basic mode only decorates.
//!
//! Store trouble at any step is logged and the request is let through.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use crate::config::MiddlewareMode;
use crate::http::request::RequestId;
use crate::http::response;
use crate::observability::metrics;
use crate::routing::RouteClass;
use crate::security::headers;
use crate::security::{generate_nonce, ClientIdentifier, RequestContent, SecurityGuard, NONCE_HEADER};

/// Axum middleware entry point, installed with `from_fn_with_state`.
pub async fn security_middleware(
    State(guard): State<Arc<SecurityGuard>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if guard.routes().is_bypassed(request.uri().path()) {
        return next.run(request).await;
    }

    let start = Instant::now();
    let route_class = guard.routes().classify(request.uri().path());

    let response = match guard.mode() {
        MiddlewareMode::Secure => secure_pipeline(&guard, route_class, request, next).await,
        MiddlewareMode::Basic => decorate(&guard, route_class, request, next).await,
    };

    metrics::record_request(route_class.as_str(), response.status().as_u16(), start);
    response
}

async fn secure_pipeline(
    guard: &Arc<SecurityGuard>,
    route_class: RouteClass,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let identifier = ClientIdentifier::from_request(
        request.headers(),
        peer,
        guard.config().security.trust_proxy,
    );
    let id = identifier.as_str();

    // 1. Blocklist
    match guard.detector().block_entry(id).await {
        Ok(Some(entry)) => {
            tracing::warn!(
                identifier = id,
                path = %request.uri().path(),
                reason = %entry.reason,
                "Blocked client denied"
            );
            metrics::record_blocked();
            return response::blocked(&entry, Utc::now());
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(identifier = id, error = %e, "Blocklist lookup failed, allowing request");
        }
    }

    // 2. Buffer the body so it can be scanned and still forwarded
    let (parts, body) = request.into_parts();
    let max_body = guard.config().security.max_body_size;
    if declared_length(&parts.headers).is_some_and(|len| len > max_body) {
        return response::payload_too_large();
    }
    let bytes = match axum::body::to_bytes(body, max_body).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(identifier = id, error = %e, "Request body rejected");
            return response::payload_too_large();
        }
    };

    // 3. Attack detection. A hit blocks future requests, not this one.
    // CSP reports quote the blocked content, so their bodies are not scanned.
    if guard.config().attack_detection.enabled {
        let is_csp_report = parts.uri.path() == guard.config().csp.report_path;
        let content = RequestContent {
            path: parts.uri.path(),
            query: parts.uri.query(),
            body: (!is_csp_report).then_some(&bytes[..]),
        };
        match guard.detector().detect(id, &content).await {
            Ok(Some(verdict)) => {
                tracing::warn!(
                    identifier = id,
                    method = %parts.method,
                    path = %parts.uri.path(),
                    verdict = %verdict,
                    "Attack detected"
                );
                metrics::record_attack(verdict.label());
                spawn_block(
                    guard.clone(),
                    id.to_string(),
                    guard.config().attack_detection.block_duration(),
                    verdict.to_string(),
                );
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(identifier = id, error = %e, "Attack rate check failed, allowing request");
            }
        }
    }

    // 4. Tier rate limit
    let mut quota = None;
    if guard.config().rate_limit.enabled {
        if let Some(tier) = guard.routes().tier_for(parts.uri.path()) {
            match guard.limiter().limit(id, tier).await {
                Ok(decision) if decision.success => quota = Some(decision),
                Ok(decision) => {
                    tracing::warn!(
                        identifier = id,
                        tier = %tier,
                        path = %parts.uri.path(),
                        reset_at = %decision.reset_at,
                        "Rate limit exceeded"
                    );
                    metrics::record_rate_limited(tier.as_str());
                    if guard.config().rate_limit.escalate_to_block {
                        spawn_block(
                            guard.clone(),
                            id.to_string(),
                            guard.limiter().policy(tier).block_duration(),
                            format!("rate limit exceeded on {} tier", tier),
                        );
                    }
                    return response::rate_limited(&decision, Utc::now());
                }
                Err(e) => {
                    tracing::warn!(identifier = id, tier = %tier, error = %e, "Rate limit check failed, allowing request");
                }
            }
        }
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    let mut response = decorate(guard, route_class, request, next).await;
    if let Some(decision) = quota {
        response::apply_rate_limit_headers(response.headers_mut(), &decision);
    }
    response
}

/// Request id, then CORS and API headers or a nonce and the full page
/// header set, depending on the route.
async fn decorate(
    guard: &SecurityGuard,
    route_class: RouteClass,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let request_id = RequestId::new();
    request_id.stamp(request.headers_mut());
    request.extensions_mut().insert(request_id);

    let mut response = match route_class {
        RouteClass::Api => {
            let origin = request.headers().get(header::ORIGIN).cloned();
            let allowed = origin
                .as_ref()
                .and_then(|o| o.to_str().ok())
                .is_some_and(|o| guard.cors().is_allowed(o));

            let mut response = if allowed && is_preflight(&request) {
                StatusCode::NO_CONTENT.into_response()
            } else {
                next.run(request).await
            };
            headers::apply_api_security_headers(response.headers_mut(), origin.as_ref(), guard.cors());
            response
        }
        RouteClass::Page => {
            let nonce = generate_nonce();
            let nonce_value = HeaderValue::from_str(nonce.as_str()).ok();
            if let Some(value) = &nonce_value {
                request.headers_mut().insert(NONCE_HEADER, value.clone());
            }
            request.extensions_mut().insert(nonce.clone());

            let mut response = next.run(request).await;
            let response_headers = response.headers_mut();
            let options = guard.csp_options(&nonce);
            match headers::apply_security_headers(response_headers, guard.csp_sources(), &options) {
                Ok(()) => {
                    if let Some(value) = nonce_value {
                        response_headers.insert(NONCE_HEADER, value);
                    }
                }
                Err(e) => {
                    tracing::warn!(request_id = %request_id, error = %e, "Falling back to minimal security headers");
                    headers::apply_minimal_headers(response_headers, true);
                }
            }
            response
        }
    };

    request_id.stamp(response.headers_mut());
    response
}

fn spawn_block(guard: Arc<SecurityGuard>, identifier: String, duration: Duration, reason: String) {
    tokio::spawn(async move {
        if let Err(e) = guard
            .detector()
            .block_identifier(&identifier, duration, &reason)
            .await
        {
            tracing::warn!(identifier = %identifier, error = %e, "Failed to record block");
        }
    });
}

fn is_preflight(request: &Request<Body>) -> bool {
    request.method() == Method::OPTIONS
        && request
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}
