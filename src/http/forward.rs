//! Upstream forwarding.
//!
//! Requests that clear the guard are proxied to the configured upstream
//! site. Guard-added headers (`x-request-id`, `x-nonce`) travel with them.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode, Uri, Version};
use axum::response::Response;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::config::UpstreamConfig;
use crate::http::request::RequestIdExt;
use crate::http::response;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

const HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::PROXY_AUTHORIZATION,
];

/// Forwarding state shared by the fallback handler.
#[derive(Clone)]
pub struct Upstream {
    client: Client<HttpConnector, Body>,
    authority: Option<Authority>,
    timeout: Duration,
}

impl Upstream {
    pub fn from_config(config: &UpstreamConfig) -> Self {
        let authority = config.address.as_deref().and_then(|addr| {
            Authority::from_str(addr)
                .map_err(|e| tracing::error!(address = addr, error = %e, "Invalid upstream address"))
                .ok()
        });

        Self {
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
            authority,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.authority.is_some()
    }
}

pub async fn forward_handler(State(upstream): State<Upstream>, request: Request<Body>) -> Response {
    let Some(authority) = upstream.authority.clone() else {
        return response::error(StatusCode::NOT_FOUND, "Not found");
    };

    let request_id = request.request_id();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let (mut parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(authority);
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Could not build upstream URI");
            return response::error(StatusCode::BAD_REQUEST, "Invalid request");
        }
    };
    parts.version = Version::HTTP_11;
    strip_hop_by_hop(&mut parts.headers);
    if let Some(addr) = peer {
        append_forwarded_for(&mut parts.headers, addr);
    }

    tracing::debug!(request_id = ?request_id, path = %path, "Forwarding request upstream");

    let upstream_request = Request::from_parts(parts, body);
    match tokio::time::timeout(upstream.timeout, upstream.client.request(upstream_request)).await {
        Ok(Ok(response)) => {
            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            Response::from_parts(parts, Body::new(body))
        }
        Ok(Err(e)) => {
            tracing::error!(request_id = ?request_id, path = %path, error = %e, "Upstream error");
            response::error(StatusCode::BAD_GATEWAY, "Upstream request failed")
        }
        Err(_) => {
            tracing::error!(request_id = ?request_id, path = %path, "Upstream timed out");
            response::error(StatusCode::GATEWAY_TIMEOUT, "Upstream request timed out")
        }
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");
}

fn append_forwarded_for(headers: &mut HeaderMap, peer: SocketAddr) {
    let ip = peer.ip().to_string();
    let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.trim().is_empty() => format!("{}, {}", existing, ip),
        _ => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
