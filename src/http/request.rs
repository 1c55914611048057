//! Request identification.
//!
//! Every request that reaches the decoration stage gets a fresh UUID v4,
//! stamped on the forwarded request, the response, and stored in request
//! extensions for handlers and logs.

use std::fmt;

use axum::http::{HeaderMap, HeaderValue, Request};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Set `X-Request-ID`, replacing any client-supplied value.
    pub fn stamp(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.0.to_string()) {
            headers.insert(X_REQUEST_ID, value);
        }
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Read the id assigned by the guard.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<RequestId>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<RequestId> {
        self.extensions().get::<RequestId>().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_stamp_replaces_client_value() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("client-chosen"));

        let id = RequestId::new();
        id.stamp(&mut headers);

        let stamped = headers[X_REQUEST_ID].to_str().unwrap();
        assert_eq!(Uuid::parse_str(stamped).unwrap(), *id.as_uuid());
    }

    #[test]
    fn test_extension_lookup() {
        let mut req = Request::new(Body::empty());
        assert!(req.request_id().is_none());

        let id = RequestId::new();
        req.extensions_mut().insert(id);
        assert_eq!(req.request_id(), Some(id));
    }
}
