//! Client identification.
//!
//! The identifier keys every counter and block. It is best effort: clients
//! behind one NAT share an identifier, and blocking one blocks all of them.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};

/// Proxy headers consulted in priority order when proxies are trusted.
pub const CLIENT_IP_HEADERS: [&str; 6] = [
    "x-forwarded-for",
    "x-real-ip",
    "cf-connecting-ip",
    "true-client-ip",
    "x-client-ip",
    "x-cluster-client-ip",
];

const FINGERPRINT_HEADERS: [&str; 3] = ["user-agent", "accept-language", "accept-encoding"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentifier(String);

impl ClientIdentifier {
    /// Derive the identifier for a request.
    ///
    /// Trusted proxy headers win, then the socket peer, then a header
    /// fingerprint.
    pub fn from_request(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> Self {
        if trust_proxy {
            if let Some(ip) = from_proxy_headers(headers) {
                return Self(ip.to_string());
            }
        }
        match peer {
            Some(addr) => Self(addr.ip().to_string()),
            None => Self(fingerprint(headers)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_fingerprint(&self) -> bool {
        self.0.starts_with("fp:")
    }
}

impl fmt::Display for ClientIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn from_proxy_headers(headers: &HeaderMap) -> Option<IpAddr> {
    CLIENT_IP_HEADERS.iter().find_map(|name| {
        let value = headers.get(*name)?.to_str().ok()?;
        // X-Forwarded-For lists the original client first.
        value.split(',').next()?.trim().parse::<IpAddr>().ok()
    })
}

fn fingerprint(headers: &HeaderMap) -> String {
    let mut hasher = Sha256::new();
    for name in FINGERPRINT_HEADERS {
        if let Some(value) = headers.get(name) {
            hasher.update(value.as_bytes());
        }
        hasher.update(b"\n");
    }
    let digest = format!("{:x}", hasher.finalize());
    format!("fp:{}", &digest[..16])
}
