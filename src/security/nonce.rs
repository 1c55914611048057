//! Per-request CSP nonces.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rand::RngCore;

/// Header carrying the nonce to the page renderer.
pub const NONCE_HEADER: &str = "x-nonce";

/// Bytes of entropy per nonce.
pub const NONCE_BYTES: usize = 16;

/// A single-use token allowing one response's inline scripts and styles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nonce(String);

impl Nonce {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Draw a fresh nonce from the operating system CSPRNG.
pub fn generate_nonce() -> Nonce {
    let mut bytes = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Nonce(BASE64.encode(bytes))
}
