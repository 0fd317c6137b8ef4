//! LINE webhook signature verification.
//!
//! LINE signs every webhook request with HMAC-SHA256 over the raw request
//! body, keyed by the channel secret, and sends the base64 digest in the
//! `x-line-signature` header.
//! Reference: https://developers.line.biz/en/reference/messaging-api/#signature-validation
//!
//! The digest must be computed over the exact bytes received on the wire.
//! Never verify against a parsed and re-serialized body.

use std::fmt;

use axum::http::HeaderValue;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::{ChannelSecret, ConfigError};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Scheme prefixes stripped from a received signature before comparison.
///
/// Only one prefix is ever stripped, and only if it is on this list.
pub const SIGNATURE_SCHEMES: &[&str] = &["sha256="];

/// Compute the base64-encoded HMAC-SHA256 of `raw_body` keyed by `secret`.
pub fn sign(secret: &[u8], raw_body: &[u8]) -> String {
    // HMAC accepts keys of any length, so this never fails in practice.
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(m) => m,
        Err(_) => return String::new(),
    };

    mac.update(raw_body);

    STANDARD.encode(mac.finalize().into_bytes())
}

/// Verify a webhook signature.
///
/// # Arguments
///
/// * `secret` - The channel secret shared with the sender
/// * `raw_body` - The request body exactly as received
/// * `signature` - The received signature, bare base64 or `sha256=`-prefixed
///
/// # Returns
///
/// `true` only if the signature matches the recomputed digest exactly.
/// Empty inputs fail closed.
pub fn verify(secret: &[u8], raw_body: &[u8], signature: &str) -> bool {
    if secret.is_empty() || signature.is_empty() {
        return false;
    }

    let provided = normalize_signature(signature);
    if provided.is_empty() {
        return false;
    }

    let expected = sign(secret, raw_body);
    if expected.is_empty() {
        return false;
    }

    constant_time_compare(&expected, provided)
}

/// Strip one accepted scheme prefix, if present.
fn normalize_signature(signature: &str) -> &str {
    SIGNATURE_SCHEMES
        .iter()
        .find_map(|scheme| signature.strip_prefix(scheme))
        .unwrap_or(signature)
}

/// Constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Verifier bound to a single channel secret.
///
/// Built once at startup and shared across request tasks.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: ChannelSecret,
}

impl SignatureVerifier {
    /// Create a verifier for the given secret.
    ///
    /// A blank secret could never authenticate a request and is rejected here
    /// rather than on the first request.
    pub fn new(secret: ChannelSecret) -> Result<Self, ConfigError> {
        if secret.expose().trim().is_empty() {
            return Err(ConfigError::MissingSecret);
        }

        Ok(Self { secret })
    }

    /// Verify a signature string against a raw body.
    pub fn verify(&self, raw_body: &[u8], signature: &str) -> bool {
        verify(self.secret.expose().as_bytes(), raw_body, signature)
    }

    /// Verify the value of the signature header, if any.
    ///
    /// A missing header or one that is not visible ASCII is rejected.
    pub fn verify_header(&self, raw_body: &[u8], header: Option<&HeaderValue>) -> bool {
        match header.and_then(|v| v.to_str().ok()) {
            Some(signature) => self.verify(raw_body, signature),
            None => false,
        }
    }

    /// Sign a body with this verifier's secret.
    pub fn sign(&self, raw_body: &[u8]) -> String {
        sign(self.secret.expose().as_bytes(), raw_body)
    }
}

impl fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &self.secret)
            .finish()
    }
}
