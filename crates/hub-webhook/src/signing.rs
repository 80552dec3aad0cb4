//! Webhook envelope signing and verification.
//!
//! Wire format: JSON body `{ "event_type": ..., "payload": ..., "sent_at": ... }`
//! with the signature header carrying a hex-encoded HMAC-SHA256 over the exact
//! byte sequence of the request body, keyed by the endpoint's secret.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// The delivered JSON body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub event_type: String,
    pub payload: serde_json::Value,
    pub sent_at: DateTime<Utc>,
}

impl WebhookEnvelope {
    /// Serialize to the exact byte sequence that is signed and sent.
    pub fn to_body(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Compute the hex-encoded HMAC-SHA256 of `body` keyed by `secret`.
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Recompute the signature and compare in constant time.
///
/// Receivers must use this (or an equivalent) rather than a plain string
/// comparison.
pub fn verify_signature(secret: &str, body: &[u8], provided_hex: &str) -> bool {
    let expected = match hex::decode(provided_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    let computed = mac.finalize().into_bytes();

    computed.ct_eq(expected.as_slice()).into()
}
