//! Gateway signature verification.
//!
//! Two independent HMAC-SHA256 schemes, both using constant-time
//! comparison and both returning a boolean only:
//!
//! - webhook deliveries: HMAC over the raw request body with the shared
//!   webhook secret, hex-encoded in the signature header
//! - browser-redirected payment confirmations: HMAC over
//!   `"{order_id}|{payment_id}"` with the API key secret
//!
//! A `false` result must cause the caller to reject with an authentication
//! error before any parsing of event semantics.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Verifies webhook delivery signatures.
#[derive(Clone)]
pub struct WebhookSignatureVerifier {
    secret: String,
}

impl WebhookSignatureVerifier {
    /// Creates a verifier with the shared webhook secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Verifies the signature over the raw body.
    ///
    /// Never panics and never errors on mismatch: malformed hex, wrong
    /// length, and wrong digest all return `false`.
    pub fn verify(&self, payload: &[u8], signature_hex: &str) -> bool {
        let provided = match hex::decode(signature_hex.trim()) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };

        let expected = compute_hmac(self.secret.as_bytes(), payload);
        constant_time_compare(&expected, &provided)
    }
}

/// Verifies browser-redirect checkout confirmations.
///
/// The gateway signs `"{order_id}|{payment_id}"` with the API key secret
/// when the client-side payment flow completes.
#[derive(Clone)]
pub struct CheckoutSignatureVerifier {
    key_secret: String,
}

impl CheckoutSignatureVerifier {
    /// Creates a verifier with the gateway API key secret.
    pub fn new(key_secret: impl Into<String>) -> Self {
        Self {
            key_secret: key_secret.into(),
        }
    }

    /// Verifies a checkout confirmation triple.
    pub fn verify(&self, order_id: &str, payment_id: &str, signature_hex: &str) -> bool {
        let provided = match hex::decode(signature_hex.trim()) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };

        let message = format!("{}|{}", order_id, payment_id);
        let expected = compute_hmac(self.key_secret.as_bytes(), message.as_bytes());
        constant_time_compare(&expected, &provided)
    }
}

fn compute_hmac(secret: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Constant-time comparison of two byte slices.
///
/// Prevents timing attacks that could leak the expected signature.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Computes a hex signature for use in test fixtures.
#[cfg(test)]
pub fn compute_test_signature(secret: &str, message: &[u8]) -> String {
    hex::encode(compute_hmac(secret.as_bytes(), message))
}
