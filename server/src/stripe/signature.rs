//! Stripe webhook signature verification.
//!
//! Stripe signs webhook requests with HMAC-SHA256 over the exact raw body.
//! The `Stripe-Signature` header carries comma-separated `t=<epoch>` and
//! `v1=<hex>` pairs; the signed message is `"{t}.{raw_body}"`. Verification
//! must run against the unparsed byte body: any reserialization that touches
//! whitespace or key order produces a different message.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Reasons a webhook signature can fail verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing Stripe-Signature header")]
    MissingHeader,
    #[error("missing timestamp in Stripe-Signature header")]
    MissingTimestamp,
    #[error("invalid timestamp in Stripe-Signature header")]
    InvalidTimestamp,
    #[error("missing v1 signature in Stripe-Signature header")]
    MissingSignature,
    #[error("webhook timestamp outside tolerance")]
    StaleTimestamp,
    #[error("signature mismatch")]
    Mismatch,
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Verify a webhook signature against the raw request body.
///
/// * `secret` - the webhook signing secret (whsec_...)
/// * `payload` - the raw, unparsed request body bytes
/// * `header` - the `Stripe-Signature` header value, if present
/// * `max_age_seconds` - allowed clock skew between the signed timestamp
///   and `now_seconds` (replay protection)
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    header: Option<&str>,
    max_age_seconds: u64,
    now_seconds: u64,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;

    let mut timestamp: Option<&str> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for item in header.split(',') {
        let mut parts = item.trim().splitn(2, '=');
        match (parts.next(), parts.next()) {
            (Some("t"), Some(value)) => timestamp = Some(value),
            (Some("v1"), Some(value)) => candidates.push(value),
            // Ignore v0 and any scheme introduced later
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    let signed_at: u64 = timestamp
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp)?;

    if candidates.is_empty() {
        return Err(SignatureError::MissingSignature);
    }

    let age = now_seconds.abs_diff(signed_at);
    if age > max_age_seconds {
        warn!(
            signed_at = signed_at,
            now = now_seconds,
            age_seconds = age,
            max_age_seconds = max_age_seconds,
            "webhook_signature_stale"
        );
        return Err(SignatureError::StaleTimestamp);
    }

    let expected = compute_signature(secret, timestamp, payload);

    // Accept if any v1 entry matches (Stripe sends several during secret rolls)
    for candidate in candidates {
        if constant_time_compare(&expected, candidate) {
            return Ok(());
        }
    }

    warn!(expected_length = expected.len(), "webhook_signature_mismatch");
    Err(SignatureError::Mismatch)
}

/// HMAC-SHA256 hex digest of `"{timestamp}.{payload}"`.
fn compute_signature(secret: &str, timestamp: &str, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: u64 = 1_700_000_000;

    fn signed_header(secret: &str, timestamp: u64, payload: &[u8]) -> String {
        format!(
            "t={},v1={}",
            timestamp,
            compute_signature(secret, &timestamp.to_string(), payload)
        )
    }

    #[test]
    fn test_verify_valid_signature() {
        let payload = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;
        let header = signed_header(SECRET, NOW, payload);

        assert_eq!(
            verify_signature(SECRET, payload, Some(&header), 300, NOW),
            Ok(())
        );
    }

    #[test]
    fn test_verify_rejects_single_byte_mutation() {
        let payload = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;
        let header = signed_header(SECRET, NOW, payload);

        let mut mutated = payload.to_vec();
        mutated[10] ^= 1;

        assert_eq!(
            verify_signature(SECRET, &mutated, Some(&header), 300, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let payload = b"{}";
        let header = signed_header("whsec_other", NOW, payload);

        assert_eq!(
            verify_signature(SECRET, payload, Some(&header), 300, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_verify_missing_header() {
        assert_eq!(
            verify_signature(SECRET, b"{}", None, 300, NOW),
            Err(SignatureError::MissingHeader)
        );
    }

    #[test]
    fn test_verify_malformed_header() {
        assert_eq!(
            verify_signature(SECRET, b"{}", Some("v1=abc"), 300, NOW),
            Err(SignatureError::MissingTimestamp)
        );
        assert_eq!(
            verify_signature(SECRET, b"{}", Some("t=notanumber,v1=abc"), 300, NOW),
            Err(SignatureError::InvalidTimestamp)
        );
        assert_eq!(
            verify_signature(SECRET, b"{}", Some(&format!("t={}", NOW)), 300, NOW),
            Err(SignatureError::MissingSignature)
        );
    }

    #[test]
    fn test_verify_stale_timestamp() {
        let payload = b"{}";
        let old = NOW - 301;
        let header = signed_header(SECRET, old, payload);

        assert_eq!(
            verify_signature(SECRET, payload, Some(&header), 300, NOW),
            Err(SignatureError::StaleTimestamp)
        );
    }

    #[test]
    fn test_verify_accepts_secondary_v1_entry() {
        let payload = b"{}";
        let good = compute_signature(SECRET, &NOW.to_string(), payload);
        let header = format!("t={},v1={},v1={}", NOW, "0".repeat(64), good);

        assert_eq!(
            verify_signature(SECRET, payload, Some(&header), 300, NOW),
            Ok(())
        );
    }

    #[test]
    fn test_verify_ignores_v0_entries() {
        let payload = b"{}";
        let good = compute_signature(SECRET, &NOW.to_string(), payload);
        let header = format!("t={},v0=ignored,v1={}", NOW, good);

        assert_eq!(
            verify_signature(SECRET, payload, Some(&header), 300, NOW),
            Ok(())
        );
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
