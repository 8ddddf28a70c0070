//! # Webhook Signature Schemes
//!
//! Verification runs over the raw request body, bit-exact, before any JSON
//! parsing. MACs are compared constant-time; both sides of every compare
//! are fixed-length digests.
//!
//! Stripe signs `t=<epoch>,v1=<hex>` over `t || "." || body` with a
//! timestamp tolerance. Square signs `base64(HMAC(key, url || body))` with
//! no timestamp scheme.

use crate::SignatureError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use shared_crypto::{constant_time_eq, hmac_sha256};

/// Accepted clock skew for timestamped signatures.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Parsed `t=<epoch>,v1=<hex>` header. Multiple `v1` entries are legal
/// (secret rotation); any match passes.
#[derive(Debug, PartialEq, Eq)]
pub struct TimestampedSignature {
    /// The signed epoch-seconds timestamp.
    pub timestamp: i64,
    /// All `v1` candidate signatures, raw bytes.
    pub candidates: Vec<Vec<u8>>,
}

/// Parse a Stripe-style signature header.
///
/// # Errors
///
/// `SignatureError::MalformedHeader` when the timestamp or every `v1`
/// entry is absent or undecodable.
pub fn parse_timestamped_header(header: &str) -> Result<TimestampedSignature, SignatureError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::MalformedHeader)?);
            }
            "v1" => {
                let raw = hex::decode(value).map_err(|_| SignatureError::MalformedHeader)?;
                candidates.push(raw);
            }
            // Unknown schemes (v0, ...) are ignored, as Stripe documents.
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if candidates.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }
    Ok(TimestampedSignature {
        timestamp,
        candidates,
    })
}

/// Verify a Stripe-style signature over the raw body.
///
/// `now` is epoch seconds; injected so the tolerance window is testable.
///
/// # Errors
///
/// The [`SignatureError`] sub-reason distinguishes header shape, timestamp
/// tolerance, and MAC mismatch.
pub fn verify_timestamped_signature(
    secret: &[u8],
    header: &str,
    body: &[u8],
    tolerance_secs: i64,
    now: i64,
) -> Result<(), SignatureError> {
    let parsed = parse_timestamped_header(header)?;

    if (now - parsed.timestamp).abs() > tolerance_secs {
        return Err(SignatureError::TimestampOutOfTolerance);
    }

    let mut signed_payload = Vec::with_capacity(24 + body.len());
    signed_payload.extend_from_slice(parsed.timestamp.to_string().as_bytes());
    signed_payload.push(b'.');
    signed_payload.extend_from_slice(body);
    let expected = hmac_sha256(secret, &signed_payload);

    if parsed
        .candidates
        .iter()
        .any(|candidate| constant_time_eq(candidate, &expected))
    {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Verify a Square-style signature: `base64(HMAC(key, url || body))`.
///
/// # Errors
///
/// `MalformedHeader` for undecodable base64, `Mismatch` otherwise.
pub fn verify_url_keyed_signature(
    signature_key: &[u8],
    notification_url: &str,
    header: &str,
    body: &[u8],
) -> Result<(), SignatureError> {
    let presented = BASE64
        .decode(header.trim())
        .map_err(|_| SignatureError::MalformedHeader)?;

    let mut signed_payload = Vec::with_capacity(notification_url.len() + body.len());
    signed_payload.extend_from_slice(notification_url.as_bytes());
    signed_payload.extend_from_slice(body);
    let expected = hmac_sha256(signature_key, &signed_payload);

    if constant_time_eq(&presented, &expected) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}
