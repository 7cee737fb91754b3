//! Webhook signature verification.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use super::SignatureError;

type HmacSha256 = Hmac<Sha256>;

/// Clock skew allowed between Stripe's timestamp and ours; anything older
/// is treated as a replay.
const TOLERANCE_SECS: i64 = 300;

/// Verifies a `Stripe-Signature` header against the raw request body.
///
/// The header is comma-separated `k=v` pairs carrying a unix timestamp (`t`)
/// and one or more `v1` HMAC-SHA256 signatures over `{t}.{body}`; any
/// matching `v1` passes. `now` is injected so the replay window is testable.
///
/// # Errors
///
/// Returns a [`SignatureError`] naming what failed: an unparseable header,
/// a missing part, a timestamp outside the tolerance, or no matching digest.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &SecretString,
    now: DateTime<Utc>,
) -> Result<(), SignatureError> {
    let mut timestamp_raw: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for pair in header.split(',') {
        let Some((key, value)) = pair.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp_raw = Some(value),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let Some(timestamp_raw) = timestamp_raw else {
        return Err(SignatureError::MissingParts);
    };
    if signatures.is_empty() {
        return Err(SignatureError::MissingParts);
    }
    let timestamp: i64 = timestamp_raw
        .parse()
        .map_err(|_| SignatureError::Malformed)?;

    if (now.timestamp() - timestamp).abs() > TOLERANCE_SECS {
        return Err(SignatureError::Timestamp);
    }

    // The signed payload is the raw header timestamp, a dot, the raw body.
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|_| SignatureError::Malformed)?;
    mac.update(timestamp_raw.as_bytes());
    mac.update(b".");
    mac.update(payload);

    for candidate in &signatures {
        let Ok(candidate_bytes) = hex::decode(candidate) else {
            continue;
        };
        // verify_slice compares in constant time.
        if mac.clone().verify_slice(&candidate_bytes).is_ok() {
            return Ok(());
        }
    }

    Err(SignatureError::NoMatch)
}
