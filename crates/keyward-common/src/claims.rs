//! Unverified JWT inspection.
//!
//! The client never holds the signing key, so it cannot validate tokens. It
//! only reads the `exp` claim to decide whether a refresh is due; the server
//! remains the authority on whether a token is accepted.

use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::Deserialize;

/// The subset of access-token claims the client cares about.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryClaim {
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Decode the `exp` claim of a JWT without checking its signature.
///
/// Fails when the token is not three dot-separated base64url segments, when
/// the payload is not JSON, or when `exp` is missing.
pub fn decode_expiry(token: &str) -> Result<ExpiryClaim, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let data = decode::<ExpiryClaim>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}

/// Whether the token is still valid at `now` (strictly before `exp`).
pub fn is_live(claim: ExpiryClaim, now: i64) -> bool {
    claim.exp > now
}
