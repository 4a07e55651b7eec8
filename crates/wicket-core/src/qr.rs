//! QR secret validation.
//!
//! A decoded payload is accepted if it equals the configured secret
//! directly, or if its SHA-256 hex digest does. The secret is
//! conventionally itself a hex digest, so both comparisons are
//! case-insensitive. Binary check only: no partial credit.

use sha2::{Digest, Sha256};

/// Validate a decoded QR payload against the configured secret.
///
/// Pure function; the absent-payload case is a distinct outcome
/// handled by the caller, not here.
pub fn validate(decoded_text: &str, secret: &str) -> bool {
    if decoded_text.eq_ignore_ascii_case(secret) {
        return true;
    }

    // Payload may be the plain text whose digest is the secret.
    let digest = format!("{:x}", Sha256::digest(decoded_text.as_bytes()));
    digest.eq_ignore_ascii_case(secret)
}
