//! SHA-256 body digests and SHA-512 artifact checksums.

use crate::crypto::verify::constant_time_eq;
use crate::errors::ResponseRejection;
use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256, Sha512};

/// Compute SHA-256 digest of body and return base64-encoded result.
pub fn sha256_b64(body: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(body))
}

/// Compute SHA-512 digest of an artifact and return base64-encoded result.
pub fn sha512_b64(bytes: &[u8]) -> String {
    STANDARD.encode(Sha512::digest(bytes))
}

/// Format digest for HTTP Digest header: `sha-256=<base64>`.
pub fn format_digest_header(body: &[u8]) -> String {
    format!("sha-256={}", sha256_b64(body))
}

/// Parse a Digest header and extract the base64 value.
pub fn parse_digest_header(header: &str) -> Option<&str> {
    let header = header.trim();
    header
        .strip_prefix("sha-256=")
        .or_else(|| header.strip_prefix("SHA-256="))
}

/// Compare computed digest to the Digest header.
///
/// An absent header passes here. The response pipeline only accepts that
/// for empty bodies.
pub fn verify_digest(body: &[u8], digest_header: Option<&str>) -> Result<(), ResponseRejection> {
    let Some(header) = digest_header else {
        return Ok(());
    };

    let Some(expected_b64) = parse_digest_header(header) else {
        return Err(ResponseRejection::DigestMismatch);
    };

    let computed_b64 = sha256_b64(body);

    if !constant_time_eq(computed_b64.as_bytes(), expected_b64.as_bytes()) {
        return Err(ResponseRejection::DigestMismatch);
    }

    Ok(())
}
