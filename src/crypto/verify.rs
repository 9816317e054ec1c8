//! Ed25519 / Ed25519ph signature verification.
//!
//! [`verify`] is the single entry point for every signature check in the
//! crate. Malformed keys, malformed signatures and forged signatures all
//! produce the same [`TollgateError::NotGenuine`] so callers cannot use the
//! verifier as an oracle.

use crate::TollgateError;
use ed25519_dalek::{Signature, VerifyingKey};
use sha2::{Digest, Sha512};
use std::collections::HashMap;
use std::fmt;

/// Length of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Length of an Ed25519 signature in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Signature algorithm and message canonicalization rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningScheme {
    /// Plain Ed25519 over the message bytes.
    Ed25519,
    /// Ed25519ph: Ed25519 over the SHA-512 digest of the message (RFC 8032).
    Ed25519ph,
    /// No signature. Never verifies.
    Unsigned,
}

impl SigningScheme {
    /// Scheme code as used in license key tags and logs.
    pub fn code(&self) -> &'static str {
        match self {
            SigningScheme::Ed25519 => "ED25519_SIGN",
            SigningScheme::Ed25519ph => "ED25519PH_SIGN",
            SigningScheme::Unsigned => "NONE",
        }
    }
}

impl fmt::Display for SigningScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Verify `signature` over `message` with `public_key` under `scheme`.
///
/// # Errors
/// `NotGenuine` for any malformed input or cryptographic mismatch.
pub fn verify(
    scheme: SigningScheme,
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), TollgateError> {
    let key_bytes: [u8; PUBLIC_KEY_LENGTH] = public_key
        .try_into()
        .map_err(|_| TollgateError::NotGenuine)?;
    let verifying_key =
        VerifyingKey::from_bytes(&key_bytes).map_err(|_| TollgateError::NotGenuine)?;

    verify_with_key(scheme, &verifying_key, message, signature)
}

/// Same as [`verify`] with an already decoded key.
pub(crate) fn verify_with_key(
    scheme: SigningScheme,
    verifying_key: &VerifyingKey,
    message: &[u8],
    signature: &[u8],
) -> Result<(), TollgateError> {
    let signature = Signature::from_slice(signature).map_err(|_| TollgateError::NotGenuine)?;

    let outcome = match scheme {
        SigningScheme::Ed25519 => verifying_key.verify_strict(message, &signature),
        SigningScheme::Ed25519ph => {
            let prehashed = Sha512::new_with_prefix(message);
            verifying_key.verify_prehashed_strict(prehashed, None, &signature)
        }
        SigningScheme::Unsigned => return Err(TollgateError::NotGenuine),
    };

    outcome.map_err(|_| TollgateError::NotGenuine)
}

/// Compare two byte strings without early exit on the first difference.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Parsed signature header components.
#[derive(Debug, Clone)]
pub struct ParsedSignatureHeader {
    /// Key ID from the signature header (if present).
    pub key_id: Option<String>,
    /// Signature algorithm (always "ed25519" once parsed).
    pub algorithm: String,
    /// Base64-encoded signature.
    pub signature: String,
    /// Headers included in the signing string.
    pub headers: Vec<String>,
}

/// Parse a `Keygen-Signature` header.
///
/// Format: `keyid="...", algorithm="ed25519", signature="<base64>", headers="..."`
///
/// Returns `None` when the header is unusable; callers treat that the same
/// as a bad signature.
pub fn parse_signature_header(header: &str) -> Option<ParsedSignatureHeader> {
    let mut parts: HashMap<String, String> = HashMap::new();

    for part in header.split(',') {
        let part = part.trim();
        if let Some(eq_pos) = part.find('=') {
            let key = part[..eq_pos].trim().to_lowercase();
            let value = part[eq_pos + 1..].trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            parts.insert(key, value.to_string());
        }
    }

    let algorithm = parts.get("algorithm")?.clone();
    if algorithm != "ed25519" {
        return None;
    }

    let signature = parts.get("signature")?.clone();

    let headers = parts
        .get("headers")
        .map(|h| h.split_whitespace().map(String::from).collect())
        .unwrap_or_default();

    Some(ParsedSignatureHeader {
        key_id: parts.get("keyid").cloned(),
        algorithm,
        signature,
        headers,
    })
}
