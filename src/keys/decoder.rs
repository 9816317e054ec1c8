//! Offline license key decoding.
//!
//! Signed license keys use the format `<tag>/<payload>.<signature>` where
//! both segments are base64url and the signature covers `<tag>/<payload>`
//! (the encoded payload segment, not the decoded JSON). The tag selects the
//! scheme:
//!
//! | tag      | scheme      |
//! |----------|-------------|
//! | `key`    | Ed25519     |
//! | `key+ph` | Ed25519ph   |
//!
//! Anything else is treated as unsigned and never decodes. No network access
//! is involved.

use crate::crypto::keys::AccountKey;
use crate::crypto::verify::SigningScheme;
use crate::TollgateError;
use base64::alphabet::URL_SAFE;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

/// Tag for Ed25519-signed keys.
pub const ED25519_TAG: &str = "key";

/// Tag for Ed25519ph-signed keys.
pub const ED25519PH_TAG: &str = "key+ph";

/// base64url, with or without padding.
const KEY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Verified claims decoded from a license key.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    scheme: SigningScheme,
    payload: Vec<u8>,
    claims: serde_json::Value,
}

impl Dataset {
    /// Scheme the key was signed with.
    pub fn scheme(&self) -> SigningScheme {
        self.scheme
    }

    /// Raw decoded payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// All claims.
    pub fn claims(&self) -> &serde_json::Value {
        &self.claims
    }

    /// Typed claim by name. `Ok(None)` when absent; `Invalid` when the
    /// value has the wrong shape.
    pub fn claim<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, TollgateError> {
        match self.claims.get(name) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| TollgateError::Invalid {
                    code: "INVALID_CLAIM".to_string(),
                    detail: Some(format!("{}: {}", name, e)),
                }),
        }
    }

    /// Expiry claim: top-level `expiry`, else `license.expiry`.
    pub fn expiry(&self) -> Result<Option<DateTime<Utc>>, TollgateError> {
        let raw = self
            .claims
            .get("expiry")
            .or_else(|| self.claims.get("license").and_then(|l| l.get("expiry")))
            .and_then(|v| v.as_str());

        raw.map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| TollgateError::Invalid {
                    code: "INVALID_CLAIM".to_string(),
                    detail: Some(format!("expiry: {}", e)),
                })
        })
        .transpose()
    }

    /// Entitlement codes. Accepts plain strings or objects with a `code`.
    pub fn entitlements(&self) -> Vec<String> {
        self.claims
            .get("entitlements")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        item.as_str()
                            .or_else(|| item.get("code").and_then(|c| c.as_str()))
                            .map(String::from)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Scheme selected by a key tag.
pub fn tag_scheme(tag: &str) -> SigningScheme {
    match tag {
        ED25519_TAG => SigningScheme::Ed25519,
        ED25519PH_TAG => SigningScheme::Ed25519ph,
        _ => SigningScheme::Unsigned,
    }
}

/// Scheme indicated by a license key, without verifying it.
pub fn detect_scheme(license_key: &str) -> SigningScheme {
    license_key
        .trim()
        .split_once('/')
        .map(|(tag, _)| tag_scheme(tag))
        .unwrap_or(SigningScheme::Unsigned)
}

/// Verify and decode a signed license key.
///
/// When `expected` is given, a key tagged with any other scheme is rejected
/// as `Invalid` before any signature work.
///
/// # Errors
/// - `Invalid` - scheme mismatch, or the verified payload is not a JSON object
/// - `NotGenuine` - malformed key, unsigned key, or signature mismatch
pub fn decode(
    account_key: &AccountKey,
    license_key: &str,
    expected: Option<SigningScheme>,
) -> Result<Dataset, TollgateError> {
    let license_key = license_key.trim();
    let scheme = detect_scheme(license_key);

    if let Some(expected) = expected {
        if expected != scheme {
            tracing::warn!(%expected, actual = %scheme, "license key scheme mismatch");
            return Err(TollgateError::Invalid {
                code: "SCHEME_MISMATCH".to_string(),
                detail: Some(format!("expected {}, key uses {}", expected, scheme)),
            });
        }
    }

    if scheme == SigningScheme::Unsigned {
        return Err(TollgateError::NotGenuine);
    }

    let (signing_data, signature_b64) = license_key
        .rsplit_once('.')
        .ok_or(TollgateError::NotGenuine)?;
    let (_, payload_b64) = signing_data
        .split_once('/')
        .ok_or(TollgateError::NotGenuine)?;

    let signature = KEY_ENGINE
        .decode(signature_b64)
        .map_err(|_| TollgateError::NotGenuine)?;

    account_key.verify_scheme(scheme, signing_data.as_bytes(), &signature)?;

    let payload = KEY_ENGINE
        .decode(payload_b64)
        .map_err(|e| invalid_payload(format!("base64: {}", e)))?;
    let claims: serde_json::Value =
        serde_json::from_slice(&payload).map_err(|e| invalid_payload(format!("JSON: {}", e)))?;
    if !claims.is_object() {
        return Err(invalid_payload("not a JSON object".to_string()));
    }

    tracing::debug!(%scheme, "license key verified");

    Ok(Dataset {
        scheme,
        payload,
        claims,
    })
}

fn invalid_payload(detail: String) -> TollgateError {
    TollgateError::Invalid {
        code: "INVALID_PAYLOAD".to_string(),
        detail: Some(detail),
    }
}
