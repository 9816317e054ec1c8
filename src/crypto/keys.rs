//! Typed trust roots.
//!
//! The account key authenticates API responses and license keys. The upgrade
//! key authenticates release artifacts. They are separate types with no
//! conversion between them, so one can never be passed where the other is
//! expected.

use crate::crypto::verify::{verify_with_key, SigningScheme, PUBLIC_KEY_LENGTH};
use crate::TollgateError;
use ed25519_dalek::VerifyingKey;
use std::fmt;

fn decode_public_key(label: &str, hex_key: &str) -> Result<VerifyingKey, TollgateError> {
    let hex_key = hex_key.trim();
    if hex_key.len() != PUBLIC_KEY_LENGTH * 2 {
        return Err(TollgateError::Config(format!(
            "{} must be {} hex characters, got {}",
            label,
            PUBLIC_KEY_LENGTH * 2,
            hex_key.len()
        )));
    }

    let bytes = hex::decode(hex_key)
        .map_err(|e| TollgateError::Config(format!("Invalid {} hex: {}", label, e)))?;

    let key_array: [u8; PUBLIC_KEY_LENGTH] = bytes
        .try_into()
        .map_err(|_| TollgateError::Config(format!("{} must be 32 bytes", label)))?;

    VerifyingKey::from_bytes(&key_array)
        .map_err(|e| TollgateError::Config(format!("Invalid Ed25519 {}: {}", label, e)))
}

/// Account verify key: authenticates API responses and license keys.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AccountKey(VerifyingKey);

impl AccountKey {
    /// Parse a hex-encoded Ed25519 public key (64 characters).
    pub fn from_hex(hex_key: &str) -> Result<Self, TollgateError> {
        decode_public_key("account public key", hex_key).map(Self)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        self.0.as_bytes()
    }

    /// Verify a plain Ed25519 signature (API responses).
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), TollgateError> {
        verify_with_key(SigningScheme::Ed25519, &self.0, message, signature)
    }

    /// Verify under an explicit scheme (license keys may use either variant).
    pub fn verify_scheme(
        &self,
        scheme: SigningScheme,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), TollgateError> {
        verify_with_key(scheme, &self.0, message, signature)
    }
}

impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountKey({})", hex::encode(self.as_bytes()))
    }
}

/// Personal upgrade-signing key: authenticates release artifacts only.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct UpgradeKey(VerifyingKey);

impl UpgradeKey {
    /// Parse a hex-encoded Ed25519 public key (64 characters).
    pub fn from_hex(hex_key: &str) -> Result<Self, TollgateError> {
        decode_public_key("upgrade public key", hex_key).map(Self)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        self.0.as_bytes()
    }

    /// Verify an Ed25519ph signature over an artifact.
    pub fn verify_artifact(&self, artifact: &[u8], signature: &[u8]) -> Result<(), TollgateError> {
        verify_with_key(SigningScheme::Ed25519ph, &self.0, artifact, signature)
    }
}

impl fmt::Debug for UpgradeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UpgradeKey({})", hex::encode(self.as_bytes()))
    }
}
