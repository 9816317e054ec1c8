//! Artifact verification before install.

use crate::crypto::digest::sha512_b64;
use crate::crypto::keys::UpgradeKey;
use crate::crypto::verify::constant_time_eq;
use crate::upgrade::release::Release;
use crate::TollgateError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::PathBuf;

/// How an installed artifact was authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Signature verified with the upgrade key.
    Verified,
    /// No upgrade key configured; the artifact was installed unauthenticated.
    Unverified,
}

/// Result of a successful install.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    /// Path that now holds the new executable.
    pub path: PathBuf,
    /// Installed version.
    pub version: semver::Version,
    /// How the artifact was authenticated.
    pub verification: Verification,
}

/// Check downloaded bytes against the release's size, checksum and signature.
///
/// Nothing is written to disk here; callers only install after this passes.
///
/// # Errors
/// - `DownloadFailed` - size or checksum mismatch
/// - `SignatureInvalid` - upgrade key configured and signature missing or invalid
pub fn verify_artifact(
    release: &Release,
    bytes: &[u8],
    upgrade_key: Option<&UpgradeKey>,
) -> Result<Verification, TollgateError> {
    if let Some(size) = release.size {
        if size != bytes.len() as u64 {
            return Err(TollgateError::DownloadFailed(format!(
                "expected {} bytes, got {}",
                size,
                bytes.len()
            )));
        }
    }

    if let Some(expected) = &release.checksum {
        let actual = sha512_b64(bytes);
        if !constant_time_eq(actual.as_bytes(), expected.trim().as_bytes()) {
            return Err(TollgateError::DownloadFailed("checksum mismatch".to_string()));
        }
    }

    let Some(key) = upgrade_key else {
        tracing::warn!(
            version = %release.version,
            "no upgrade key configured, installing release without signature verification"
        );
        return Ok(Verification::Unverified);
    };

    let signature = release
        .signature
        .as_deref()
        .ok_or(TollgateError::SignatureInvalid)?;
    let signature = STANDARD
        .decode(signature.trim())
        .map_err(|_| TollgateError::SignatureInvalid)?;

    key.verify_artifact(bytes, &signature).map_err(|_| {
        tracing::error!(version = %release.version, "release signature invalid");
        TollgateError::SignatureInvalid
    })?;

    tracing::info!(version = %release.version, "release signature verified");
    Ok(Verification::Verified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upgrade::release::Channel;
    use ed25519_dalek::SigningKey;
    use sha2::{Digest, Sha512};

    const SECRET_HEX: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
    const PUBLIC_HEX: &str = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";
    const ARTIFACT: &[u8] = b"\x7fELF new build";

    fn sign(bytes: &[u8]) -> String {
        let secret: [u8; 32] = hex::decode(SECRET_HEX).unwrap().try_into().unwrap();
        let signature = SigningKey::from_bytes(&secret)
            .sign_prehashed(Sha512::new_with_prefix(bytes), None)
            .unwrap();
        STANDARD.encode(signature.to_bytes())
    }

    fn release(signature: Option<String>, checksum: Option<String>) -> Release {
        Release {
            id: "rel-1".into(),
            version: semver::Version::new(2, 0, 0),
            channel: Channel::Stable,
            platform: "linux_x86_64".into(),
            filename: "app_linux_x86_64".into(),
            url: "https://cdn.example.com/app".into(),
            signature,
            checksum,
            size: Some(ARTIFACT.len() as u64),
        }
    }

    fn key() -> UpgradeKey {
        UpgradeKey::from_hex(PUBLIC_HEX).unwrap()
    }

    #[test]
    fn test_verified() {
        let release = release(Some(sign(ARTIFACT)), Some(sha512_b64(ARTIFACT)));
        assert_eq!(
            verify_artifact(&release, ARTIFACT, Some(&key())).unwrap(),
            Verification::Verified
        );
    }

    #[test]
    fn test_unverified_without_key() {
        let release = release(None, None);
        assert_eq!(
            verify_artifact(&release, ARTIFACT, None).unwrap(),
            Verification::Unverified
        );
    }

    #[test]
    fn test_missing_signature_with_key() {
        let release = release(None, None);
        assert!(matches!(
            verify_artifact(&release, ARTIFACT, Some(&key())),
            Err(TollgateError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_signature_over_other_bytes() {
        let release = release(Some(sign(b"something else")), None);
        assert!(matches!(
            verify_artifact(&release, ARTIFACT, Some(&key())),
            Err(TollgateError::SignatureInvalid)
        ));

        let garbage = self::release(Some("not base64!".into()), None);
        assert!(matches!(
            verify_artifact(&garbage, ARTIFACT, Some(&key())),
            Err(TollgateError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_checksum_and_size_mismatch() {
        let bad_checksum = release(Some(sign(ARTIFACT)), Some(sha512_b64(b"other")));
        assert!(matches!(
            verify_artifact(&bad_checksum, ARTIFACT, Some(&key())),
            Err(TollgateError::DownloadFailed(_))
        ));

        let mut truncated = release(Some(sign(ARTIFACT)), None);
        truncated.size = Some(1);
        assert!(matches!(
            verify_artifact(&truncated, ARTIFACT, None),
            Err(TollgateError::DownloadFailed(_))
        ));
    }
}
