//! Self-upgrade: discover a newer release, verify it, and replace the
//! running executable.
//!
//! Artifacts are authenticated with the configured [`UpgradeKey`] (Ed25519ph)
//! before anything touches the target path. Without an upgrade key the
//! install is explicitly reported as [`Verification::Unverified`].
//!
//! [`UpgradeKey`]: crate::crypto::keys::UpgradeKey

pub mod install;
pub mod release;
pub mod replace;

pub use install::{InstallOutcome, Verification};
pub use release::{Channel, Release, UpgradeOptions};

use crate::client::transport::{ApiRequest, Method};
use crate::manager::{expect_success, LicenseClient};
use crate::protocol::models::{parse_document, ArtifactAttributes, Document, ReleaseAttributes};
use crate::TollgateError;
use semver::Version;
use std::path::PathBuf;

/// Checks for and installs upgrades through a [`LicenseClient`].
#[derive(Debug, Clone)]
pub struct Upgrader {
    client: LicenseClient,
}

impl Upgrader {
    /// Create an upgrader sharing `client`'s configuration and transport.
    pub fn new(client: LicenseClient) -> Self {
        Self { client }
    }

    /// Find a release strictly newer than `options.current_version` that is
    /// visible on `options.channel`, and resolve its artifact.
    ///
    /// # Errors
    /// - `NotAvailable` - nothing newer on the channel, or no artifact for
    ///   the requested platform
    /// - `NetworkError` - transport failure, rate limit or server error
    /// - `ResponseNotGenuine` - the response failed authentication
    pub fn check_for_upgrade(&self, options: &UpgradeOptions) -> Result<Release, TollgateError> {
        let config = self.client.config();

        let mut path = format!(
            "{}/releases/{}/upgrade?channel={}",
            config.account_path(),
            urlencoding::encode(&options.current_version.to_string()),
            options.channel
        );
        if let Some(product) = &config.product {
            path.push_str(&format!("&product={}", urlencoding::encode(product)));
        }

        let response = self.client.send(ApiRequest::new(Method::Get, path))?;
        if matches!(response.status, 204 | 404) {
            tracing::debug!(current = %options.current_version, "no upgrade available");
            return Err(TollgateError::NotAvailable);
        }
        let response = expect_success(response)?;

        let doc: Document<ReleaseAttributes> = parse_document(&response.body)?;
        let release_id = doc.data.id;
        let version = Version::parse(&doc.data.attributes.version).map_err(|e| {
            TollgateError::Protocol(format!(
                "Invalid release version {:?}: {}",
                doc.data.attributes.version, e
            ))
        })?;
        let channel: Channel = doc.data.attributes.channel.parse()?;

        if version <= options.current_version || !options.channel.includes(channel) {
            tracing::debug!(
                current = %options.current_version,
                candidate = %version,
                %channel,
                "candidate release not eligible"
            );
            return Err(TollgateError::NotAvailable);
        }

        let filename = match &options.filename {
            Some(filename) => filename.clone(),
            None => format!("{}_{}", self.program_name()?, options.platform),
        };

        let path = format!(
            "{}/releases/{}/artifacts/{}",
            config.account_path(),
            urlencoding::encode(&release_id),
            urlencoding::encode(&filename)
        );
        let response = self
            .client
            .send(ApiRequest::new(Method::Get, path).without_redirect())?;
        if response.status == 404 {
            tracing::debug!(%version, %filename, "no artifact for this platform");
            return Err(TollgateError::NotAvailable);
        }
        let response = expect_success(response)?;
        let artifact: Document<ArtifactAttributes> = parse_document(&response.body)?;

        let url = artifact
            .data
            .links
            .and_then(|l| l.redirect)
            .ok_or_else(|| TollgateError::Protocol("Artifact has no download link".to_string()))?;
        let attrs = artifact.data.attributes;

        tracing::info!(current = %options.current_version, available = %version, %channel, "upgrade available");

        Ok(Release {
            id: release_id,
            version,
            channel,
            platform: attrs.platform.unwrap_or_else(|| options.platform.clone()),
            filename: attrs.filename,
            url,
            signature: attrs.signature,
            checksum: attrs.checksum,
            size: attrs.filesize,
        })
    }

    /// Download, verify and install `release` over the target executable.
    ///
    /// Verification happens entirely in memory; the target is only touched
    /// once it has passed.
    ///
    /// # Errors
    /// - `DownloadFailed` - download, size or checksum failure
    /// - `SignatureInvalid` - upgrade key configured and the signature does not verify
    /// - `IoError` - the executable could not be replaced
    pub fn install(&self, release: Release) -> Result<InstallOutcome, TollgateError> {
        let target = self.target_path()?;

        tracing::info!(version = %release.version, url = %release.url, "downloading release");
        let bytes = self.client.transport().download(&release.url)?;

        let verification =
            install::verify_artifact(&release, &bytes, self.client.config().upgrade_key.as_ref())?;

        replace::replace_executable(&target, &bytes)?;

        Ok(InstallOutcome {
            path: target,
            version: release.version,
            verification,
        })
    }

    /// Executable replaced by installs.
    pub fn target_path(&self) -> Result<PathBuf, TollgateError> {
        match &self.client.config().executable {
            Some(path) => Ok(path.clone()),
            None => std::env::current_exe()
                .map_err(|e| TollgateError::IoError(format!("Failed to locate executable: {}", e))),
        }
    }

    fn program_name(&self) -> Result<String, TollgateError> {
        let target = self.target_path()?;
        target
            .file_stem()
            .and_then(|s| s.to_str())
            .map(String::from)
            .ok_or_else(|| {
                TollgateError::IoError(format!("Cannot derive program name from {}", target.display()))
            })
    }
}
