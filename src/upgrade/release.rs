//! Release channels, upgrade options and release descriptors.

use crate::config::host_platform;
use crate::TollgateError;
use semver::Version;
use std::fmt;
use std::str::FromStr;

/// Release track. Each channel also sees every more stable channel:
/// `stable ⊂ rc ⊂ beta ⊂ alpha ⊂ dev`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Channel {
    /// General availability.
    #[default]
    Stable,
    /// Release candidates.
    Rc,
    /// Beta builds.
    Beta,
    /// Alpha builds.
    Alpha,
    /// Development builds.
    Dev,
}

impl Channel {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Stable => "stable",
            Channel::Rc => "rc",
            Channel::Beta => "beta",
            Channel::Alpha => "alpha",
            Channel::Dev => "dev",
        }
    }

    /// Whether a release published on `other` is visible from this channel.
    pub fn includes(&self, other: Channel) -> bool {
        other <= *self
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = TollgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stable" => Ok(Channel::Stable),
            "rc" => Ok(Channel::Rc),
            "beta" => Ok(Channel::Beta),
            "alpha" => Ok(Channel::Alpha),
            "dev" => Ok(Channel::Dev),
            other => Err(TollgateError::Protocol(format!("Unknown channel: {}", other))),
        }
    }
}

/// What to look for in an upgrade check.
#[derive(Debug, Clone)]
pub struct UpgradeOptions {
    /// Version currently running.
    pub current_version: Version,
    /// Most unstable channel the caller accepts.
    pub channel: Channel,
    /// Target platform, e.g. `linux_x86_64`.
    pub platform: String,
    /// Artifact filename. Defaults to `<program>_<platform>`.
    pub filename: Option<String>,
}

impl UpgradeOptions {
    /// Options for the stable channel on this host.
    pub fn new(current_version: &str) -> Result<Self, TollgateError> {
        let current_version = Version::parse(current_version).map_err(|e| {
            TollgateError::Config(format!("Invalid current version {:?}: {}", current_version, e))
        })?;
        Ok(Self {
            current_version,
            channel: Channel::Stable,
            platform: host_platform(),
            filename: None,
        })
    }

    /// Accept releases up to `channel`.
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    /// Target another platform.
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Use an explicit artifact filename.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// An installable release. Consumed by [`Upgrader::install`](super::Upgrader::install).
#[derive(Debug)]
pub struct Release {
    /// Release ID.
    pub id: String,
    /// Release version.
    pub version: Version,
    /// Channel the release was published on.
    pub channel: Channel,
    /// Artifact platform.
    pub platform: String,
    /// Artifact filename.
    pub filename: String,
    /// Download URL for the artifact.
    pub url: String,
    /// Base64 Ed25519ph signature over the artifact.
    pub signature: Option<String>,
    /// Base64 SHA-512 checksum of the artifact.
    pub checksum: Option<String>,
    /// Artifact size in bytes.
    pub size: Option<u64>,
}
