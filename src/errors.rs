//! Tollgate error types.
//!
//! Every condition a caller may want to branch on has its own variant.
//! Payloads are plain strings (or boxed snapshots) so the enum stays `Clone`,
//! which lets the heartbeat monitor publish the same error on its status
//! channel and its terminal-failure channel.

use crate::license::License;
use thiserror::Error;

/// Why a signed API response was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseRejection {
    /// `Keygen-Signature` or `Date` header missing.
    #[error("signature or date header missing")]
    SignatureMissing,

    /// The signature header could not be parsed or does not verify.
    #[error("signature does not verify")]
    SignatureInvalid,

    /// The `Digest` header does not match the body.
    #[error("digest mismatch")]
    DigestMismatch,

    /// A non-empty body arrived without a `Digest` header, so the
    /// signature does not cover it.
    #[error("digest header missing")]
    DigestMissing,

    /// Response is older than the freshness window (possible replay).
    #[error("response too old ({age_seconds}s)")]
    TooOld {
        /// Age of the response in seconds.
        age_seconds: i64,
    },

    /// Response is dated in the future beyond tolerance.
    #[error("response dated in the future")]
    FromFuture,
}

/// Errors returned by every Tollgate operation.
#[derive(Debug, Clone, Error)]
pub enum TollgateError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// License is valid but not activated for the given fingerprint(s).
    #[error("License is not activated for this machine")]
    NotActivated(Box<License>),

    /// License has expired.
    #[error("License has expired")]
    Expired(Box<License>),

    /// License has been suspended.
    #[error("License is suspended")]
    Suspended(Box<License>),

    /// License has more machines than its policy allows.
    #[error("License has too many machines")]
    TooManyMachines(Box<License>),

    /// Policy requires a heartbeat and none has been sent.
    #[error("License requires a heartbeat that has not been started")]
    HeartbeatRequired(Box<License>),

    /// The machine's heartbeat has died.
    #[error("Machine heartbeat is dead")]
    HeartbeatDead(Box<License>),

    /// Activating another machine would exceed the policy limit.
    #[error("Machine limit exceeded")]
    MachineLimitExceeded,

    /// Fingerprint is already activated for a different license.
    #[error("Fingerprint already activated for another license")]
    AlreadyActivated,

    /// Resource does not exist (or has been revoked) on the remote authority.
    #[error("Resource not found")]
    NotFound,

    /// Offline signature verification failed.
    #[error("Not genuine")]
    NotGenuine,

    /// A signed API response could not be authenticated.
    #[error("Response not genuine: {0}")]
    ResponseNotGenuine(ResponseRejection),

    /// License is invalid for a reason without its own variant.
    #[error("Invalid license ({code}){}", .detail.as_deref().map(|d| format!(": {}", d)).unwrap_or_default())]
    Invalid {
        /// Validation or error code reported by the authority.
        code: String,
        /// Human readable detail, if any.
        detail: Option<String>,
    },

    /// Token or license credential was rejected.
    #[error("Authentication token rejected: {0}")]
    TokenInvalid(String),

    /// No newer release is available.
    #[error("No upgrade available")]
    NotAvailable,

    /// Transport failure, rate limiting or a server-side error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Release artifact could not be downloaded intact.
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// Release artifact signature is missing or invalid.
    #[error("Release signature invalid")]
    SignatureInvalid,

    /// Filesystem error while installing a release.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Response body could not be interpreted.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A heartbeat monitor is already running for this machine.
    #[error("Heartbeat monitor already running")]
    MonitorRunning,
}

impl TollgateError {
    /// Whether the failure may succeed on retry without any change.
    ///
    /// Only network-level failures qualify. Security failures never do.
    pub fn is_transient(&self) -> bool {
        matches!(self, TollgateError::NetworkError(_))
    }

    /// The license snapshot carried by validation outcomes, if any.
    pub fn license(&self) -> Option<&License> {
        match self {
            TollgateError::NotActivated(l)
            | TollgateError::Expired(l)
            | TollgateError::Suspended(l)
            | TollgateError::TooManyMachines(l)
            | TollgateError::HeartbeatRequired(l)
            | TollgateError::HeartbeatDead(l) => Some(l),
            _ => None,
        }
    }
}
