//! License snapshots produced by validation.

use crate::config::TollgateConfig;
use crate::protocol::models::{LicenseAttributes, Resource, ValidateMeta};
use crate::TollgateError;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Lifecycle status reported by the remote authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseStatus {
    /// In good standing.
    Active,
    /// Not used recently.
    Inactive,
    /// Close to its expiry.
    Expiring,
    /// Past its expiry.
    Expired,
    /// Suspended by the vendor.
    Suspended,
    /// Owner has been banned.
    Banned,
    /// Status the client does not recognise.
    Unknown,
}

impl LicenseStatus {
    /// Parse the wire status string. Unrecognised values map to `Unknown`.
    pub fn parse(status: &str) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "ACTIVE" => LicenseStatus::Active,
            "INACTIVE" => LicenseStatus::Inactive,
            "EXPIRING" => LicenseStatus::Expiring,
            "EXPIRED" => LicenseStatus::Expired,
            "SUSPENDED" => LicenseStatus::Suspended,
            "BANNED" => LicenseStatus::Banned,
            _ => LicenseStatus::Unknown,
        }
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LicenseStatus::Active => "ACTIVE",
            LicenseStatus::Inactive => "INACTIVE",
            LicenseStatus::Expiring => "EXPIRING",
            LicenseStatus::Expired => "EXPIRED",
            LicenseStatus::Suspended => "SUSPENDED",
            LicenseStatus::Banned => "BANNED",
            LicenseStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Immutable snapshot of a license as of one validation.
///
/// Re-validating produces a new value; nothing here is updated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct License {
    /// License ID.
    pub id: String,
    /// License key, when the authority echoes it back.
    pub key: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Lifecycle status.
    pub status: LicenseStatus,
    /// Expiry, if the policy sets one.
    pub expiry: Option<DateTime<Utc>>,
    /// Maximum number of machines the policy allows.
    pub max_machines: Option<u64>,
    /// Maximum number of uses the policy allows.
    pub max_uses: Option<u64>,
    /// Uses recorded so far.
    pub uses: Option<u64>,
    /// Account the license was validated against.
    pub account: String,
    /// Product scope. Configured product wins over the response relationship.
    pub product: Option<String>,
    /// Validation code (e.g. `VALID`, `NO_MACHINE`).
    pub code: String,
    /// Validation detail.
    pub detail: Option<String>,
    /// When this snapshot was taken (local clock).
    pub validated_at: DateTime<Utc>,
    /// Free-form metadata.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl License {
    /// Build a snapshot from a validation document.
    pub(crate) fn from_validation(
        resource: &Resource<LicenseAttributes>,
        meta: &ValidateMeta,
        config: &TollgateConfig,
        now: DateTime<Utc>,
    ) -> Result<Self, TollgateError> {
        let attrs = &resource.attributes;
        let expiry = attrs.expiry.as_deref().map(parse_timestamp).transpose()?;

        Ok(Self {
            id: resource.id.clone(),
            key: attrs.key.clone(),
            name: attrs.name.clone(),
            status: attrs
                .status
                .as_deref()
                .map(LicenseStatus::parse)
                .unwrap_or(LicenseStatus::Unknown),
            expiry,
            max_machines: attrs.max_machines,
            max_uses: attrs.max_uses,
            uses: attrs.uses,
            account: config.account.clone(),
            product: config
                .product
                .clone()
                .or_else(|| resource.related_id("product")),
            code: meta.code.clone(),
            detail: meta.detail.clone(),
            validated_at: now,
            metadata: attrs.metadata.clone(),
        })
    }

    /// Whether the license is past its expiry at `now`. Perpetual licenses never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.map(|e| now >= e).unwrap_or(false)
    }

    /// Time left until expiry, zero once expired. `None` for perpetual licenses.
    pub fn expires_in(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expiry
            .map(|e| if e > now { e - now } else { Duration::zero() })
    }
}

/// Parse an RFC 3339 timestamp from the API.
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, TollgateError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TollgateError::Protocol(format!("Invalid timestamp {:?}: {}", value, e)))
}
