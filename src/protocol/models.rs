//! JSON:API documents exchanged with the licensing API.
//!
//! Field names follow the wire format.

#![allow(missing_docs)]

use crate::TollgateError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;

/// Generic resource object.
#[derive(Debug, Clone, Deserialize)]
pub struct Resource<A> {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: A,
    #[serde(default)]
    pub relationships: HashMap<String, Relationship>,
    #[serde(default)]
    pub links: Option<ResourceLinks>,
}

impl<A> Resource<A> {
    /// ID of a to-one relationship, if present.
    pub fn related_id(&self, name: &str) -> Option<String> {
        self.relationships.get(name).and_then(Relationship::id)
    }
}

/// Relationship object. Only to-one linkage is interpreted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl Relationship {
    /// Linked resource ID for a to-one relationship.
    pub fn id(&self) -> Option<String> {
        self.data
            .as_ref()
            .and_then(|d| d.get("id"))
            .and_then(|id| id.as_str())
            .map(String::from)
    }
}

/// Links attached to a resource.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceLinks {
    #[serde(default)]
    pub redirect: Option<String>,
    #[serde(rename = "self", default)]
    pub self_link: Option<String>,
}

/// Single-resource document.
#[derive(Debug, Clone, Deserialize)]
pub struct Document<A> {
    pub data: Resource<A>,
}

/// Collection document.
#[derive(Debug, Clone, Deserialize)]
pub struct ListDocument<A> {
    #[serde(default = "Vec::new")]
    pub data: Vec<Resource<A>>,
}

/// Validation response.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateDocument {
    pub meta: ValidateMeta,
    #[serde(default)]
    pub data: Option<Resource<LicenseAttributes>>,
}

/// Validation result metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateMeta {
    pub valid: bool,
    pub code: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
}

/// License attributes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseAttributes {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub uses: Option<u64>,
    #[serde(default)]
    pub max_machines: Option<u64>,
    #[serde(default)]
    pub max_uses: Option<u64>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Machine attributes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineAttributes {
    pub fingerprint: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub cores: Option<u32>,
    #[serde(default)]
    pub require_heartbeat: bool,
    #[serde(default)]
    pub heartbeat_status: Option<String>,
    #[serde(default)]
    pub heartbeat_duration: Option<u64>,
    #[serde(default)]
    pub last_heartbeat: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
}

/// Entitlement attributes.
#[derive(Debug, Clone, Deserialize)]
pub struct EntitlementAttributes {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Release attributes.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAttributes {
    pub version: String,
    pub channel: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Artifact attributes.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactAttributes {
    pub filename: String,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub checksum: Option<String>,
}

/// Error document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDocument {
    #[serde(default)]
    pub errors: Vec<ApiErrorObject>,
}

/// A single API error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorObject {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl ErrorDocument {
    /// Code of the first error, if any.
    pub fn first_code(&self) -> Option<&str> {
        self.errors.iter().find_map(|e| e.code.as_deref())
    }

    /// Human readable summary of the first error.
    pub fn summary(&self) -> String {
        self.errors
            .first()
            .map(|e| {
                e.detail
                    .clone()
                    .or_else(|| e.title.clone())
                    .unwrap_or_else(|| "unknown error".to_string())
            })
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

/// Parse a JSON body into a document type.
pub fn parse_document<T: DeserializeOwned>(body: &[u8]) -> Result<T, TollgateError> {
    serde_json::from_slice(body)
        .map_err(|e| TollgateError::Protocol(format!("Failed to parse response: {}", e)))
}

/// Parse an error body; malformed bodies yield an empty document.
pub fn parse_errors(body: &[u8]) -> ErrorDocument {
    serde_json::from_slice(body).unwrap_or_default()
}
