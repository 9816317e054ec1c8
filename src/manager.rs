//! License client: the main public API for Tollgate.
//!
//! The `LicenseClient` is a stateless dispatcher over a [`Transport`]:
//! - Validation of a license key scoped to device fingerprints
//! - Machine activation (idempotent per fingerprint) and deactivation
//! - Heartbeat pings on behalf of [`HeartbeatMonitor`](crate::heartbeat::HeartbeatMonitor)
//!
//! When an account key is configured every response is authenticated
//! before its body is trusted.

use crate::client::http::HttpTransport;
use crate::client::transport::{ApiRequest, ApiResponse, Auth, Method, Transport};
use crate::clock::{Clock, SystemClock};
use crate::config::{host_platform, TollgateConfig};
use crate::crypto::pipeline::verify_response;
use crate::heartbeat::monitor::Heartbeat;
use crate::license::{parse_timestamp, License};
use crate::machine::Machine;
use crate::protocol::models::{
    parse_document, parse_errors, Document, EntitlementAttributes, ListDocument,
    MachineAttributes, ValidateDocument,
};
use crate::TollgateError;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::fmt;
use std::sync::Arc;

/// Main entry point for license operations.
///
/// Cheap to clone; clones share configuration and transport.
#[derive(Clone)]
pub struct LicenseClient {
    config: Arc<TollgateConfig>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
}

impl LicenseClient {
    /// Create a client talking HTTPS to the configured API.
    ///
    /// # Errors
    /// Returns an error if:
    /// - Configuration validation fails
    /// - HTTP client creation fails
    pub fn new(config: Arc<TollgateConfig>) -> Result<Self, TollgateError> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Ok(Self::from_parts(config, Arc::new(transport), Arc::new(SystemClock)))
    }

    /// Create a client over a custom transport.
    pub fn with_transport(
        config: Arc<TollgateConfig>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, TollgateError> {
        config.validate()?;
        Ok(Self::from_parts(config, transport, Arc::new(SystemClock)))
    }

    /// Replace the clock (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) fn from_parts(
        config: Arc<TollgateConfig>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            transport,
            clock,
        }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &TollgateConfig {
        &self.config
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Validate the configured license key, scoped to `fingerprints`.
    ///
    /// # Errors
    /// - `NotActivated` - valid license, but not for these fingerprints
    /// - `Expired`, `Suspended`, `TooManyMachines`, `HeartbeatRequired`,
    ///   `HeartbeatDead` - the license is not usable, snapshot attached
    /// - `NotFound` - the key does not exist
    /// - `Invalid` - any other rejection
    /// - `ResponseNotGenuine` - the response failed authentication
    /// - `NetworkError` - transport failure, rate limit or server error
    pub fn validate(&self, fingerprints: &[&str]) -> Result<License, TollgateError> {
        let key = self
            .config
            .license_key
            .as_deref()
            .ok_or_else(|| TollgateError::Config("license_key is required to validate".into()))?;

        let mut scope = serde_json::Map::new();
        if !fingerprints.is_empty() {
            scope.insert("fingerprints".into(), json!(fingerprints));
        }
        if let Some(product) = &self.config.product {
            scope.insert("product".into(), json!(product));
        }

        let body = json!({ "meta": { "key": key, "scope": scope } });
        let path = format!("{}/licenses/actions/validate-key", self.config.account_path());
        let response = self.send(ApiRequest::new(Method::Post, path).with_body(body))?;
        let response = expect_success(response)?;

        let doc: ValidateDocument = parse_document(&response.body)?;
        let meta = &doc.meta;

        let Some(resource) = doc.data.as_ref() else {
            tracing::info!(code = %meta.code, "license validation failed");
            return Err(match meta.code.as_str() {
                "NOT_FOUND" => TollgateError::NotFound,
                _ => TollgateError::Invalid {
                    code: meta.code.clone(),
                    detail: meta.detail.clone(),
                },
            });
        };

        let license = License::from_validation(resource, meta, &self.config, self.clock.now_utc())?;

        if meta.valid {
            tracing::info!(license = %license.id, "license valid");
            return Ok(license);
        }

        tracing::info!(license = %license.id, code = %meta.code, "license not valid");
        let boxed = Box::new(license);
        Err(match meta.code.as_str() {
            "NO_MACHINE" | "NO_MACHINES" | "FINGERPRINT_SCOPE_MISMATCH" => {
                TollgateError::NotActivated(boxed)
            }
            "EXPIRED" => TollgateError::Expired(boxed),
            "SUSPENDED" => TollgateError::Suspended(boxed),
            "TOO_MANY_MACHINES" => TollgateError::TooManyMachines(boxed),
            "HEARTBEAT_NOT_STARTED" => TollgateError::HeartbeatRequired(boxed),
            "HEARTBEAT_DEAD" => TollgateError::HeartbeatDead(boxed),
            _ => TollgateError::Invalid {
                code: meta.code.clone(),
                detail: meta.detail.clone(),
            },
        })
    }

    /// Activate `fingerprint` for `license`.
    ///
    /// Activating a fingerprint that is already active for the same license
    /// returns the existing machine.
    ///
    /// # Errors
    /// - `MachineLimitExceeded` - the policy's machine limit is reached
    /// - `AlreadyActivated` - fingerprint belongs to another license
    /// - `NetworkError` - transport failure, rate limit or server error
    pub fn activate(&self, license: &License, fingerprint: &str) -> Result<Machine, TollgateError> {
        let body = json!({
            "data": {
                "type": "machines",
                "attributes": {
                    "fingerprint": fingerprint,
                    "platform": host_platform(),
                    "cores": std::thread::available_parallelism().ok().map(|n| n.get()),
                },
                "relationships": {
                    "license": { "data": { "type": "licenses", "id": license.id } }
                }
            }
        });

        let path = format!("{}/machines", self.config.account_path());
        let response = self.send(ApiRequest::new(Method::Post, path).with_body(body))?;

        if !response.is_success() {
            let errors = parse_errors(&response.body);
            return match errors.first_code() {
                Some("FINGERPRINT_TAKEN") => self.existing_activation(license, fingerprint),
                Some("MACHINE_LIMIT_EXCEEDED") => Err(TollgateError::MachineLimitExceeded),
                _ => Err(status_error(&response)),
            };
        }

        let doc: Document<MachineAttributes> = parse_document(&response.body)?;
        let machine = Machine::from_resource(doc.data, self.clone())?;
        tracing::info!(machine = %machine.id, license = %license.id, "machine activated");
        Ok(machine)
    }

    /// Resolve a taken fingerprint: same license is success, anything else is a conflict.
    fn existing_activation(
        &self,
        license: &License,
        fingerprint: &str,
    ) -> Result<Machine, TollgateError> {
        let machine = match self.machine(fingerprint) {
            Ok(machine) => machine,
            Err(TollgateError::NotFound) => return Err(TollgateError::AlreadyActivated),
            Err(e) => return Err(e),
        };

        if machine.license_id.as_deref() == Some(license.id.as_str()) {
            tracing::info!(machine = %machine.id, "fingerprint already activated for this license");
            Ok(machine)
        } else {
            tracing::warn!(fingerprint, "fingerprint activated for another license");
            Err(TollgateError::AlreadyActivated)
        }
    }

    /// Look up a machine by ID or fingerprint.
    pub fn machine(&self, id_or_fingerprint: &str) -> Result<Machine, TollgateError> {
        let path = format!(
            "{}/machines/{}",
            self.config.account_path(),
            urlencoding::encode(id_or_fingerprint)
        );
        let response = self.send(ApiRequest::new(Method::Get, path))?;
        let response = expect_success(response)?;
        let doc: Document<MachineAttributes> = parse_document(&response.body)?;
        Machine::from_resource(doc.data, self.clone())
    }

    /// Deactivate `machine`.
    ///
    /// The heartbeat monitor is stopped first, so no heartbeat is sent after
    /// this returns. On any other failure the monitor is restarted (if it
    /// was running) and the machine stays active.
    ///
    /// # Errors
    /// - `NotFound` - already gone on the authority (machine marked deactivated)
    /// - `NetworkError` - transport failure, rate limit or server error
    /// - `ResponseNotGenuine`, `TokenInvalid`, `Invalid` - rejected; still active
    pub fn deactivate(&self, machine: &mut Machine) -> Result<(), TollgateError> {
        let was_monitoring = machine.stop_monitor();

        let path = format!(
            "{}/machines/{}",
            self.config.account_path(),
            urlencoding::encode(&machine.id)
        );
        let result = self
            .send(ApiRequest::new(Method::Delete, path))
            .and_then(expect_success);

        match result {
            Ok(_) => {
                machine.mark_deactivated();
                tracing::info!(machine = %machine.id, "machine deactivated");
                Ok(())
            }
            Err(TollgateError::NotFound) => {
                machine.mark_deactivated();
                tracing::warn!(machine = %machine.id, "machine already removed");
                Err(TollgateError::NotFound)
            }
            Err(e) => {
                if was_monitoring {
                    tracing::warn!(machine = %machine.id, error = %e, "deactivation failed, resuming heartbeat");
                    if let Err(respawn) = machine.resume_monitor() {
                        tracing::error!(
                            machine = %machine.id,
                            error = %respawn,
                            "failed to resume heartbeat monitor"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    /// List machines activated for `license`.
    pub fn machines(&self, license: &License) -> Result<Vec<Machine>, TollgateError> {
        let path = format!(
            "{}/licenses/{}/machines",
            self.config.account_path(),
            urlencoding::encode(&license.id)
        );
        let response = self.send(ApiRequest::new(Method::Get, path))?;
        let response = expect_success(response)?;
        let doc: ListDocument<MachineAttributes> = parse_document(&response.body)?;
        doc.data
            .into_iter()
            .map(|r| Machine::from_resource(r, self.clone()))
            .collect()
    }

    /// Entitlement codes attached to `license`.
    pub fn entitlements(&self, license: &License) -> Result<Vec<String>, TollgateError> {
        let path = format!(
            "{}/licenses/{}/entitlements",
            self.config.account_path(),
            urlencoding::encode(&license.id)
        );
        let response = self.send(ApiRequest::new(Method::Get, path))?;
        let response = expect_success(response)?;
        let doc: ListDocument<EntitlementAttributes> = parse_document(&response.body)?;
        Ok(doc.data.into_iter().map(|r| r.attributes.code).collect())
    }

    /// Send a heartbeat ping for `machine_id`.
    pub fn ping(&self, machine_id: &str) -> Result<DateTime<Utc>, TollgateError> {
        let path = format!(
            "{}/machines/{}/actions/ping",
            self.config.account_path(),
            urlencoding::encode(machine_id)
        );
        let response = self.send(ApiRequest::new(Method::Post, path))?;
        let response = expect_success(response)?;
        let doc: Document<MachineAttributes> = parse_document(&response.body)?;

        match doc.data.attributes.last_heartbeat.as_deref() {
            Some(ts) => parse_timestamp(ts),
            None => Ok(self.clock.now_utc()),
        }
    }

    /// Credential for authenticated endpoints: token, else license key.
    pub(crate) fn auth(&self) -> Auth {
        if let Some(token) = &self.config.token {
            Auth::Bearer(token.clone())
        } else if let Some(key) = &self.config.license_key {
            Auth::LicenseKey(key.clone())
        } else {
            Auth::None
        }
    }

    /// Send a request with the configured credential and, when an account
    /// key is configured, authenticate the response before anything reads it.
    pub(crate) fn send(&self, request: ApiRequest) -> Result<ApiResponse, TollgateError> {
        let request = request.with_auth(self.auth());
        let response = self.transport.send(&request)?;

        // Server errors and rate limits may come from intermediaries that never sign.
        if response.status >= 500 || response.status == 429 {
            return Err(status_error(&response));
        }

        if let Some(key) = &self.config.account_key {
            verify_response(&response, key, self.clock.as_ref())?;
        }

        Ok(response)
    }
}

impl Heartbeat for LicenseClient {
    fn ping(&self, machine_id: &str) -> Result<DateTime<Utc>, TollgateError> {
        LicenseClient::ping(self, machine_id)
    }
}

impl fmt::Debug for LicenseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LicenseClient")
            .field("account", &self.config.account)
            .field("api_url", &self.config.api_url)
            .finish()
    }
}

/// Pass 2xx responses through; map everything else to an error.
pub(crate) fn expect_success(response: ApiResponse) -> Result<ApiResponse, TollgateError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(status_error(&response))
    }
}

/// Map a non-success response to an error.
pub(crate) fn status_error(response: &ApiResponse) -> TollgateError {
    let errors = parse_errors(&response.body);
    match response.status {
        401 | 403 => TollgateError::TokenInvalid(errors.summary()),
        404 => TollgateError::NotFound,
        429 => TollgateError::NetworkError("rate limited".to_string()),
        status if status >= 500 => TollgateError::NetworkError(format!("server error {}", status)),
        status => TollgateError::Invalid {
            code: errors
                .first_code()
                .map(String::from)
                .unwrap_or_else(|| format!("HTTP_{}", status)),
            detail: Some(errors.summary()),
        },
    }
}
