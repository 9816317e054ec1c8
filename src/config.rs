//! Tollgate configuration.
//!
//! One [`TollgateConfig`] is built at startup and shared (usually as an
//! `Arc`) by the license client, heartbeat monitors and upgrader. It is never
//! mutated after construction.

use crate::crypto::keys::{AccountKey, UpgradeKey};
use crate::TollgateError;
use std::path::PathBuf;
use std::time::Duration;

/// Default licensing API base URL.
pub const DEFAULT_API_URL: &str = "https://api.keygen.sh";

/// Default `Keygen-Version` header value.
pub const DEFAULT_API_VERSION: &str = "1.7";

/// Platform string for this host, e.g. `linux_x86_64`.
pub fn host_platform() -> String {
    format!("{}_{}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Heartbeat scheduling and retry policy.
#[derive(Debug, Clone)]
pub struct HeartbeatPolicy {
    /// Fixed ping interval. When `None`, derived from the machine's
    /// heartbeat duration (minus 30s), falling back to 10 minutes.
    pub interval: Option<Duration>,

    /// Consecutive transient failures tolerated before the monitor gives up.
    pub max_retries: u32,

    /// First retry delay; doubles on each consecutive failure.
    pub backoff_base: Duration,
}

impl Default for HeartbeatPolicy {
    fn default() -> Self {
        Self {
            interval: None,
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// Configuration for a licensed application.
#[derive(Debug, Clone)]
pub struct TollgateConfig {
    /// Account ID (UUID) or slug.
    /// SECURITY: hard-code this in your application.
    pub account: String,

    /// Product ID. Scopes validation and release lookups.
    pub product: Option<String>,

    /// License key used for `validate` and, absent a token, for authentication.
    pub license_key: Option<String>,

    /// Bearer token (license or user token) used for machine operations.
    pub token: Option<String>,

    /// Verify key for API responses and offline license keys.
    /// When `None`, responses are not authenticated.
    pub account_key: Option<AccountKey>,

    /// Verify key for release artifacts. When `None`, installs are unverified.
    pub upgrade_key: Option<UpgradeKey>,

    /// API base URL.
    pub api_url: String,

    /// API version sent in `Keygen-Version`.
    pub api_version: String,

    /// Application name reported in the User-Agent (e.g. "myapp/1.2.0").
    pub app_name: String,

    /// Heartbeat policy.
    pub heartbeat: HeartbeatPolicy,

    /// Executable replaced by upgrades. Defaults to the current executable.
    pub executable: Option<PathBuf>,

    /// HTTP request timeout.
    pub request_timeout: Duration,
}

impl TollgateConfig {
    /// Create a configuration for `account` with defaults everywhere else.
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            product: None,
            license_key: None,
            token: None,
            account_key: None,
            upgrade_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            app_name: env!("CARGO_PKG_NAME").to_string(),
            heartbeat: HeartbeatPolicy::default(),
            executable: None,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Set the product ID.
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    /// Set the license key.
    pub fn with_license_key(mut self, key: impl Into<String>) -> Self {
        self.license_key = Some(key.into());
        self
    }

    /// Set the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the account verify key from hex.
    pub fn with_public_key(mut self, hex_key: &str) -> Result<Self, TollgateError> {
        self.account_key = Some(AccountKey::from_hex(hex_key)?);
        Ok(self)
    }

    /// Set the upgrade verify key from hex.
    pub fn with_upgrade_key(mut self, hex_key: &str) -> Result<Self, TollgateError> {
        self.upgrade_key = Some(UpgradeKey::from_hex(hex_key)?);
        Ok(self)
    }

    /// Override the API base URL.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set the application name used in the User-Agent.
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Replace the heartbeat policy.
    pub fn with_heartbeat(mut self, policy: HeartbeatPolicy) -> Self {
        self.heartbeat = policy;
        self
    }

    /// Set the executable replaced by upgrades.
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), TollgateError> {
        if self.account.trim().is_empty() {
            return Err(TollgateError::Config("account cannot be empty".to_string()));
        }
        if !self.api_url.starts_with("https://") && !self.api_url.starts_with("http://") {
            return Err(TollgateError::Config(format!(
                "api_url must be an http(s) URL, got {}",
                self.api_url
            )));
        }
        if self.heartbeat.interval == Some(Duration::ZERO) {
            return Err(TollgateError::Config(
                "heartbeat interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Base path for account-scoped endpoints: `/v1/accounts/<account>`.
    pub fn account_path(&self) -> String {
        format!("/v1/accounts/{}", urlencoding::encode(&self.account))
    }

    /// Host component of the API URL, as used in the signing string.
    pub fn api_host(&self) -> &str {
        let without_scheme = self
            .api_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.api_url);
        without_scheme
            .split('/')
            .next()
            .unwrap_or(without_scheme)
    }
}
