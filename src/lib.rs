//! # Tollgate
//!
//! **Licensing client for [Keygen](https://keygen.sh)-compatible APIs.**
//!
//! Tollgate validates a license key scoped to device fingerprints, activates
//! machines, keeps activations alive with a background heartbeat, verifies
//! offline license keys, and replaces the running executable with newer
//! signed releases.
//!
//! ## Features
//!
//! - **Signed responses**: with an account key configured, every API
//!   response must carry a valid Ed25519 signature, a matching body digest
//!   and a fresh `Date`
//! - **Idempotent activation**: re-activating a fingerprint for the same
//!   license returns the existing machine
//! - **Heartbeat monitor**: one background thread per machine, bounded
//!   retry on network failures, synchronous stop
//! - **Offline license keys**: Ed25519 / Ed25519ph signed keys decode
//!   without network access
//! - **Verified self-upgrade**: artifacts are checked with a separate
//!   upgrade key before an atomic replace
//!
//! ## Quickstart
//!
//! ```no_run
//! use std::sync::Arc;
//! use tollgate::{LicenseClient, TollgateConfig, TollgateError};
//!
//! fn main() -> Result<(), TollgateError> {
//!     let config = TollgateConfig::new("your-account-id")
//!         .with_product("your-product-id")
//!         .with_license_key("LICENSE-KEY-HERE")
//!         .with_public_key("your-account-ed25519-public-key-hex")?;
//!
//!     let client = LicenseClient::new(Arc::new(config))?;
//!     let fingerprint = "machine-fingerprint";
//!
//!     let license = match client.validate(&[fingerprint]) {
//!         Ok(license) => license,
//!         Err(TollgateError::NotActivated(license)) => *license,
//!         Err(e) => return Err(e),
//!     };
//!
//!     let mut machine = client.activate(&license, fingerprint)?;
//!     let _terminal = machine.start_monitor()?;
//!
//!     // ... run the application ...
//!
//!     machine.deactivate()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Trust roots
//!
//! - [`AccountKey`] authenticates API responses and license keys
//! - [`UpgradeKey`] authenticates release artifacts
//!
//! The two are distinct types and never interchangeable. Without an account
//! key responses are not authenticated; without an upgrade key installs are
//! reported as [`Verification::Unverified`].
//!
//! Tollgate does **not** prevent binary patching. Client-side licensing can
//! always be bypassed by a determined attacker with access to the binary.

#![deny(missing_docs)]
#![doc(html_root_url = "https://docs.rs/tollgate/0.1.0")]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Crypto layer
pub mod crypto;

// Protocol layer
pub mod protocol;

// Transport layer
pub mod client;

// Domain
pub mod heartbeat;
pub mod keys;
pub mod license;
pub mod machine;
pub mod state;
pub mod upgrade;

// License client (main public API)
pub mod manager;

// Re-exports for public API
pub use client::transport::{ApiRequest, ApiResponse, Auth, Method, Transport};
pub use clock::{Clock, SystemClock};
pub use config::{HeartbeatPolicy, TollgateConfig};
pub use crypto::keys::{AccountKey, UpgradeKey};
pub use crypto::verify::{verify, SigningScheme};
pub use errors::{ResponseRejection, TollgateError};
pub use heartbeat::{Heartbeat, HeartbeatMonitor, MonitorState, MonitorStatus, TerminalError};
pub use keys::Dataset;
pub use license::{License, LicenseStatus};
pub use machine::{Machine, MachineState};
pub use manager::LicenseClient;
pub use state::ActivationState;
pub use upgrade::{Channel, InstallOutcome, Release, UpgradeOptions, Upgrader, Verification};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
