//! Validate, activate and keep a machine alive until Ctrl-C or revocation.
//!
//! # Running
//!
//! ```bash
//! export LICENSE_KEY="your-license-key"
//! export LICENSE_TOKEN="your-license-token"
//! RUST_LOG=tollgate=debug cargo run --example activate_and_monitor
//! ```
//!
//! # Note
//!
//! In production the account ID and public key should be compile-time
//! constants embedded in your binary, not loaded from the environment.
//! Otherwise an attacker can point the client at their own account.

use std::sync::Arc;
use std::time::Duration;
use tollgate::{LicenseClient, TollgateConfig, TollgateError};
use tracing_subscriber::EnvFilter;

// These would be your actual account credentials in production.
const ACCOUNT_ID: &str = "00000000-0000-0000-0000-000000000000";
const ACCOUNT_PUBLIC_KEY: &str = "0000000000000000000000000000000000000000000000000000000000000000";
const PRODUCT_ID: &str = "00000000-0000-0000-0000-000000000000";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let license_key = std::env::var("LICENSE_KEY").expect("Set LICENSE_KEY environment variable");
    let fingerprint = std::env::var("FINGERPRINT").unwrap_or_else(|_| "demo-machine".to_string());

    let mut config = TollgateConfig::new(ACCOUNT_ID)
        .with_product(PRODUCT_ID)
        .with_license_key(license_key)
        .with_app_name(concat!("activate_and_monitor/", env!("CARGO_PKG_VERSION")));
    if let Ok(token) = std::env::var("LICENSE_TOKEN") {
        config = config.with_token(token);
    }
    let config = match config.with_public_key(ACCOUNT_PUBLIC_KEY) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let client = match LicenseClient::new(Arc::new(config)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let license = match client.validate(&[fingerprint.as_str()]) {
        Ok(license) => license,
        Err(TollgateError::NotActivated(license)) => {
            println!("License valid, activating {}", fingerprint);
            *license
        }
        Err(TollgateError::Expired(license)) => {
            eprintln!("License expired at {:?}", license.expiry);
            std::process::exit(1);
        }
        Err(TollgateError::ResponseNotGenuine(rejection)) => {
            // Someone may be tampering with responses
            eprintln!("SECURITY: response rejected: {}", rejection);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Validation error: {}", e);
            std::process::exit(1);
        }
    };

    let mut machine = match client.activate(&license, &fingerprint) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Activation failed: {}", e);
            std::process::exit(1);
        }
    };
    println!("Machine {} active", machine.id);

    if let Ok(entitlements) = client.entitlements(&license) {
        println!("  Entitlements: {:?}", entitlements);
    }

    let mut terminal = match machine.start_monitor() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Could not start heartbeat: {}", e);
            std::process::exit(1);
        }
    };

    // Stand-in for the application's main loop.
    for _ in 0..60 {
        if let Ok(e) = terminal.try_recv() {
            eprintln!("Heartbeat failed, license no longer usable: {}", e);
            std::process::exit(1);
        }
        std::thread::sleep(Duration::from_secs(1));
    }

    match machine.deactivate() {
        Ok(()) | Err(TollgateError::NotFound) => println!("Machine deactivated"),
        Err(e) => eprintln!("Deactivation failed: {}", e),
    }
}
