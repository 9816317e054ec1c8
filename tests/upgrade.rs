//! Upgrade discovery and install against a signing in-memory authority.

mod common;

use common::{FakeAuthority, PUBLIC_KEY_HEX};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tollgate::{
    Channel, LicenseClient, TollgateConfig, TollgateError, UpgradeOptions, Upgrader, Verification,
};

fn upgrader(authority: &Arc<FakeAuthority>, executable: &Path, upgrade_key: bool) -> Upgrader {
    let mut config: TollgateConfig = common::config().with_executable(executable);
    if upgrade_key {
        config = config.with_upgrade_key(PUBLIC_KEY_HEX).unwrap();
    }
    let client = LicenseClient::with_transport(Arc::new(config), authority.clone()).unwrap();
    Upgrader::new(client)
}

fn options(current: &str) -> UpgradeOptions {
    UpgradeOptions::new(current)
        .unwrap()
        .with_platform("linux_x86_64")
}

#[test]
fn test_newer_release_found() {
    let dir = tempfile::tempdir().unwrap();
    let authority = FakeAuthority::new();
    authority.publish("1.2.0", "stable", b"new build", true);

    let release = upgrader(&authority, &dir.path().join("app"), true)
        .check_for_upgrade(&options("1.0.0"))
        .unwrap();

    assert_eq!(release.version.to_string(), "1.2.0");
    assert_eq!(release.channel, Channel::Stable);
    assert_eq!(release.filename, "app_linux_x86_64");
    assert_eq!(release.size, Some(9));
    assert!(release.url.ends_with("/app_linux_x86_64"));

    let path = authority.with(|s| s.requests[0].1.clone());
    assert_eq!(
        path,
        "/v1/accounts/acme/releases/1.0.0/upgrade?channel=stable&product=prod-1"
    );
}

#[test]
fn test_same_or_older_release_not_available() {
    let dir = tempfile::tempdir().unwrap();
    let authority = FakeAuthority::new();
    let upgrader = upgrader(&authority, &dir.path().join("app"), true);

    authority.publish("1.0.0", "stable", b"same", true);
    assert!(matches!(
        upgrader.check_for_upgrade(&options("1.0.0")),
        Err(TollgateError::NotAvailable)
    ));

    authority.publish("0.9.0", "stable", b"older", true);
    assert!(matches!(
        upgrader.check_for_upgrade(&options("1.0.0")),
        Err(TollgateError::NotAvailable)
    ));
}

#[test]
fn test_nothing_published() {
    let dir = tempfile::tempdir().unwrap();
    let authority = FakeAuthority::new();
    assert!(matches!(
        upgrader(&authority, &dir.path().join("app"), true).check_for_upgrade(&options("1.0.0")),
        Err(TollgateError::NotAvailable)
    ));
}

#[test]
fn test_channel_filtering() {
    let dir = tempfile::tempdir().unwrap();
    let authority = FakeAuthority::new();
    let upgrader = upgrader(&authority, &dir.path().join("app"), true);
    authority.publish("2.0.0-beta.1", "beta", b"beta build", true);

    assert!(matches!(
        upgrader.check_for_upgrade(&options("1.0.0")),
        Err(TollgateError::NotAvailable)
    ));

    let release = upgrader
        .check_for_upgrade(&options("1.0.0").with_channel(Channel::Beta))
        .unwrap();
    assert_eq!(release.channel, Channel::Beta);
    assert_eq!(release.version.to_string(), "2.0.0-beta.1");
}

#[test]
fn test_install_verified_release() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("app");
    fs::write(&target, b"old build").unwrap();

    let authority = FakeAuthority::new();
    authority.publish("1.2.0", "stable", b"new build", true);
    let upgrader = upgrader(&authority, &target, true);

    let release = upgrader.check_for_upgrade(&options("1.0.0")).unwrap();
    let outcome = upgrader.install(release).unwrap();

    assert_eq!(outcome.verification, Verification::Verified);
    assert_eq!(outcome.path, target);
    assert_eq!(outcome.version.to_string(), "1.2.0");
    assert_eq!(fs::read(&target).unwrap(), b"new build");
}

#[test]
fn test_bad_signature_leaves_executable_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("app");
    fs::write(&target, b"old build").unwrap();

    let authority = FakeAuthority::new();
    authority.publish("1.2.0", "stable", b"new build", true);
    authority.with(|s| s.artifact_signature = Some(common::sign_artifact(b"something else")));
    let upgrader = upgrader(&authority, &target, true);

    let release = upgrader.check_for_upgrade(&options("1.0.0")).unwrap();
    assert!(matches!(
        upgrader.install(release),
        Err(TollgateError::SignatureInvalid)
    ));
    assert_eq!(fs::read(&target).unwrap(), b"old build");
}

#[test]
fn test_unsigned_release_rejected_with_upgrade_key() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("app");
    fs::write(&target, b"old build").unwrap();

    let authority = FakeAuthority::new();
    authority.publish("1.2.0", "stable", b"new build", false);
    let upgrader = upgrader(&authority, &target, true);

    let release = upgrader.check_for_upgrade(&options("1.0.0")).unwrap();
    assert!(matches!(
        upgrader.install(release),
        Err(TollgateError::SignatureInvalid)
    ));
    assert_eq!(fs::read(&target).unwrap(), b"old build");
}

#[test]
fn test_install_without_upgrade_key_is_unverified() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("app");
    fs::write(&target, b"old build").unwrap();

    let authority = FakeAuthority::new();
    authority.publish("1.2.0", "stable", b"new build", false);
    let upgrader = upgrader(&authority, &target, false);

    let release = upgrader.check_for_upgrade(&options("1.0.0")).unwrap();
    let outcome = upgrader.install(release).unwrap();

    assert_eq!(outcome.verification, Verification::Unverified);
    assert_eq!(fs::read(&target).unwrap(), b"new build");
}

#[test]
fn test_missing_artifact_not_available() {
    let dir = tempfile::tempdir().unwrap();
    let authority = FakeAuthority::new();
    authority.publish("1.2.0", "stable", b"new build", true);
    let upgrader = upgrader(&authority, &dir.path().join("app"), true);

    assert!(matches!(
        upgrader.check_for_upgrade(&options("1.0.0").with_filename("missing")),
        Err(TollgateError::NotAvailable)
    ));
    assert!(matches!(
        upgrader.check_for_upgrade(&options("1.0.0").with_platform("windows_aarch64")),
        Err(TollgateError::NotAvailable)
    ));
}
