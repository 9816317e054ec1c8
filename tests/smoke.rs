//! Public API smoke tests: everything here runs offline.

mod common;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::Signer;
use std::sync::Arc;
use tollgate::keys::{decode, detect_scheme};
use tollgate::{AccountKey, LicenseClient, SigningScheme, TollgateConfig, TollgateError};

#[test]
fn crate_compiles() {
    let _ = std::any::type_name::<tollgate::TollgateConfig>();
    let _ = std::any::type_name::<tollgate::TollgateError>();
    let _ = std::any::type_name::<tollgate::LicenseClient>();
}

#[test]
fn test_client_rejects_bad_config() {
    let config = Arc::new(TollgateConfig::new(""));
    assert!(matches!(
        LicenseClient::new(config),
        Err(TollgateError::Config(_))
    ));
}

#[test]
fn test_offline_key_roundtrip_through_public_api() {
    let payload = URL_SAFE_NO_PAD.encode(br#"{"license":{"id":"lic-1","expiry":"2099-01-01T00:00:00Z"},"entitlements":["PRO"]}"#);
    let signing_data = format!("key/{}", payload);
    let signature = common::signing_key().sign(signing_data.as_bytes());
    let key = format!("{}.{}", signing_data, URL_SAFE_NO_PAD.encode(signature.to_bytes()));

    assert_eq!(detect_scheme(&key), SigningScheme::Ed25519);

    let account_key = AccountKey::from_hex(common::PUBLIC_KEY_HEX).unwrap();
    let dataset = decode(&account_key, &key, Some(SigningScheme::Ed25519)).unwrap();
    assert_eq!(dataset.entitlements(), ["PRO"]);
    assert!(dataset.expiry().unwrap().is_some());

    let forged_payload = URL_SAFE_NO_PAD.encode(br#"{"entitlements":["ENTERPRISE"]}"#);
    let forged = format!(
        "key/{}.{}",
        forged_payload,
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    );
    assert!(matches!(
        decode(&account_key, &forged, None),
        Err(TollgateError::NotGenuine)
    ));
}
