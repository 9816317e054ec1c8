//! In-memory licensing authority for integration tests.
//!
//! Keeps machines and releases in memory and signs every response with the
//! RFC 8032 test key, so the client's full verification pipeline runs.

#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::{Signer, SigningKey};
use serde_json::{json, Value};
use sha2::{Digest, Sha512};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tollgate::crypto::digest::{format_digest_header, sha512_b64};
use tollgate::crypto::signing::build_signing_string;
use tollgate::{ApiRequest, ApiResponse, Method, TollgateConfig, TollgateError, Transport};

// Test keypair (DO NOT USE IN PRODUCTION)
pub const SECRET_KEY_HEX: &str =
    "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
pub const PUBLIC_KEY_HEX: &str =
    "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";

pub const ACCOUNT: &str = "acme";
pub const HOST: &str = "api.keygen.sh";
pub const LICENSE_ID: &str = "lic-1";
/// The only artifact published for a release.
pub const ARTIFACT_FILENAME: &str = "app_linux_x86_64";

pub fn signing_key() -> SigningKey {
    let secret: [u8; 32] = hex::decode(SECRET_KEY_HEX).unwrap().try_into().unwrap();
    SigningKey::from_bytes(&secret)
}

/// Ed25519ph signature over an artifact, base64.
pub fn sign_artifact(bytes: &[u8]) -> String {
    let signature = signing_key()
        .sign_prehashed(Sha512::new_with_prefix(bytes), None)
        .unwrap();
    STANDARD.encode(signature.to_bytes())
}

/// Config pointing at the fake authority, with response verification on.
pub fn config() -> TollgateConfig {
    TollgateConfig::new(ACCOUNT)
        .with_product("prod-1")
        .with_license_key("KEY-1")
        .with_token("prod-token")
        .with_public_key(PUBLIC_KEY_HEX)
        .unwrap()
}

pub struct StoredMachine {
    pub id: String,
    pub fingerprint: String,
    pub license_id: String,
}

pub struct ReleaseFixture {
    pub id: String,
    pub version: String,
    pub channel: String,
}

pub struct ServerState {
    pub machines: Vec<StoredMachine>,
    pub next_id: u32,
    pub max_machines: usize,
    pub expired: bool,
    /// Every request that reached the transport, failed or not.
    pub requests: Vec<(Method, String)>,
    pub ping_times: Vec<Instant>,
    /// Transport-level failures returned to the next pings.
    pub ping_failures: VecDeque<TollgateError>,
    /// All requests fail as if the network were down.
    pub offline: bool,
    /// The next DELETE fails at the transport level.
    pub fail_next_delete: bool,
    pub release: Option<ReleaseFixture>,
    pub artifact: Vec<u8>,
    pub artifact_signature: Option<String>,
    pub tamper_responses: bool,
    /// Sign responses without a digest line and send no `Digest` header.
    pub omit_digest: bool,
    /// DELETE answers with this status and an error document.
    pub delete_status: Option<u16>,
}

pub struct FakeAuthority {
    state: Mutex<ServerState>,
}

impl FakeAuthority {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ServerState {
                machines: Vec::new(),
                next_id: 1,
                max_machines: 3,
                expired: false,
                requests: Vec::new(),
                ping_times: Vec::new(),
                ping_failures: VecDeque::new(),
                offline: false,
                fail_next_delete: false,
                release: None,
                artifact: Vec::new(),
                artifact_signature: None,
                tamper_responses: false,
                omit_digest: false,
                delete_status: None,
            }),
        })
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut ServerState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn machine_count(&self) -> usize {
        self.with(|s| s.machines.len())
    }

    pub fn ping_count(&self) -> usize {
        self.with(|s| s.ping_times.len())
    }

    pub fn insert_machine(&self, fingerprint: &str, license_id: &str) -> String {
        self.with(|s| {
            let id = format!("m-{}", s.next_id);
            s.next_id += 1;
            s.machines.push(StoredMachine {
                id: id.clone(),
                fingerprint: fingerprint.to_string(),
                license_id: license_id.to_string(),
            });
            id
        })
    }

    pub fn revoke(&self, machine_id: &str) {
        self.with(|s| s.machines.retain(|m| m.id != machine_id));
    }

    pub fn publish(&self, version: &str, channel: &str, artifact: &[u8], signed: bool) {
        self.with(|s| {
            s.release = Some(ReleaseFixture {
                id: format!("rel-{}", version),
                version: version.to_string(),
                channel: channel.to_string(),
            });
            s.artifact = artifact.to_vec();
            s.artifact_signature = signed.then(|| sign_artifact(artifact));
        });
    }

    fn route(&self, request: &ApiRequest) -> Result<(u16, Option<Value>), TollgateError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push((request.method, request.path.clone()));

        if state.offline {
            return Err(TollgateError::NetworkError("connection refused".into()));
        }

        let prefix = format!("/v1/accounts/{}", ACCOUNT);
        let full = request
            .path
            .strip_prefix(&prefix)
            .expect("account-scoped path");
        let path = full.split('?').next().unwrap_or(full);
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

        match (request.method, segments.as_slice()) {
            (Method::Post, ["licenses", "actions", "validate-key"]) => {
                let body = request.body.clone().unwrap_or(Value::Null);
                let fingerprints: Vec<String> = body["meta"]["scope"]["fingerprints"]
                    .as_array()
                    .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                    .unwrap_or_default();

                let (valid, code) = if state.expired {
                    (false, "EXPIRED")
                } else if fingerprints.is_empty()
                    || fingerprints
                        .iter()
                        .any(|fp| state.machines.iter().any(|m| &m.fingerprint == fp))
                {
                    (true, "VALID")
                } else {
                    (false, "NO_MACHINE")
                };

                Ok((
                    200,
                    Some(json!({
                        "meta": {"valid": valid, "code": code, "detail": code.to_lowercase()},
                        "data": license_json(state.max_machines),
                    })),
                ))
            }

            (Method::Post, ["machines"]) => {
                let body = request.body.clone().unwrap_or(Value::Null);
                let fingerprint = body["data"]["attributes"]["fingerprint"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                let license_id = body["data"]["relationships"]["license"]["data"]["id"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();

                if state.machines.iter().any(|m| m.fingerprint == fingerprint) {
                    return Ok((422, Some(error_json("FINGERPRINT_TAKEN", "has already been taken"))));
                }
                let active = state
                    .machines
                    .iter()
                    .filter(|m| m.license_id == license_id)
                    .count();
                if active >= state.max_machines {
                    return Ok((422, Some(error_json("MACHINE_LIMIT_EXCEEDED", "machine count has exceeded maximum"))));
                }

                let id = format!("m-{}", state.next_id);
                state.next_id += 1;
                state.machines.push(StoredMachine {
                    id,
                    fingerprint,
                    license_id,
                });
                let stored = state.machines.last().unwrap();
                Ok((201, Some(json!({ "data": machine_json(stored, None) }))))
            }

            (Method::Get, ["machines", id]) => {
                let id = urlencoding::decode(id).unwrap().into_owned();
                match state
                    .machines
                    .iter()
                    .find(|m| m.id == id || m.fingerprint == id)
                {
                    Some(m) => Ok((200, Some(json!({ "data": machine_json(m, None) })))),
                    None => Ok((404, Some(error_json("NOT_FOUND", "machine not found")))),
                }
            }

            (Method::Delete, ["machines", id]) => {
                if std::mem::take(&mut state.fail_next_delete) {
                    return Err(TollgateError::NetworkError("connection reset".into()));
                }
                if let Some(status) = state.delete_status {
                    return Ok((status, Some(error_json("FORBIDDEN", "not permitted"))));
                }
                let before = state.machines.len();
                state.machines.retain(|m| m.id != *id);
                if state.machines.len() < before {
                    Ok((204, None))
                } else {
                    Ok((404, Some(error_json("NOT_FOUND", "machine not found"))))
                }
            }

            (Method::Post, ["machines", id, "actions", "ping"]) => {
                state.ping_times.push(Instant::now());
                if let Some(err) = state.ping_failures.pop_front() {
                    return Err(err);
                }
                match state.machines.iter().find(|m| m.id == *id) {
                    Some(m) => {
                        let now = chrono::Utc::now().to_rfc3339();
                        Ok((200, Some(json!({ "data": machine_json(m, Some(&now)) }))))
                    }
                    None => Ok((404, Some(error_json("NOT_FOUND", "machine not found")))),
                }
            }

            (Method::Get, ["licenses", _, "machines"]) => {
                let data: Vec<Value> = state.machines.iter().map(|m| machine_json(m, None)).collect();
                Ok((200, Some(json!({ "data": data }))))
            }

            (Method::Get, ["licenses", _, "entitlements"]) => Ok((
                200,
                Some(json!({ "data": [
                    {"id": "e-1", "type": "entitlements", "attributes": {"code": "PRO", "name": "Pro"}},
                    {"id": "e-2", "type": "entitlements", "attributes": {"code": "SSO"}}
                ]})),
            )),

            (Method::Get, ["releases", _, "upgrade"]) => match &state.release {
                Some(r) => Ok((
                    200,
                    Some(json!({ "data": {
                        "id": r.id, "type": "releases",
                        "attributes": {"version": r.version, "channel": r.channel, "status": "PUBLISHED"}
                    }})),
                )),
                None => Ok((204, None)),
            },

            (Method::Get, ["releases", _, "artifacts", filename]) => {
                assert!(request.no_redirect, "artifact lookups must not follow redirects");
                let filename = urlencoding::decode(filename).unwrap().into_owned();
                if filename != ARTIFACT_FILENAME {
                    return Ok((404, Some(error_json("NOT_FOUND", "artifact not found"))));
                }
                Ok((
                    200,
                    Some(json!({ "data": {
                        "id": "art-1", "type": "artifacts",
                        "attributes": {
                            "filename": filename,
                            "filesize": state.artifact.len(),
                            "checksum": sha512_b64(&state.artifact),
                            "signature": state.artifact_signature,
                        },
                        "links": {"redirect": format!("https://cdn.example.com/{}", filename)}
                    }})),
                ))
            }

            _ => Ok((404, Some(error_json("NOT_FOUND", "no route")))),
        }
    }
}

impl Transport for FakeAuthority {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TollgateError> {
        let (status, body) = self.route(request)?;
        let body = body.map(|b| b.to_string().into_bytes()).unwrap_or_default();

        let date = chrono::Utc::now().to_rfc2822();
        let digest = (!self.with(|s| s.omit_digest)).then(|| format_digest_header(&body));
        let signing_string = build_signing_string(
            request.method.as_str(),
            &request.path,
            HOST,
            &date,
            digest.as_deref(),
        );
        let signature = STANDARD.encode(signing_key().sign(signing_string.as_bytes()).to_bytes());

        let mut body = body;
        if self.with(|s| s.tamper_responses) {
            body = body.iter().map(|b| b.to_ascii_uppercase()).collect();
        }

        Ok(ApiResponse {
            status,
            date: Some(date),
            signature: Some(format!(
                r#"keyid="{}", algorithm="ed25519", signature="{}", headers="(request-target) host date digest""#,
                ACCOUNT, signature
            )),
            digest,
            body,
            method: request.method,
            request_path: request.path.clone(),
            host: HOST.to_string(),
        })
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, TollgateError> {
        assert!(url.starts_with("https://cdn.example.com/"));
        Ok(self.with(|s| s.artifact.clone()))
    }
}

fn license_json(max_machines: usize) -> Value {
    json!({
        "id": LICENSE_ID,
        "type": "licenses",
        "attributes": {
            "name": "Pro",
            "key": "KEY-1",
            "status": "ACTIVE",
            "expiry": "2099-01-01T00:00:00Z",
            "maxMachines": max_machines,
            "metadata": {}
        },
        "relationships": {"product": {"data": {"type": "products", "id": "prod-1"}}}
    })
}

fn machine_json(machine: &StoredMachine, last_heartbeat: Option<&str>) -> Value {
    json!({
        "id": machine.id,
        "type": "machines",
        "attributes": {
            "fingerprint": machine.fingerprint,
            "requireHeartbeat": true,
            "heartbeatDuration": 600,
            "lastHeartbeat": last_heartbeat,
            "created": "2025-01-01T00:00:00Z"
        },
        "relationships": {"license": {"data": {"type": "licenses", "id": machine.license_id}}}
    })
}

fn error_json(code: &str, detail: &str) -> Value {
    json!({ "errors": [{ "title": "Error", "detail": detail, "code": code }] })
}

/// Poll `cond` until it holds or five seconds pass.
pub fn wait_for(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(5));
    }
}
