// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! End-to-end verification against a keystore loaded from disk.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;

use token_auth_server::auth::{verify, AuthError, TokenCredentials, TokenVerifier, VerifierSettings};
use token_auth_server::keystore::{JsonKeystore, Key, Keystore};
use token_auth_server::token::{
    AttributePolicy, CbcEnvelope, EnvelopeCodec, EnvelopeFormat, EnvelopePayload,
    NestedEcbEnvelope, RawEnvelope, TokenError,
};

const KEYSTORE_JSON: &str = r#"[
  { "name": "svc1", "data": "0123456789abcdef" },
  { "name": "alphabet_key", "data": "EKyrqGJnFQrUzohURXsJprFgBAKAPtrv" }
]"#;

fn generated_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 5, 9, 30, 0).unwrap()
}

fn load_keystore(dir: &TempDir) -> JsonKeystore {
    let path = dir.path().join("keystore.json");
    fs::write(&path, KEYSTORE_JSON).unwrap();
    JsonKeystore::open(&path)
}

fn issue_token(keystore: &JsonKeystore, generated: DateTime<Utc>) -> String {
    let payload = EnvelopePayload {
        generated: generated.timestamp_millis(),
        credentials: json!({
            "username": "auser",
            "firstname": "Foo",
            "lastname": "Bar",
            "email": "foobar@example.com"
        })
        .as_object()
        .cloned()
        .unwrap(),
    };
    CbcEnvelope::seal(&payload, &keystore.get_key("svc1").unwrap()).unwrap()
}

fn settings(max_drift_seconds: u64) -> VerifierSettings {
    VerifierSettings::new(
        AttributePolicy::new(vec!["username".to_string()], Default::default()),
        max_drift_seconds,
        EnvelopeFormat::Cbc,
    )
}

/// CBC codec that counts how often it is asked to decrypt.
#[derive(Debug, Default)]
struct CountingCodec {
    opens: AtomicUsize,
}

impl EnvelopeCodec for CountingCodec {
    fn format(&self) -> EnvelopeFormat {
        EnvelopeFormat::Cbc
    }

    fn open(
        &self,
        encoded: &str,
        key: &Key,
        client_keys: Option<&dyn Keystore>,
    ) -> Result<RawEnvelope, TokenError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        CbcEnvelope.open(encoded, key, client_keys)
    }
}

#[test]
fn verifies_token_from_file_backed_keystore() {
    let dir = TempDir::new().unwrap();
    let keystore = load_keystore(&dir);
    assert_eq!(keystore.len(), 2);

    let token = issue_token(&keystore, generated_at());
    let identity = verify("auser", "svc1", &token, &keystore, &settings(300), generated_at()).unwrap();

    assert_eq!(identity.username, "auser");
    assert_eq!(identity.service, "svc1");
    assert_eq!(identity.generated, generated_at());
    assert_eq!(identity.attributes.get_str("firstname"), Some("Foo"));
    assert_eq!(identity.attributes.get_str("lastname"), Some("Bar"));
    assert_eq!(identity.attributes.get_str("email"), Some("foobar@example.com"));
}

#[test]
fn other_user_is_rejected() {
    let dir = TempDir::new().unwrap();
    let keystore = load_keystore(&dir);
    let token = issue_token(&keystore, generated_at());

    let err = verify("otheruser", "svc1", &token, &keystore, &settings(300), generated_at()).unwrap_err();
    assert!(matches!(err, AuthError::UsernameMismatch { .. }));
}

#[test]
fn stale_token_is_expired() {
    let dir = TempDir::new().unwrap();
    let keystore = load_keystore(&dir);
    let token = issue_token(&keystore, generated_at());

    let err = verify(
        "auser",
        "svc1",
        &token,
        &keystore,
        &settings(300),
        generated_at() + Duration::seconds(10_000),
    )
    .unwrap_err();
    assert_eq!(
        err,
        AuthError::TokenExpired {
            drift_seconds: 10_000,
            max_drift_seconds: 300
        }
    );
}

#[test]
fn drift_boundary_is_inclusive() {
    let dir = TempDir::new().unwrap();
    let keystore = load_keystore(&dir);
    let token = issue_token(&keystore, generated_at());

    let at_limit = generated_at() + Duration::seconds(300);
    assert!(verify("auser", "svc1", &token, &keystore, &settings(300), at_limit).is_ok());

    let past_limit = generated_at() + Duration::seconds(301);
    assert!(matches!(
        verify("auser", "svc1", &token, &keystore, &settings(300), past_limit),
        Err(AuthError::TokenExpired { .. })
    ));
}

#[test]
fn unknown_service_never_decrypts() {
    let dir = TempDir::new().unwrap();
    let keystore = Arc::new(load_keystore(&dir));
    let token = issue_token(&keystore, generated_at());

    let counter = Arc::new(CountingCodec::default());
    let verifier = TokenVerifier::new(keystore.clone(), settings(300).with_codec(counter.clone()));

    let err = verifier
        .verify(&TokenCredentials::new("auser", "svc2", token.clone()), generated_at())
        .unwrap_err();
    assert_eq!(err, AuthError::UnknownService("svc2".to_string()));
    assert_eq!(counter.opens.load(Ordering::SeqCst), 0);

    verifier
        .verify(&TokenCredentials::new("auser", "svc1", token), generated_at())
        .unwrap();
    assert_eq!(counter.opens.load(Ordering::SeqCst), 1);
}

#[test]
fn token_for_another_service_is_bad_token() {
    let dir = TempDir::new().unwrap();
    let keystore = load_keystore(&dir);
    let token = issue_token(&keystore, generated_at());

    let err = verify("auser", "alphabet_key", &token, &keystore, &settings(300), generated_at())
        .unwrap_err();
    assert!(matches!(err, AuthError::BadToken(_)));
}

#[test]
fn missing_keystore_file_rejects_everything() {
    let dir = TempDir::new().unwrap();
    let keystore = JsonKeystore::open(dir.path().join("absent.json"));
    assert!(keystore.is_empty());

    let err = verify("auser", "svc1", "AAAA", &keystore, &settings(300), generated_at()).unwrap_err();
    assert!(matches!(err, AuthError::UnknownService(_)));
}

#[test]
fn generated_key_round_trips_through_keystore_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("keys").join("keystore.json");

    let keystore = JsonKeystore::open(&path);
    keystore.add_key(Key::generate("portal").unwrap());
    keystore.persist().unwrap();

    let reloaded = JsonKeystore::open(&path);
    let key = reloaded.get_key("portal").unwrap();
    assert_eq!(key.secret().len(), 32);

    let payload = EnvelopePayload {
        generated: generated_at().timestamp_millis(),
        credentials: json!({"username": "auser"}).as_object().cloned().unwrap(),
    };
    let token = CbcEnvelope::seal(&payload, &key).unwrap();
    let identity = verify("auser", "portal", &token, &reloaded, &settings(300), generated_at()).unwrap();
    assert_eq!(identity.username, "auser");
}

#[test]
fn nested_token_requires_registered_client_key() {
    let dir = TempDir::new().unwrap();
    let keystore = load_keystore(&dir);
    let outer = keystore.get_key("svc1").unwrap();
    let payload = EnvelopePayload {
        generated: generated_at().timestamp_millis(),
        credentials: json!({"username": "auser"}).as_object().cloned().unwrap(),
    };
    let nested = VerifierSettings::new(AttributePolicy::default(), 300, EnvelopeFormat::NestedEcb);

    let registered = keystore.get_key("alphabet_key").unwrap();
    let token = NestedEcbEnvelope::seal(&payload, &outer, &registered).unwrap();
    let identity = verify("auser", "svc1", &token, &keystore, &nested, generated_at()).unwrap();
    assert_eq!(identity.client_key.as_deref(), Some("alphabet_key"));

    let rogue = Key::from_string("notinkeystore!!!", "notinkeystore!!!").unwrap();
    let token = NestedEcbEnvelope::seal(&payload, &outer, &rogue).unwrap();
    let err = verify("auser", "svc1", &token, &keystore, &nested, generated_at()).unwrap_err();
    assert_eq!(err, AuthError::UnknownService("notinkeystore!!!".to_string()));
}

#[test]
fn malformed_payload_is_not_echoed() {
    let dir = TempDir::new().unwrap();
    let keystore = load_keystore(&dir);
    let key = keystore.get_key("svc1").unwrap();
    let token = token_auth_server::crypto::encrypt(
        r#"{"generated":1,"credentials":"ssn=123-45-6789;user=auser"}"#,
        key.secret(),
    )
    .unwrap();

    let err = verify("auser", "svc1", &token, &keystore, &settings(300), generated_at()).unwrap_err();
    let api_error = token_auth_server::error::ApiError::from(err.clone());
    for rendered in [err.to_string(), api_error.message, format!("{err:?}")] {
        assert!(!rendered.contains("ssn"), "{rendered}");
        assert!(!rendered.contains("123-45-6789"), "{rendered}");
    }
}
