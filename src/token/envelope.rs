// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Envelope formats.
//!
//! Each format turns an encoded token string and a [`Key`] into the
//! innermost plaintext payload. Attribute construction is shared and
//! happens in [`Token`](super::Token).
//!
//! ## Formats
//!
//! - `cbc`: `Base64(IV || AES-CBC(json))` where `json` is
//!   `{"generated": <ms>, "credentials": {...}}`
//! - `nested-ecb`: `Base64(AES-ECB(json))` where `json` is
//!   `{"generated": <ms>, "api_key": "<client key>", "credentials": "<ecb>"}`
//!   and `credentials` is itself ECB-encrypted under the client key. The
//!   client key must be registered in the keystore; its stored secret opens
//!   the inner layer

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ClaimParseKind, TokenError};
use crate::crypto;
use crate::keystore::{Key, Keystore};

/// Plaintext payload sealed inside an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopePayload {
    /// Generation time, milliseconds since the Unix epoch
    pub generated: i64,
    /// Claim set
    pub credentials: Map<String, Value>,
}

/// Innermost payload recovered from an envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEnvelope {
    pub generated: i64,
    pub credentials: Map<String, Value>,
    /// Name of the inner client key, for nested envelopes
    pub client_key: Option<String>,
}

/// Strategy that opens an encoded envelope with a key.
pub trait EnvelopeCodec: Send + Sync + fmt::Debug {
    fn format(&self) -> EnvelopeFormat;

    /// Open `encoded` with the service `key`. Formats that carry an inner
    /// client key resolve it through `client_keys`.
    fn open(
        &self,
        encoded: &str,
        key: &Key,
        client_keys: Option<&dyn Keystore>,
    ) -> Result<RawEnvelope, TokenError>;
}

/// Supported envelope formats, selected by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnvelopeFormat {
    #[default]
    Cbc,
    NestedEcb,
}

impl EnvelopeFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeFormat::Cbc => "cbc",
            EnvelopeFormat::NestedEcb => "nested-ecb",
        }
    }

    pub fn codec(self) -> Arc<dyn EnvelopeCodec> {
        match self {
            EnvelopeFormat::Cbc => Arc::new(CbcEnvelope),
            EnvelopeFormat::NestedEcb => Arc::new(NestedEcbEnvelope),
        }
    }
}

impl fmt::Display for EnvelopeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvelopeFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cbc" => Ok(EnvelopeFormat::Cbc),
            "nested-ecb" | "nested_ecb" | "ecb" => Ok(EnvelopeFormat::NestedEcb),
            other => Err(format!("unknown envelope format: {other}")),
        }
    }
}

/// Single-layer AES-CBC envelope with prepended IV.
#[derive(Debug, Clone, Copy, Default)]
pub struct CbcEnvelope;

impl CbcEnvelope {
    /// Encrypt `payload` under `key`.
    pub fn seal(payload: &EnvelopePayload, key: &Key) -> Result<String, TokenError> {
        let json = serde_json::to_string(payload).map_err(encode_error)?;
        Ok(crypto::encrypt(&json, key.secret())?)
    }
}

impl EnvelopeCodec for CbcEnvelope {
    fn format(&self) -> EnvelopeFormat {
        EnvelopeFormat::Cbc
    }

    fn open(
        &self,
        encoded: &str,
        key: &Key,
        _client_keys: Option<&dyn Keystore>,
    ) -> Result<RawEnvelope, TokenError> {
        let plaintext = crypto::decrypt(encoded, key.secret())?;
        let payload: EnvelopePayload = parse_json(&plaintext)?;
        Ok(RawEnvelope {
            generated: payload.generated,
            credentials: payload.credentials,
            client_key: None,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct NestedPayload {
    generated: i64,
    api_key: String,
    credentials: String,
}

/// Legacy two-key envelope: outer ECB layer carries an ECB-encrypted claim set.
#[derive(Debug, Clone, Copy, Default)]
pub struct NestedEcbEnvelope;

impl NestedEcbEnvelope {
    /// Encrypt `payload` credentials under `client_key`, then the outer layer
    /// under `outer_key`.
    pub fn seal(payload: &EnvelopePayload, outer_key: &Key, client_key: &Key) -> Result<String, TokenError> {
        let credentials_json = serde_json::to_string(&payload.credentials).map_err(encode_error)?;
        let inner = crypto::encrypt_ecb(&credentials_json, client_key.secret())?;

        let outer = NestedPayload {
            generated: payload.generated,
            api_key: client_key.name().to_string(),
            credentials: inner,
        };
        let outer_json = serde_json::to_string(&outer).map_err(encode_error)?;
        Ok(crypto::encrypt_ecb(&outer_json, outer_key.secret())?)
    }
}

impl EnvelopeCodec for NestedEcbEnvelope {
    fn format(&self) -> EnvelopeFormat {
        EnvelopeFormat::NestedEcb
    }

    fn open(
        &self,
        encoded: &str,
        key: &Key,
        client_keys: Option<&dyn Keystore>,
    ) -> Result<RawEnvelope, TokenError> {
        let outer_text = crypto::decrypt_ecb(encoded, key.secret())?;
        let outer: NestedPayload = parse_json(&outer_text)?;

        let client_key = client_keys
            .and_then(|keys| keys.get_key(&outer.api_key))
            .ok_or(TokenError::UnknownClientKey(outer.api_key))?;
        let inner_text = crypto::decrypt_ecb(&outer.credentials, client_key.secret())?;
        let credentials: Map<String, Value> = parse_json(&inner_text)?;

        Ok(RawEnvelope {
            generated: outer.generated,
            credentials,
            client_key: Some(client_key.name().to_string()),
        })
    }
}

fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, TokenError> {
    serde_json::from_str(text).map_err(|e| TokenError::ClaimParse(ClaimParseKind::classify(&e)))
}

fn encode_error(_: serde_json::Error) -> TokenError {
    TokenError::ClaimParse(ClaimParseKind::Encode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CryptoError;
    use crate::keystore::JsonKeystore;
    use serde_json::json;

    fn key() -> Key {
        Key::from_string("svc1", "0123456789abcdef").unwrap()
    }

    fn client_key() -> Key {
        Key::from_string("portal-client", "clientsecret1234").unwrap()
    }

    fn client_keys() -> JsonKeystore {
        let store = JsonKeystore::new();
        store.add_key(key());
        store.add_key(client_key());
        store
    }

    fn payload() -> EnvelopePayload {
        EnvelopePayload {
            generated: 1_700_000_000_000,
            credentials: json!({"username": "auser", "email": "foobar@example.com"})
                .as_object()
                .cloned()
                .unwrap(),
        }
    }

    #[test]
    fn cbc_seal_and_open() {
        let encoded = CbcEnvelope::seal(&payload(), &key()).unwrap();
        let raw = CbcEnvelope.open(&encoded, &key(), None).unwrap();
        assert_eq!(raw.generated, 1_700_000_000_000);
        assert_eq!(raw.credentials["username"], "auser");
        assert!(raw.client_key.is_none());
    }

    #[test]
    fn parse_failures_are_classified() {
        let cases = [
            (r#"{"generated": 5}"#, ClaimParseKind::MissingField),
            ("not json", ClaimParseKind::Syntax),
            (r#"{"generated": 5, "credentials": "#, ClaimParseKind::Syntax),
            (
                r#"{"generated": 5, "credentials": "ssn=123-45-6789"}"#,
                ClaimParseKind::WrongType,
            ),
        ];
        for (plaintext, kind) in cases {
            let encoded = crypto::encrypt(plaintext, key().secret()).unwrap();
            assert_eq!(
                CbcEnvelope.open(&encoded, &key(), None).unwrap_err(),
                TokenError::ClaimParse(kind),
                "{plaintext}"
            );
        }
    }

    #[test]
    fn parse_errors_do_not_quote_the_payload() {
        let encoded = crypto::encrypt(
            r#"{"generated": 5, "credentials": "ssn=123-45-6789"}"#,
            key().secret(),
        )
        .unwrap();
        let err = CbcEnvelope.open(&encoded, &key(), None).unwrap_err();
        assert!(!err.to_string().contains("ssn"));
        assert!(!format!("{err:?}").contains("ssn"));
    }

    #[test]
    fn cbc_surfaces_crypto_errors() {
        assert!(matches!(
            CbcEnvelope.open("%%%", &key(), None),
            Err(TokenError::Crypto(CryptoError::Base64))
        ));
    }

    #[test]
    fn nested_seal_and_open() {
        let keys = client_keys();
        let encoded = NestedEcbEnvelope::seal(&payload(), &key(), &client_key()).unwrap();
        let raw = NestedEcbEnvelope.open(&encoded, &key(), Some(&keys)).unwrap();
        assert_eq!(raw.generated, 1_700_000_000_000);
        assert_eq!(raw.credentials["email"], "foobar@example.com");
        assert_eq!(raw.client_key.as_deref(), Some("portal-client"));
    }

    #[test]
    fn nested_rejects_unregistered_client_key() {
        let rogue = Key::from_string("notinkeystore!!!", "notinkeystore!!!").unwrap();
        let encoded = NestedEcbEnvelope::seal(&payload(), &key(), &rogue).unwrap();

        let keys = client_keys();
        assert_eq!(
            NestedEcbEnvelope.open(&encoded, &key(), Some(&keys)).unwrap_err(),
            TokenError::UnknownClientKey("notinkeystore!!!".to_string())
        );
        assert!(matches!(
            NestedEcbEnvelope.open(&encoded, &key(), None),
            Err(TokenError::UnknownClientKey(_))
        ));
    }

    #[test]
    fn nested_inner_layer_uses_stored_secret() {
        // Same name as the registered client key, different secret.
        let forged = Key::from_string("portal-client", "portal-client123").unwrap();
        let encoded = NestedEcbEnvelope::seal(&payload(), &key(), &forged).unwrap();

        let keys = client_keys();
        assert!(NestedEcbEnvelope.open(&encoded, &key(), Some(&keys)).is_err());
    }

    #[test]
    fn nested_with_bad_client_key_fails() {
        let short = Key::from_string("short", "short").unwrap();
        let err = NestedEcbEnvelope::seal(&payload(), &key(), &short).unwrap_err();
        assert!(matches!(err, TokenError::Crypto(CryptoError::InvalidKeyLength(5))));
    }

    #[test]
    fn format_parses_from_config_strings() {
        assert_eq!("cbc".parse::<EnvelopeFormat>().unwrap(), EnvelopeFormat::Cbc);
        assert_eq!(
            "Nested-ECB".parse::<EnvelopeFormat>().unwrap(),
            EnvelopeFormat::NestedEcb
        );
        assert!("gcm".parse::<EnvelopeFormat>().is_err());
        assert_eq!(EnvelopeFormat::NestedEcb.codec().format(), EnvelopeFormat::NestedEcb);
    }
}
