// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Token Module
//!
//! A [`Token`] wraps the opaque string a client sends. Nothing is decrypted
//! until a [`Key`] is attached and either accessor is called; the outcome of
//! that single decode attempt is cached for the life of the instance.
//!
//! ## States
//!
//! ```text
//! Unkeyed --set_key--> Keyed --first access--> Decoded(Ok) | Decoded(Err)
//! ```
//!
//! A failed or unkeyed token reports `generated() == 0` and
//! `attributes() == None` rather than raising on every access.

pub mod attributes;
pub mod envelope;

pub use attributes::{resolve_claim_name, AttributePolicy, ClaimValue, TokenAttributes, USERNAME_CLAIM};
pub use envelope::{
    CbcEnvelope, EnvelopeCodec, EnvelopeFormat, EnvelopePayload, NestedEcbEnvelope, RawEnvelope,
};

use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::crypto::CryptoError;
use crate::keystore::{Key, Keystore};

/// Token decode failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Base64, key length, or padding failure
    #[error("token decryption failed: {0}")]
    Crypto(#[from] CryptoError),
    /// Decrypted text is not the expected JSON shape
    #[error("token payload is malformed: {0}")]
    ClaimParse(ClaimParseKind),
    /// Nested envelope names a client key the keystore does not hold
    #[error("token names an unregistered client key")]
    UnknownClientKey(String),
    /// Decode attempted before a key was attached
    #[error("no decryption key attached to token")]
    MissingKey,
    /// Key change attempted after the token was decoded
    #[error("token already decoded")]
    AlreadyDecoded,
}

/// Why a decrypted payload was rejected.
///
/// Carries no text from the payload itself; serde messages quote the
/// offending value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ClaimParseKind {
    #[error("not valid JSON")]
    Syntax,
    #[error("required field missing")]
    MissingField,
    #[error("field has the wrong type")]
    WrongType,
    #[error("payload could not be serialized")]
    Encode,
}

impl ClaimParseKind {
    pub(crate) fn classify(err: &serde_json::Error) -> Self {
        use serde_json::error::Category;

        match err.classify() {
            Category::Data if err.to_string().starts_with("missing field") => {
                ClaimParseKind::MissingField
            }
            Category::Data => ClaimParseKind::WrongType,
            Category::Io | Category::Syntax | Category::Eof => ClaimParseKind::Syntax,
        }
    }
}

/// Result of a successful decode.
#[derive(Debug, Clone)]
pub struct DecodedEnvelope {
    /// Generation time, milliseconds since the Unix epoch
    pub generated: i64,
    pub attributes: TokenAttributes,
    /// Inner client key name (nested envelopes only)
    pub client_key: Option<String>,
}

/// Lazily decoded client token.
///
/// Nested envelopes resolve their inner client key through `client_keys`,
/// borrowed for the life of the token.
pub struct Token<'k> {
    encoded: String,
    key: Option<Key>,
    client_keys: Option<&'k dyn Keystore>,
    policy: Arc<AttributePolicy>,
    codec: Arc<dyn EnvelopeCodec>,
    decoded: OnceCell<Result<DecodedEnvelope, TokenError>>,
}

impl<'k> Token<'k> {
    /// Wrap an encoded token using the default CBC envelope.
    pub fn new(encoded: impl Into<String>) -> Self {
        Self {
            encoded: encoded.into(),
            key: None,
            client_keys: None,
            policy: Arc::new(AttributePolicy::default()),
            codec: EnvelopeFormat::default().codec(),
            decoded: OnceCell::new(),
        }
    }

    /// Use a different envelope strategy.
    pub fn with_codec(mut self, codec: Arc<dyn EnvelopeCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Resolve nested client keys against `keystore`.
    pub fn with_client_keys(mut self, keystore: &'k dyn Keystore) -> Self {
        self.client_keys = Some(keystore);
        self
    }

    /// Use the given required-attribute list and alias map when decoding.
    pub fn with_policy(mut self, policy: Arc<AttributePolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Attach the decryption key. Rejected once a decode has happened.
    pub fn set_key(&mut self, key: Key) -> Result<(), TokenError> {
        if self.decoded.get().is_some() {
            return Err(TokenError::AlreadyDecoded);
        }
        self.key = Some(key);
        Ok(())
    }

    /// Replace the attribute policy. Rejected once a decode has happened.
    pub fn set_policy(&mut self, policy: Arc<AttributePolicy>) -> Result<(), TokenError> {
        if self.decoded.get().is_some() {
            return Err(TokenError::AlreadyDecoded);
        }
        self.policy = policy;
        Ok(())
    }

    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Name of the attached key, which identifies the issuing service.
    pub fn key_generator(&self) -> Option<&str> {
        self.key.as_ref().map(Key::name)
    }

    pub fn is_decoded(&self) -> bool {
        self.decoded.get().is_some()
    }

    /// Decode on first call and return the cached outcome thereafter.
    ///
    /// Without a key nothing is attempted or cached.
    pub fn decode(&self) -> Result<&DecodedEnvelope, TokenError> {
        let Some(key) = self.key.as_ref() else {
            return Err(TokenError::MissingKey);
        };

        self.decoded
            .get_or_init(|| self.decode_with(key))
            .as_ref()
            .map_err(|e| e.clone())
    }

    fn decode_with(&self, key: &Key) -> Result<DecodedEnvelope, TokenError> {
        match self.codec.open(&self.encoded, key, self.client_keys) {
            Ok(raw) => {
                tracing::debug!(service = key.name(), format = %self.codec.format(), "Token decrypted");
                Ok(DecodedEnvelope {
                    generated: raw.generated,
                    attributes: TokenAttributes::from_json_object(raw.credentials, Arc::clone(&self.policy)),
                    client_key: raw.client_key,
                })
            }
            Err(e) => {
                tracing::debug!(service = key.name(), error = %e, "Could not decrypt token");
                Err(e)
            }
        }
    }

    /// Generation time in milliseconds, or 0 when not decodable.
    pub fn generated(&self) -> i64 {
        self.decode().map(|d| d.generated).unwrap_or(0)
    }

    /// Generation time as a UTC timestamp, or the epoch when not decodable.
    pub fn generated_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.generated()).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Decoded claims, or `None` when not decodable.
    pub fn attributes(&self) -> Option<&TokenAttributes> {
        self.decode().ok().map(|d| &d.attributes)
    }

    /// Mutable claims for appending synthesized attributes.
    pub fn attributes_mut(&mut self) -> Option<&mut TokenAttributes> {
        // Force the decode so a keyed token is populated.
        let _ = self.decode();
        match self.decoded.get_mut() {
            Some(Ok(decoded)) => Some(&mut decoded.attributes),
            _ => None,
        }
    }

    /// Consume the token, yielding the decode outcome.
    pub fn into_decoded(self) -> Result<DecodedEnvelope, TokenError> {
        self.decode()?;
        match self.decoded.into_inner() {
            Some(result) => result,
            None => Err(TokenError::MissingKey),
        }
    }
}

impl fmt::Debug for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("key", &self.key_generator())
            .field("format", &self.codec.format())
            .field("decoded", &self.is_decoded())
            .finish()
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.key_generator().unwrap_or("unkeyed"), self.generated())
    }
}
