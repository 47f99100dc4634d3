// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Named symmetric keys.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::KeystoreError;
use crate::crypto::derive_printable_secret;

/// An immutable (name, secret) pair.
///
/// Equality and hashing use the name only. The secret is shared behind an
/// `Arc`, so cloning a key out of a keystore does not copy key material.
#[derive(Clone)]
pub struct Key {
    name: String,
    secret: Arc<[u8]>,
}

impl Key {
    /// Create a key from raw secret bytes.
    pub fn new(name: impl Into<String>, secret: impl Into<Vec<u8>>) -> Result<Self, KeystoreError> {
        let name = name.into();
        let secret = secret.into();
        if name.is_empty() {
            return Err(KeystoreError::EmptyName);
        }
        if secret.is_empty() {
            return Err(KeystoreError::EmptySecret(name));
        }
        Ok(Self {
            name,
            secret: secret.into(),
        })
    }

    /// Create a key whose secret is the UTF-8 bytes of `data`.
    pub fn from_string(name: impl Into<String>, data: &str) -> Result<Self, KeystoreError> {
        Self::new(name, data.as_bytes().to_vec())
    }

    /// Generate a key with a fresh printable secret seeded by its name.
    pub fn generate(name: impl Into<String>) -> Result<Self, KeystoreError> {
        let name = name.into();
        let secret = derive_printable_secret(&name)?;
        Self::new(name, secret.into_bytes())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    /// Secret rendered as a string, as stored in the keystore file.
    pub fn secret_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.secret).ok()
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .finish()
    }
}
