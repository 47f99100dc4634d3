// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Keystore Module
//!
//! Name-indexed storage of the per-service keys used to open tokens.
//!
//! ## File Format
//!
//! ```text
//! [
//!   { "name": "alphabet_key", "data": "EKyrqGJnFQrUzohURXsJprFgBAKAPtrv" },
//!   { "name": "bar", "data": "xagkrotMHogRhPpqLtCYsPtbYqdihfqw" }
//! ]
//! ```
//!
//! A key's name is the service identifier clients send with their tokens.

pub mod json_store;
pub mod key;

pub use json_store::JsonKeystore;
pub use key::Key;

use std::io;
use std::path::PathBuf;

use crate::crypto::CryptoError;

/// A set of named keys, safe to share across request threads.
pub trait Keystore: Send + Sync {
    /// Snapshot of every key in the store.
    fn keys(&self) -> Vec<Key>;

    /// Insert a key, replacing any existing key with the same name.
    fn add_key(&self, key: Key);

    /// Look up a key by name.
    fn get_key(&self, name: &str) -> Option<Key>;

    /// Remove a key by name, returning it if present.
    fn remove_key(&self, name: &str) -> Option<Key>;
}

/// Errors for key construction and keystore persistence.
#[derive(Debug, thiserror::Error)]
pub enum KeystoreError {
    #[error("key name cannot be empty")]
    EmptyName,
    #[error("key data cannot be empty for key {0}")]
    EmptySecret(String),
    #[error("key {0} has a non UTF-8 secret and cannot be stored as JSON")]
    NonUtf8Secret(String),
    #[error("no keystore file associated with this store")]
    NoStoreFile,
    #[error("keystore I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("keystore JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("key generation failed: {0}")]
    Crypto(#[from] CryptoError),
}

impl KeystoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        KeystoreError::Io {
            path: path.into(),
            source,
        }
    }
}
