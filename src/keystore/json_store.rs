// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON file backed keystore.
//!
//! Loading never aborts startup: a missing or malformed file is logged and
//! leaves the store empty, since keys may be added after construction.
//! Saving writes a temp file and renames it over the target.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn, Span};

use super::{Key, Keystore, KeystoreError};

/// On-disk row: `{ "name": ..., "data": ... }`.
#[derive(Debug, Serialize, Deserialize)]
struct KeyRecord {
    name: String,
    data: String,
}

/// Keystore persisted as a JSON array of name/data rows.
pub struct JsonKeystore {
    keys: RwLock<HashMap<String, Key>>,
    store_file: RwLock<Option<PathBuf>>,
    span: Span,
}

impl Default for JsonKeystore {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonKeystore {
    /// Create an empty keystore with no associated file.
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
            store_file: RwLock::new(None),
            span: tracing::info_span!("keystore"),
        }
    }

    /// Attach the span keystore events are recorded under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Create a keystore bound to `path`, loading it when the file exists.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let store = Self::new();
        store.open_file(path.as_ref());
        store
    }

    /// Bind to `path` and load it when the file exists.
    pub fn open_file(&self, path: &Path) {
        if path.exists() {
            self.load(path);
        } else {
            info!(parent: &self.span, path = %path.display(), "Keystore file not found, starting empty");
            *self.store_file.write() = Some(path.to_path_buf());
        }
    }

    /// Path the store was last loaded from or bound to.
    pub fn store_file(&self) -> Option<PathBuf> {
        self.store_file.read().clone()
    }

    /// Replace the in-memory entries with the contents of `path`.
    ///
    /// Failures are logged and leave the store empty. Returns the number of
    /// keys loaded.
    pub fn load(&self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        *self.store_file.write() = Some(path.to_path_buf());

        match self.try_load(path) {
            Ok(count) => count,
            Err(e) => {
                error!(parent: &self.span, path = %path.display(), error = %e, "Could not load keystore, continuing with an empty store");
                self.keys.write().clear();
                0
            }
        }
    }

    /// Strict variant of [`load`](Self::load) that surfaces the failure.
    ///
    /// On error the current entries are left untouched.
    pub fn try_load(&self, path: impl AsRef<Path>) -> Result<usize, KeystoreError> {
        let path = path.as_ref();
        let records = read_records(path)?;

        let mut loaded = HashMap::with_capacity(records.len());
        for record in records {
            match Key::from_string(record.name, &record.data) {
                Ok(key) => {
                    debug!(parent: &self.span, name = key.name(), "Adding key to keystore");
                    // Duplicate names: last row wins.
                    loaded.insert(key.name().to_string(), key);
                }
                Err(e) => {
                    warn!(parent: &self.span, error = %e, "Skipping invalid keystore row");
                }
            }
        }

        let count = loaded.len();
        *self.keys.write() = loaded;
        info!(parent: &self.span, path = %path.display(), count, "Keystore loaded");
        Ok(count)
    }

    /// Serialize every key to `path`, atomically replacing the file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), KeystoreError> {
        let path = path.as_ref();

        let mut records = Vec::new();
        for key in self.keys() {
            let data = key
                .secret_str()
                .ok_or_else(|| KeystoreError::NonUtf8Secret(key.name().to_string()))?
                .to_string();
            records.push(KeyRecord {
                name: key.name().to_string(),
                data,
            });
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));

        write_records(path, &records)?;
        info!(parent: &self.span, path = %path.display(), count = records.len(), "Keystore saved");
        Ok(())
    }

    /// Save to the file the store was opened or loaded from.
    pub fn persist(&self) -> Result<(), KeystoreError> {
        let path = self.store_file().ok_or(KeystoreError::NoStoreFile)?;
        self.save(path)
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

impl Keystore for JsonKeystore {
    fn keys(&self) -> Vec<Key> {
        self.keys.read().values().cloned().collect()
    }

    fn add_key(&self, key: Key) {
        debug!(parent: &self.span, name = key.name(), "Key added");
        self.keys.write().insert(key.name().to_string(), key);
    }

    fn get_key(&self, name: &str) -> Option<Key> {
        self.keys.read().get(name).cloned()
    }

    fn remove_key(&self, name: &str) -> Option<Key> {
        let removed = self.keys.write().remove(name);
        if removed.is_some() {
            debug!(parent: &self.span, name, "Key removed");
        }
        removed
    }
}

fn read_records(path: &Path) -> Result<Vec<KeyRecord>, KeystoreError> {
    let file = File::open(path).map_err(|e| KeystoreError::io(path, e))?;
    let reader = BufReader::new(file);
    let records = serde_json::from_reader(reader)?;
    Ok(records)
}

fn write_records(path: &Path, records: &[KeyRecord]) -> Result<(), KeystoreError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| KeystoreError::io(parent, e))?;

    // Uniquely named temp file beside the target; dropped (and removed) on error.
    let mut temp = NamedTempFile::new_in(parent).map_err(|e| KeystoreError::io(parent, e))?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, records)?;
        writer.flush().map_err(|e| KeystoreError::io(path, e))?;
    }

    temp.persist(path).map_err(|e| KeystoreError::io(path, e.error))?;
    Ok(())
}
