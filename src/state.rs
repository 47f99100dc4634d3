// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{TokenVerifier, VerifierSettings};
use crate::keystore::{JsonKeystore, Keystore};

#[derive(Clone)]
pub struct AppState {
    pub keystore: Arc<JsonKeystore>,
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    pub fn new(keystore: JsonKeystore, settings: VerifierSettings) -> Self {
        let keystore = Arc::new(keystore);
        let shared: Arc<dyn Keystore> = keystore.clone();
        Self {
            verifier: Arc::new(TokenVerifier::new(shared, settings)),
            keystore,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(JsonKeystore::new(), VerifierSettings::default())
    }
}
