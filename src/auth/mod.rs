// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Verifies pre-shared-key tokens issued by trusted services.
//!
//! ## Auth Flow
//!
//! 1. A trusted service encrypts `{generated, credentials}` under its key
//! 2. The client presents `username`, `token_service` and `auth_token`
//! 3. The server:
//!    - Looks up the key named by `token_service`
//!    - Decrypts and parses the envelope
//!    - Checks required attributes, generation-time drift and the username
//!
//! ## Security
//!
//! - Keys and decrypted claims are never logged
//! - A failure on one check short-circuits all later checks
//! - Default drift tolerance is 300 seconds in either direction

pub mod error;
pub mod verifier;

pub use error::AuthError;
pub use verifier::{
    verify, TokenCredentials, TokenVerifier, VerifiedIdentity, VerifierSettings,
    DEFAULT_MAX_DRIFT_SECONDS, TOKEN_GENERATION_TIME_ATTRIBUTE, TOKEN_GENERATOR_ATTRIBUTE,
};
