// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token Auth Server - Encrypted Identity Token Verification
//!
//! Trusted client services encrypt a timestamped claim set under a key
//! shared with this server. Users present the resulting token together with
//! their username and the issuing service's identifier; the server decrypts,
//! validates, and returns the verified identity.
//!
//! ## Modules
//!
//! - `crypto` - AES envelope cipher and printable secret generation
//! - `keystore` - Named service keys backed by a JSON file
//! - `token` - Lazily decoded tokens and their claim sets
//! - `auth` - Verification engine and its error taxonomy
//! - `api` - HTTP handlers (Axum)

pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keystore;
pub mod observability;
pub mod state;
pub mod token;
