// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::token::TokenError;

/// Terminal outcome of a failed token verification.
///
/// Exactly one is produced per failed call; none are retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Service identifier, or a nested client key, has no key in the keystore
    #[error("token service is not registered")]
    UnknownService(String),
    /// Envelope could not be decrypted or parsed.
    ///
    /// Renders one fixed message for every cause; the cause is only
    /// reachable through `source()`.
    #[error("token could not be decoded")]
    BadToken(#[source] TokenError),
    /// Decoded claims lack the username or a required attribute
    #[error("token is missing required attributes: {}", .0.join(", "))]
    MissingRequiredAttributes(Vec<String>),
    /// Generation time is outside the allowed drift
    #[error("token expired: generated {drift_seconds}s from now, limit {max_drift_seconds}s")]
    TokenExpired {
        drift_seconds: u64,
        max_drift_seconds: u64,
    },
    /// Asserted username differs from the token's username claim
    #[error("token was issued for a different user")]
    UsernameMismatch { asserted: String, claimed: String },
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::UnknownService(_) => "unknown_service",
            AuthError::BadToken(_) => "bad_token",
            AuthError::MissingRequiredAttributes(_) => "missing_required_attributes",
            AuthError::TokenExpired { .. } => "token_expired",
            AuthError::UsernameMismatch { .. } => "username_mismatch",
        }
    }

    /// Message key understood by host authentication frameworks.
    pub fn message_key(&self) -> &'static str {
        match self {
            AuthError::UnknownService(_) => "error.authentication.credentials.bad.token.apikey",
            AuthError::BadToken(_) => "error.authentication.credentials.bad.token.key",
            AuthError::MissingRequiredAttributes(_) => {
                "error.authentication.credentials.missing.required.attributes"
            }
            AuthError::TokenExpired { .. } => "error.authentication.credentials.bad.token.expired",
            AuthError::UsernameMismatch { .. } => "error.authentication.credentials.bad.token.username",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::UnknownService(_)
            | AuthError::BadToken(_)
            | AuthError::TokenExpired { .. }
            | AuthError::UsernameMismatch { .. } => StatusCode::UNAUTHORIZED,
            AuthError::MissingRequiredAttributes(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
