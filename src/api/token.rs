// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::collections::BTreeMap;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::{TokenCredentials, VerifiedIdentity},
    error::{ApiError, ErrorBody},
    state::AppState,
};

/// Successful login: the verified identity plus authentication metadata.
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenLoginResponse {
    #[serde(flatten)]
    pub identity: VerifiedIdentity,
    /// `tokenGenerator` and `generated`
    #[schema(value_type = Object)]
    pub authentication: BTreeMap<&'static str, String>,
}

impl From<VerifiedIdentity> for TokenLoginResponse {
    fn from(identity: VerifiedIdentity) -> Self {
        Self {
            authentication: identity.authentication_attributes(),
            identity,
        }
    }
}

fn login(state: &AppState, credentials: &TokenCredentials) -> Result<Json<TokenLoginResponse>, ApiError> {
    let identity = state.verifier.verify_now(credentials)?;
    Ok(Json(identity.into()))
}

/// `GET /v1/auth/token?username=..&token_service=..&auth_token=..`
#[utoipa::path(
    get,
    path = "/v1/auth/token",
    params(TokenCredentials),
    tag = "Auth",
    responses(
        (status = 200, description = "Token verified", body = TokenLoginResponse),
        (status = 400, description = "Missing or malformed parameters", body = ErrorBody),
        (status = 401, description = "Token rejected", body = ErrorBody),
        (status = 403, description = "Token lacks required attributes", body = ErrorBody)
    )
)]
pub async fn login_query(
    State(state): State<AppState>,
    query: Result<Query<TokenCredentials>, QueryRejection>,
) -> Result<Json<TokenLoginResponse>, ApiError> {
    let Query(credentials) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    login(&state, &credentials)
}

/// `POST /v1/auth/token` with a JSON body.
#[utoipa::path(
    post,
    path = "/v1/auth/token",
    request_body = TokenCredentials,
    tag = "Auth",
    responses(
        (status = 200, description = "Token verified", body = TokenLoginResponse),
        (status = 400, description = "Missing or malformed body", body = ErrorBody),
        (status = 401, description = "Token rejected", body = ErrorBody),
        (status = 403, description = "Token lacks required attributes", body = ErrorBody)
    )
)]
pub async fn login_json(
    State(state): State<AppState>,
    body: Result<Json<TokenCredentials>, JsonRejection>,
) -> Result<Json<TokenLoginResponse>, ApiError> {
    let Json(credentials) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    login(&state, &credentials)
}
