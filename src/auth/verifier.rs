// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token verification engine.
//!
//! ## Check Order
//!
//! 1. Resolve the service key (`UnknownService`)
//! 2. Decrypt and parse the envelope (`BadToken`)
//! 3. Required attributes present (`MissingRequiredAttributes`)
//! 4. `|now - generated| <= max_drift` (`TokenExpired`)
//! 5. Claimed username equals asserted username (`UsernameMismatch`)
//!
//! Each step assumes the previous ones passed.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::Span;
use utoipa::{IntoParams, ToSchema};

use super::AuthError;
use crate::keystore::Keystore;
use crate::token::{
    AttributePolicy, EnvelopeCodec, EnvelopeFormat, Token, TokenAttributes, TokenError,
};

/// Default allowed drift between token generation and verification.
pub const DEFAULT_MAX_DRIFT_SECONDS: u64 = 300;

/// Metadata attribute naming the service that issued the token.
pub const TOKEN_GENERATOR_ATTRIBUTE: &str = "tokenGenerator";

/// Metadata attribute holding the token generation time.
pub const TOKEN_GENERATION_TIME_ATTRIBUTE: &str = "generated";

/// Parameters a client presents to authenticate.
///
/// Field names match the login query string:
/// `?username=..&token_service=..&auth_token=..`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TokenCredentials {
    /// Username asserted by the client
    pub username: String,
    /// Service identifier, which names the keystore key
    pub token_service: String,
    /// Encoded envelope
    pub auth_token: String,
}

impl TokenCredentials {
    pub fn new(
        username: impl Into<String>,
        token_service: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            token_service: token_service.into(),
            auth_token: auth_token.into(),
        }
    }
}

/// Server-side verification rules.
#[derive(Debug, Clone)]
pub struct VerifierSettings {
    pub policy: Arc<AttributePolicy>,
    pub max_drift_seconds: u64,
    pub codec: Arc<dyn EnvelopeCodec>,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            policy: Arc::new(AttributePolicy::default()),
            max_drift_seconds: DEFAULT_MAX_DRIFT_SECONDS,
            codec: EnvelopeFormat::default().codec(),
        }
    }
}

impl VerifierSettings {
    pub fn new(policy: AttributePolicy, max_drift_seconds: u64, format: EnvelopeFormat) -> Self {
        Self {
            policy: Arc::new(policy),
            max_drift_seconds,
            codec: format.codec(),
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn EnvelopeCodec>) -> Self {
        self.codec = codec;
        self
    }
}

/// Snapshot returned by a successful verification.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VerifiedIdentity {
    pub username: String,
    /// Claims keyed by payload name; values are strings or string lists
    #[schema(value_type = Object)]
    pub attributes: TokenAttributes,
    pub generated: DateTime<Utc>,
    /// Service identifier (key name) that opened the token
    pub service: String,
    /// Inner client key, for nested envelopes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
}

impl VerifiedIdentity {
    /// Authentication metadata recorded alongside the principal.
    pub fn authentication_attributes(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            (TOKEN_GENERATOR_ATTRIBUTE, self.service.clone()),
            (
                TOKEN_GENERATION_TIME_ATTRIBUTE,
                self.generated.to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
        ])
    }
}

/// Verify a token against `keystore`.
///
/// `now` is the verifier's clock; drift is measured in whole seconds.
pub fn verify(
    asserted_username: &str,
    service_identifier: &str,
    encoded_token: &str,
    keystore: &dyn Keystore,
    settings: &VerifierSettings,
    now: DateTime<Utc>,
) -> Result<VerifiedIdentity, AuthError> {
    let key = keystore
        .get_key(service_identifier)
        .ok_or_else(|| AuthError::UnknownService(service_identifier.to_string()))?;

    let mut token = Token::new(encoded_token)
        .with_codec(Arc::clone(&settings.codec))
        .with_policy(Arc::clone(&settings.policy))
        .with_client_keys(keystore);
    token.set_key(key).map_err(AuthError::BadToken)?;

    let decoded = token.into_decoded().map_err(|e| match e {
        TokenError::UnknownClientKey(client_key) => AuthError::UnknownService(client_key),
        other => AuthError::BadToken(other),
    })?;
    let attributes = decoded.attributes;

    if !attributes.is_valid() {
        return Err(AuthError::MissingRequiredAttributes(attributes.missing_required()));
    }

    let drift_seconds = now
        .timestamp_millis()
        .abs_diff(decoded.generated)
        / 1000;
    tracing::debug!(service = service_identifier, drift_seconds, "Token drift computed");
    if drift_seconds > settings.max_drift_seconds {
        return Err(AuthError::TokenExpired {
            drift_seconds,
            max_drift_seconds: settings.max_drift_seconds,
        });
    }

    let claimed = attributes
        .username()
        .ok_or_else(|| AuthError::MissingRequiredAttributes(attributes.missing_required()))?;
    if claimed != asserted_username {
        return Err(AuthError::UsernameMismatch {
            asserted: asserted_username.to_string(),
            claimed: claimed.to_string(),
        });
    }

    Ok(VerifiedIdentity {
        username: claimed.to_string(),
        generated: DateTime::from_timestamp_millis(decoded.generated)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        service: service_identifier.to_string(),
        client_key: decoded.client_key,
        attributes,
    })
}

/// Verification engine bound to a shared keystore.
pub struct TokenVerifier {
    keystore: Arc<dyn Keystore>,
    settings: VerifierSettings,
    span: Span,
}

impl TokenVerifier {
    pub fn new(keystore: Arc<dyn Keystore>, settings: VerifierSettings) -> Self {
        Self {
            keystore,
            settings,
            span: tracing::info_span!("token_verifier"),
        }
    }

    /// Attach the span verification events are recorded under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn settings(&self) -> &VerifierSettings {
        &self.settings
    }

    pub fn keystore(&self) -> &Arc<dyn Keystore> {
        &self.keystore
    }

    /// Verify `credentials` as of `now`.
    pub fn verify(
        &self,
        credentials: &TokenCredentials,
        now: DateTime<Utc>,
    ) -> Result<VerifiedIdentity, AuthError> {
        self.span.in_scope(|| {
            let result = verify(
                &credentials.username,
                &credentials.token_service,
                &credentials.auth_token,
                self.keystore.as_ref(),
                &self.settings,
                now,
            );
            match &result {
                Ok(identity) => tracing::info!(
                    service = %identity.service,
                    username = %identity.username,
                    "Token authentication succeeded"
                ),
                Err(e) => {
                    if let AuthError::BadToken(cause) = e {
                        tracing::debug!(
                            service = %credentials.token_service,
                            cause = %cause,
                            "Token decode failure detail"
                        );
                    }
                    tracing::warn!(
                        service = %credentials.token_service,
                        username = %credentials.username,
                        error_code = e.error_code(),
                        error = %e,
                        "Token authentication failed"
                    );
                }
            }
            result
        })
    }

    /// Verify `credentials` against the current wall clock.
    pub fn verify_now(&self, credentials: &TokenCredentials) -> Result<VerifiedIdentity, AuthError> {
        self.verify(credentials, Utc::now())
    }
}
