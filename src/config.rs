// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `KEYSTORE_PATH` | JSON file of `{name, data}` service keys | `keystore.json` |
//! | `TOKEN_MAX_DRIFT_SECONDS` | Allowed distance from token generation time | `300` |
//! | `TOKEN_REQUIRED_ATTRIBUTES` | Comma-separated logical claim names | `username` |
//! | `TOKEN_ATTRIBUTE_ALIASES` | Comma-separated `logical=actual` pairs | empty |
//! | `TOKEN_ENVELOPE_FORMAT` | `cbc` or `nested-ecb` | `cbc` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::auth::{VerifierSettings, DEFAULT_MAX_DRIFT_SECONDS};
use crate::token::{AttributePolicy, EnvelopeFormat, USERNAME_CLAIM};

/// Environment variable name for the server bind address.
pub const HOST_ENV: &str = "HOST";

/// Environment variable name for the server bind port.
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the keystore file path.
///
/// A missing or unreadable file leaves the keystore empty; every token is
/// then rejected as `unknown_service`.
pub const KEYSTORE_PATH_ENV: &str = "KEYSTORE_PATH";

/// Environment variable name for the allowed drift in seconds.
pub const MAX_DRIFT_ENV: &str = "TOKEN_MAX_DRIFT_SECONDS";

/// Environment variable name for the required attribute list.
pub const REQUIRED_ATTRIBUTES_ENV: &str = "TOKEN_REQUIRED_ATTRIBUTES";

/// Environment variable name for the attribute alias map.
///
/// # Example
/// `username=sAMAccountName,email=mail`
pub const ATTRIBUTE_ALIASES_ENV: &str = "TOKEN_ATTRIBUTE_ALIASES";

/// Environment variable name for the envelope format.
pub const ENVELOPE_FORMAT_ENV: &str = "TOKEN_ENVELOPE_FORMAT";

/// Environment variable name for the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_KEYSTORE_PATH: &str = "keystore.json";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(var: &'static str, reason: impl fmt::Display) -> Self {
        ConfigError::Invalid {
            var,
            reason: reason.to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub keystore_path: PathBuf,
    pub max_drift_seconds: u64,
    pub required_attributes: Vec<String>,
    pub attribute_aliases: HashMap<String, String>,
    pub envelope_format: EnvelopeFormat,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            keystore_path: PathBuf::from(DEFAULT_KEYSTORE_PATH),
            max_drift_seconds: DEFAULT_MAX_DRIFT_SECONDS,
            required_attributes: vec![USERNAME_CLAIM.to_string()],
            attribute_aliases: HashMap::new(),
            envelope_format: EnvelopeFormat::default(),
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for
    /// unset variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(host) = lookup(HOST_ENV) {
            config.host = host;
        }
        if let Some(port) = lookup(PORT_ENV) {
            config.port = parse_value(PORT_ENV, &port)?;
        }
        if let Some(path) = lookup(KEYSTORE_PATH_ENV) {
            config.keystore_path = PathBuf::from(path);
        }
        if let Some(drift) = lookup(MAX_DRIFT_ENV) {
            config.max_drift_seconds = parse_value(MAX_DRIFT_ENV, &drift)?;
        }
        if let Some(required) = lookup(REQUIRED_ATTRIBUTES_ENV) {
            config.required_attributes = parse_list(&required);
        }
        if let Some(aliases) = lookup(ATTRIBUTE_ALIASES_ENV) {
            config.attribute_aliases = parse_aliases(&aliases)?;
        }
        if let Some(format) = lookup(ENVELOPE_FORMAT_ENV) {
            config.envelope_format = parse_value(ENVELOPE_FORMAT_ENV, &format)?;
        }
        if let Some(format) = lookup(LOG_FORMAT_ENV) {
            config.log_format = parse_value(LOG_FORMAT_ENV, &format)?;
        }

        Ok(config)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::invalid(HOST_ENV, e))
    }

    pub fn attribute_policy(&self) -> AttributePolicy {
        AttributePolicy::new(
            self.required_attributes.clone(),
            self.attribute_aliases.clone(),
        )
    }

    pub fn verifier_settings(&self) -> VerifierSettings {
        VerifierSettings::new(
            self.attribute_policy(),
            self.max_drift_seconds,
            self.envelope_format,
        )
    }
}

fn parse_value<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|e| ConfigError::invalid(var, e))
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_aliases(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    parse_list(raw)
        .into_iter()
        .map(|pair| match pair.split_once('=') {
            Some((logical, actual)) if !logical.trim().is_empty() && !actual.trim().is_empty() => {
                Ok((logical.trim().to_string(), actual.trim().to_string()))
            }
            _ => Err(ConfigError::invalid(
                ATTRIBUTE_ALIASES_ENV,
                format!("expected logical=actual, got {pair:?}"),
            )),
        })
        .collect()
}
