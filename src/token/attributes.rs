// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Claim set carried in a token's `credentials` object.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::Value;

/// Logical name of the claim holding the principal's username.
pub const USERNAME_CLAIM: &str = "username";

/// A single claim value: a string or an ordered list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Scalar(String),
    List(Vec<String>),
}

impl ClaimValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ClaimValue::Scalar(s) => Some(s),
            ClaimValue::List(_) => None,
        }
    }

    /// Convert a JSON value. `null` has no claim representation.
    fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Array(items) => Some(ClaimValue::List(items.into_iter().map(json_text).collect())),
            other => Some(ClaimValue::Scalar(json_text(other))),
        }
    }
}

impl From<String> for ClaimValue {
    fn from(value: String) -> Self {
        ClaimValue::Scalar(value)
    }
}

impl From<&str> for ClaimValue {
    fn from(value: &str) -> Self {
        ClaimValue::Scalar(value.to_string())
    }
}

impl From<Vec<String>> for ClaimValue {
    fn from(value: Vec<String>) -> Self {
        ClaimValue::List(value)
    }
}

/// Strings keep their raw text; everything else renders as compact JSON.
fn json_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Map a logical claim name to the claim name used in the payload.
///
/// The alias map wins; otherwise the lower-cased logical name is used.
pub fn resolve_claim_name<'a>(logical: &'a str, aliases: &'a HashMap<String, String>) -> Cow<'a, str> {
    match aliases.get(logical) {
        Some(actual) => Cow::Borrowed(actual.as_str()),
        None => Cow::Owned(logical.to_lowercase()),
    }
}

/// Server-side rules applied to every decoded claim set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributePolicy {
    /// Logical names that must resolve to a value (username is always implied).
    pub required: Vec<String>,
    /// Logical name to actual claim name.
    pub aliases: HashMap<String, String>,
}

impl AttributePolicy {
    pub fn new(required: Vec<String>, aliases: HashMap<String, String>) -> Self {
        Self { required, aliases }
    }

    pub fn resolve<'a>(&'a self, logical: &'a str) -> Cow<'a, str> {
        resolve_claim_name(logical, &self.aliases)
    }
}

/// Decoded claims plus the policy used to read and validate them.
#[derive(Debug, Clone)]
pub struct TokenAttributes {
    claims: BTreeMap<String, ClaimValue>,
    policy: Arc<AttributePolicy>,
}

impl TokenAttributes {
    /// Build from a decoded `credentials` object.
    pub fn from_json_object(object: serde_json::Map<String, Value>, policy: Arc<AttributePolicy>) -> Self {
        let claims = object
            .into_iter()
            .filter_map(|(name, value)| ClaimValue::from_json(value).map(|v| (name, v)))
            .collect();
        Self { claims, policy }
    }

    /// Build from the JSON text of a `credentials` object.
    pub fn from_json_str(data: &str, policy: Arc<AttributePolicy>) -> Result<Self, serde_json::Error> {
        let object = serde_json::from_str(data)?;
        Ok(Self::from_json_object(object, policy))
    }

    pub fn policy(&self) -> &AttributePolicy {
        &self.policy
    }

    /// Look up a claim by logical name.
    pub fn get(&self, logical: &str) -> Option<&ClaimValue> {
        let actual = self.policy.resolve(logical);
        self.claims.get(actual.as_ref())
    }

    /// Look up a scalar claim by logical name.
    pub fn get_str(&self, logical: &str) -> Option<&str> {
        self.get(logical).and_then(ClaimValue::as_str)
    }

    /// Write a claim through the same alias resolution as [`get`](Self::get).
    pub fn set(&mut self, logical: &str, value: impl Into<ClaimValue>) {
        let actual = self.policy.resolve(logical).into_owned();
        self.claims.insert(actual, value.into());
    }

    /// Username claim, which must be a scalar.
    pub fn username(&self) -> Option<&str> {
        self.get_str(USERNAME_CLAIM)
    }

    /// Logical names that fail to resolve. The username is always checked.
    pub fn missing_required(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.username().is_none() {
            missing.push(USERNAME_CLAIM.to_string());
        }
        for name in &self.policy.required {
            if self.get(name).is_none() && !missing.contains(name) {
                missing.push(name.clone());
            }
        }
        missing
    }

    pub fn is_valid(&self) -> bool {
        self.username().is_some()
            && self.policy.required.iter().all(|name| self.get(name).is_some())
    }

    /// Raw claims keyed by their actual payload names.
    pub fn claims(&self) -> &BTreeMap<String, ClaimValue> {
        &self.claims
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

impl Serialize for TokenAttributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.claims.serialize(serializer)
    }
}
