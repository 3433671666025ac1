//! Message header map and the well-known header keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{MsgError, Result};

pub const MESSAGE_ID: &str = "ID";
pub const MESSAGE_DATE: &str = "DATE";
pub const MESSAGE_CHANNEL: &str = "CHANNEL";

pub const COMMAND_PREFIX: &str = "COMMAND_";
pub const COMMAND_NAME: &str = "COMMAND_NAME";
pub const COMMAND_REPLY_CHANNEL: &str = "COMMAND_REPLY_CHANNEL";

pub const REPLY_PREFIX: &str = "REPLY_";
pub const REPLY_NAME: &str = "REPLY_NAME";
pub const REPLY_OUTCOME: &str = "REPLY_OUTCOME";

/// Outcome value for successful replies.
pub const OUTCOME_SUCCESS: &str = "SUCCESS";
/// Outcome value for failed replies.
pub const OUTCOME_FAILURE: &str = "FAILURE";

/// Case-sensitive string headers attached to every message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns the value for `key` or a [`MsgError::MissingHeader`].
    pub fn get_required(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| MsgError::MissingHeader(key.to_string()))
    }

    /// Sets or overwrites `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style variant of [`Headers::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Copies every entry of `other` over this map.
    pub fn extend(&mut self, other: Headers) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
