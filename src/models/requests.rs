//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::PersistenceMode;

/// Request body for `POST /initialize`
#[derive(Debug, Clone, Deserialize)]
pub struct InitializeRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Namespace to register
    #[serde(rename = "dbName", alias = "namespace", default)]
    pub db_name: String,
}

/// The `persistence` field accepts a flag or a named mode.
///
/// `true` means durable, `false` means none; strings name a mode directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PersistenceOption {
    Flag(bool),
    Named(PersistenceMode),
}

impl From<PersistenceOption> for PersistenceMode {
    fn from(option: PersistenceOption) -> Self {
        match option {
            PersistenceOption::Flag(true) => PersistenceMode::Durable,
            PersistenceOption::Flag(false) => PersistenceMode::None,
            PersistenceOption::Named(mode) => mode,
        }
    }
}

/// Request body for `POST /{db}/set`
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: A string stored verbatim, or any other JSON value stored as
///   its serialization
/// - `ttl`: TTL in seconds, must be positive
/// - `persistence`: Optional durability mode
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub ttl: Option<i64>,
    #[serde(default)]
    pub persistence: Option<PersistenceOption>,
}

impl SetRequest {
    /// The value as it will be stored, if one was supplied.
    pub fn stored_value(&self) -> Option<String> {
        match self.value.as_ref()? {
            Value::Null => None,
            Value::String(raw) => Some(raw.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn persistence_mode(&self) -> PersistenceMode {
        self.persistence.map(PersistenceMode::from).unwrap_or_default()
    }

    /// Validates the request data
    ///
    /// Returns an error message if a required field is missing, None if the
    /// request can be handed to the cache.
    pub fn validate(&self) -> Option<String> {
        let missing_key = self.key.as_deref().map_or(true, str::is_empty);
        let missing_value = self.stored_value().map_or(true, |v| v.is_empty());
        if missing_key || missing_value || self.ttl.is_none() {
            return Some("Missing required parameters: key, value, ttl".to_string());
        }
        None
    }
}

/// Query string for `GET /{db}/get`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetParams {
    pub key: Option<String>,
    pub query: Option<String>,
}

/// Query string for `DELETE /{db}/del`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyParams {
    pub key: Option<String>,
}
