//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::StatsSnapshot;

/// Response body for a live lookup (`GET /{db}/get`)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value, or the projected sub-value when a query was given
    pub value: Value,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for a lookup that produced no value
#[derive(Debug, Clone, Serialize)]
pub struct LookupMissResponse {
    /// Human readable reason
    pub message: String,
    /// Machine readable outcome: `not_found`, `expired`, `query_miss` or
    /// `query_not_applicable`
    pub status: &'static str,
}

impl LookupMissResponse {
    pub fn new(message: impl Into<String>, status: &'static str) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }
}

/// Response body for the SET operation
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
}

impl SetResponse {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            message: "Cache set successfully!".to_string(),
            key: key.into(),
        }
    }
}

/// Response body for the DELETE operation
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// The key that was targeted
    pub key: String,
    /// Whether a live entry was removed
    pub deleted: bool,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>, deleted: bool) -> Self {
        Self {
            key: key.into(),
            deleted,
        }
    }
}

/// Response body for `POST /initialize`
#[derive(Debug, Clone, Serialize)]
pub struct InitializeResponse {
    pub message: String,
    /// Address the namespace's requests should be sent to
    #[serde(rename = "apiUrl")]
    pub api_url: String,
}

impl InitializeResponse {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            message: "Database initialized".to_string(),
            api_url: api_url.into(),
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub counters: StatsSnapshot,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<StatsSnapshot> for StatsResponse {
    fn from(counters: StatsSnapshot) -> Self {
        Self {
            hit_rate: counters.hit_rate(),
            counters,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
