//! Error types for the cache server
//!
//! Provides unified error handling using thiserror. Lookup misses are not
//! errors; see [`GetOutcome`](crate::service::GetOutcome).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::persistence::PersistenceError;

// == Cache Error Enum ==
/// Unified error type for the cache server.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Malformed `set` or `initialize` input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The backing store rejected a durable write
    #[error("Persistence failure: {0}")]
    Persistence(#[from] PersistenceError),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            CacheError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache server.
pub type Result<T> = std::result::Result<T, CacheError>;
