//! API Handlers
//!
//! HTTP request handlers. Each one parses its input, calls a single cache
//! service operation and renders the result.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, GetParams, GetResponse, HealthResponse, InitializeRequest,
    InitializeResponse, KeyParams, LookupMissResponse, SetRequest, SetResponse, StatsResponse,
};
use crate::service::{CacheService, GetOutcome};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheService>,
}

impl AppState {
    /// Creates a new AppState around the given service.
    pub fn new(cache: CacheService) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Opens the cache service described by the configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(CacheService::open(config).await?))
    }
}

/// Handler for POST /initialize
pub async fn initialize_handler(
    State(state): State<AppState>,
    Json(req): Json<InitializeRequest>,
) -> Result<Json<InitializeResponse>> {
    let api_url = state
        .cache
        .initialize(&req.name, &req.email, &req.db_name)?;

    Ok(Json(InitializeResponse::new(api_url)))
}

/// Handler for POST /{db}/set
pub async fn set_handler(
    State(state): State<AppState>,
    Path(db): Path<String>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidArgument(error_msg));
    }

    let key = req.key.clone().unwrap_or_default();
    let value = req.stored_value().unwrap_or_default();
    let ttl = req.ttl.unwrap_or_default();

    state
        .cache
        .set(&db, &key, &value, ttl, req.persistence_mode())
        .await?;

    Ok(Json(SetResponse::new(key)))
}

/// Handler for GET /{db}/get?key=..&query=..
pub async fn get_handler(
    State(state): State<AppState>,
    Path(db): Path<String>,
    Query(params): Query<GetParams>,
) -> Result<Response> {
    let key = params
        .key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| CacheError::InvalidArgument("Key is required".to_string()))?;

    let outcome = state.cache.get(&db, &key, params.query.as_deref());
    Ok(outcome_response(key, outcome))
}

/// Renders a lookup outcome. Only a live value is a 200.
fn outcome_response(key: String, outcome: GetOutcome) -> Response {
    let (status, message, tag) = match outcome {
        GetOutcome::Value(payload) => {
            return Json(GetResponse::new(key, payload.into_json())).into_response()
        }
        GetOutcome::NotFound => (StatusCode::NOT_FOUND, "Key not found", "not_found"),
        GetOutcome::Expired => (StatusCode::NOT_FOUND, "Key has expired", "expired"),
        GetOutcome::QueryMiss => (
            StatusCode::NOT_FOUND,
            "Query did not match the stored value",
            "query_miss",
        ),
        GetOutcome::QueryNotApplicable => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Stored value is not structured data",
            "query_not_applicable",
        ),
    };

    (status, Json(LookupMissResponse::new(message, tag))).into_response()
}

/// Handler for DELETE /{db}/del?key=..
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(db): Path<String>,
    Query(params): Query<KeyParams>,
) -> Result<Json<DeleteResponse>> {
    let key = params
        .key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| CacheError::InvalidArgument("Key is required".to_string()))?;

    let deleted = state.cache.delete(&db, &key).await?;
    Ok(Json(DeleteResponse::new(key, deleted)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
