//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_handler, get_handler, health_handler, initialize_handler, set_handler,
    stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /initialize` - Register a namespace and get its address
/// - `POST /:db/set` - Store a value under a key in namespace `db`
/// - `GET /:db/get?key=..&query=..` - Retrieve (and optionally project) a value
/// - `DELETE /:db/del?key=..` - Delete a key
/// - `GET /stats` - Get cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/initialize", post(initialize_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .route("/:db/set", post(set_handler))
        .route("/:db/get", get(get_handler))
        .route("/:db/del", delete(delete_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
