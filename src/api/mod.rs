//! API Module
//!
//! Thin HTTP adapter over the cache service.
//!
//! # Endpoints
//! - `POST /initialize` - Register a namespace
//! - `POST /:db/set` - Store a value
//! - `GET /:db/get` - Retrieve a value, optionally projected by a query
//! - `DELETE /:db/del` - Delete a key
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
