//! Cache DB - A namespaced networked cache
//!
//! Stores values per namespace with a TTL and a durability mode, and can
//! project sub-values out of structured payloads with a path query.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod namespace;
pub mod persistence;
pub mod query;
pub mod service;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use service::{CacheService, GetOutcome};
pub use tasks::spawn_sweep_task;
