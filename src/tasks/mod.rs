//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiration sweep: evicts expired entries at the configured interval

mod sweep;

pub use sweep::spawn_sweep_task;
