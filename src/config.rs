//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Background sweep interval in seconds
    pub sweep_interval: u64,
    /// Keys evicted per sweep chunk before yielding
    pub sweep_batch_size: usize,
    /// Location of the durable log
    pub data_path: PathBuf,
    /// Base URL handed out by `initialize`
    pub public_url: Option<String>,
    /// Log records appended before the sweep task compacts the log
    pub compact_threshold: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Sweep frequency in seconds (default: 1)
    /// - `SWEEP_BATCH_SIZE` - Evictions per sweep chunk (default: 1024)
    /// - `DATA_PATH` - Durable log file (default: data/cache_db.log)
    /// - `PUBLIC_URL` - Base URL for namespace addresses (default: http://localhost:{port})
    /// - `COMPACT_THRESHOLD` - Appended log records that trigger compaction (default: 1024)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            sweep_interval: parse_var("SWEEP_INTERVAL")
                .unwrap_or(defaults.sweep_interval)
                .max(1),
            sweep_batch_size: parse_var("SWEEP_BATCH_SIZE")
                .unwrap_or(defaults.sweep_batch_size)
                .max(1),
            data_path: env::var("DATA_PATH")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_path),
            public_url: env::var("PUBLIC_URL").ok().filter(|v| !v.is_empty()),
            compact_threshold: parse_var("COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold)
                .max(1),
        }
    }

    /// Base URL that namespace addresses are built on, without a trailing slash.
    pub fn public_base_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.server_port),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            sweep_interval: 1,
            sweep_batch_size: 1024,
            data_path: PathBuf::from("data/cache_db.log"),
            public_url: None,
            compact_threshold: 1024,
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.sweep_interval, 1);
        assert_eq!(config.sweep_batch_size, 1024);
        assert_eq!(config.data_path, PathBuf::from("data/cache_db.log"));
        assert!(config.public_url.is_none());
        assert_eq!(config.compact_threshold, 1024);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("SERVER_PORT");
        env::remove_var("SWEEP_INTERVAL");
        env::remove_var("SWEEP_BATCH_SIZE");
        env::remove_var("DATA_PATH");
        env::remove_var("PUBLIC_URL");
        env::remove_var("COMPACT_THRESHOLD");

        let config = Config::from_env();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.sweep_interval, 1);
        assert_eq!(config.sweep_batch_size, 1024);
        assert_eq!(config.compact_threshold, 1024);
        assert_eq!(config.public_base_url(), "http://localhost:3000");
    }

    #[test]
    fn test_public_base_url_trims_slash() {
        let config = Config {
            public_url: Some("https://cache.example.com/".to_string()),
            ..Config::default()
        };
        assert_eq!(config.public_base_url(), "https://cache.example.com");
    }
}
