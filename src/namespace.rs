//! Namespace registry
//!
//! Bookkeeping for `initialize`. Registering a namespace allocates nothing
//! and gates nothing: `set` and `get` work for any namespace string.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::info;

/// Who asked for a namespace, and when.
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceInfo {
    pub owner_name: String,
    pub owner_email: String,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NamespaceRegistry {
    base_url: String,
    namespaces: DashMap<String, NamespaceInfo>,
}

impl NamespaceRegistry {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            namespaces: DashMap::new(),
        }
    }

    /// Records the namespace (first registration wins) and returns the
    /// address its requests are routed to.
    pub fn register(&self, name: &str, email: &str, namespace: &str) -> String {
        self.namespaces
            .entry(namespace.to_string())
            .or_insert_with(|| {
                info!("Registered namespace {} for {} <{}>", namespace, name, email);
                NamespaceInfo {
                    owner_name: name.to_string(),
                    owner_email: email.to_string(),
                    registered_at: Utc::now(),
                }
            });
        self.address_of(namespace)
    }

    pub fn address_of(&self, namespace: &str) -> String {
        format!("{}/{}", self.base_url, namespace)
    }

    pub fn get(&self, namespace: &str) -> Option<NamespaceInfo> {
        self.namespaces.get(namespace).map(|info| info.value().clone())
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}
