//! Service registry abstraction and the TTL-bounded cache in front of it

mod cache;
mod http;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

pub use cache::{CacheSnapshot, RegistryCache, DEFAULT_MAX_STALE};
pub use http::HttpRegistry;
pub use memory::MemoryRegistry;

/// A single addressable endpoint belonging to an instance
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Node {
    #[serde(default = "generate_node_id")]
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn generate_node_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Node {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One registered deployment of a service and its running nodes
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServiceInstance {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub nodes: Vec<Node>,
}

impl ServiceInstance {
    pub fn new(name: impl Into<String>, version: impl Into<String>, nodes: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            metadata: HashMap::new(),
            nodes,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Discovery backend mapping service names to instances
#[async_trait]
pub trait Registry: Send + Sync {
    /// Fetch every instance registered under `name`
    ///
    /// Must return [`RegistryError::NotFound`] when the registry has no record of
    /// the service, so callers can tell it apart from transport failures.
    async fn get_service(&self, name: &str) -> Result<Vec<ServiceInstance>, RegistryError>;

    /// Registry kind (for logging)
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("service not found: {0}")]
    NotFound(String),

    #[error("registry transport error: {0}")]
    Transport(String),

    #[error("malformed registry response: {0}")]
    Malformed(String),

    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }
}

static DEFAULT_REGISTRY: OnceLock<Arc<MemoryRegistry>> = OnceLock::new();

/// Process-wide fallback registry used when no registry is configured
pub fn default_registry() -> Arc<MemoryRegistry> {
    DEFAULT_REGISTRY
        .get_or_init(|| Arc::new(MemoryRegistry::new()))
        .clone()
}
