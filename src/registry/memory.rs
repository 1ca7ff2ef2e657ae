//! In-process registry

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{Registry, RegistryError, ServiceInstance};

/// Registry backed by an in-memory map, seeded from config or registered at runtime
pub struct MemoryRegistry {
    services: RwLock<HashMap<String, Vec<ServiceInstance>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
        }
    }

    /// Build a registry from a flat instance list, grouping by instance name
    pub fn from_instances(instances: impl IntoIterator<Item = ServiceInstance>) -> Self {
        let registry = Self::new();
        for instance in instances {
            registry.register(instance);
        }
        registry
    }

    /// Register an instance, replacing any existing instance with the same name and version
    pub fn register(&self, instance: ServiceInstance) {
        let mut services = self.services.write().unwrap_or_else(|e| e.into_inner());
        let entry = services.entry(instance.name.clone()).or_default();
        entry.retain(|existing| existing.version != instance.version);
        tracing::debug!(
            service = %instance.name,
            version = %instance.version,
            nodes = instance.nodes.len(),
            "Registered service instance"
        );
        entry.push(instance);
    }

    /// Register a service name with no instances
    pub fn register_empty(&self, name: &str) {
        let mut services = self.services.write().unwrap_or_else(|e| e.into_inner());
        services.entry(name.to_string()).or_default();
    }

    /// Remove every instance of a service. Returns true if it was known.
    pub fn deregister(&self, name: &str) -> bool {
        let mut services = self.services.write().unwrap_or_else(|e| e.into_inner());
        services.remove(name).is_some()
    }

    /// Sorted list of known service names
    pub fn list_services(&self) -> Vec<String> {
        let services = self.services.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = services.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn get_service(&self, name: &str) -> Result<Vec<ServiceInstance>, RegistryError> {
        let services = self.services.read().unwrap_or_else(|e| e.into_inner());
        services
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Node;

    #[tokio::test]
    async fn test_get_unknown_service() {
        let registry = MemoryRegistry::new();
        let err = registry.get_service("orders").await.unwrap_err();
        assert_eq!(err, RegistryError::NotFound("orders".to_string()));
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let registry = MemoryRegistry::new();
        registry.register(ServiceInstance::new("orders", "v1", vec![Node::new("n1", "a:1")]));
        registry.register(ServiceInstance::new("orders", "v2", vec![Node::new("n2", "b:1")]));

        let instances = registry.get_service("orders").await.unwrap();
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].version, "v1");
        assert_eq!(instances[1].version, "v2");
    }

    #[tokio::test]
    async fn test_register_replaces_same_version() {
        let registry = MemoryRegistry::new();
        registry.register(ServiceInstance::new("orders", "v1", vec![Node::new("n1", "a:1")]));
        registry.register(ServiceInstance::new(
            "orders",
            "v1",
            vec![Node::new("n1", "a:1"), Node::new("n2", "a:2")],
        ));

        let instances = registry.get_service("orders").await.unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].nodes.len(), 2);
    }

    #[tokio::test]
    async fn test_register_empty_is_found() {
        let registry = MemoryRegistry::new();
        registry.register_empty("billing");
        let instances = registry.get_service("billing").await.unwrap();
        assert!(instances.is_empty());
    }

    #[tokio::test]
    async fn test_deregister() {
        let registry = MemoryRegistry::from_instances(vec![ServiceInstance::new("orders", "v1", vec![])]);
        assert!(registry.deregister("orders"));
        assert!(!registry.deregister("orders"));
        assert!(registry.get_service("orders").await.is_err());
    }

    #[test]
    fn test_list_services_sorted() {
        let registry = MemoryRegistry::from_instances(vec![
            ServiceInstance::new("users", "", vec![]),
            ServiceInstance::new("billing", "", vec![]),
            ServiceInstance::new("orders", "", vec![]),
        ]);
        assert_eq!(registry.list_services(), vec!["billing", "orders", "users"]);
    }
}
