//! Instance filters applied between registry lookup and strategy

use std::sync::Arc;

use crate::registry::ServiceInstance;

/// Narrows an instance list, e.g. by version or metadata
pub type Filter = Arc<dyn Fn(Vec<ServiceInstance>) -> Vec<ServiceInstance> + Send + Sync>;

/// Keep only instances of the given version
pub fn filter_version(version: impl Into<String>) -> Filter {
    let version = version.into();
    Arc::new(move |instances: Vec<ServiceInstance>| {
        instances.into_iter().filter(|i| i.version == version).collect()
    })
}

/// Keep only instances whose metadata has `key` set to `value`
pub fn filter_metadata(key: impl Into<String>, value: impl Into<String>) -> Filter {
    let key = key.into();
    let value = value.into();
    Arc::new(move |instances: Vec<ServiceInstance>| {
        instances
            .into_iter()
            .filter(|i| i.metadata.get(&key) == Some(&value))
            .collect()
    })
}

/// Keep only nodes whose metadata has `key` set to `value`.
/// Instances left without nodes are dropped.
pub fn filter_node_metadata(key: impl Into<String>, value: impl Into<String>) -> Filter {
    let key = key.into();
    let value = value.into();
    Arc::new(move |instances: Vec<ServiceInstance>| {
        instances
            .into_iter()
            .filter_map(|mut instance| {
                instance.nodes.retain(|n| n.metadata.get(&key) == Some(&value));
                (!instance.nodes.is_empty()).then_some(instance)
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Node;

    fn instances() -> Vec<ServiceInstance> {
        vec![
            ServiceInstance::new(
                "orders",
                "v1",
                vec![
                    Node::new("n1", "a:1").with_metadata("zone", "east"),
                    Node::new("n2", "a:2").with_metadata("zone", "west"),
                ],
            )
            .with_metadata("track", "stable"),
            ServiceInstance::new("orders", "v2", vec![Node::new("n3", "b:1").with_metadata("zone", "west")])
                .with_metadata("track", "canary"),
        ]
    }

    #[test]
    fn test_filter_version() {
        let result = filter_version("v2")(instances());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].nodes[0].id, "n3");
    }

    #[test]
    fn test_filter_version_no_match() {
        assert!(filter_version("v9")(instances()).is_empty());
    }

    #[test]
    fn test_filter_metadata() {
        let result = filter_metadata("track", "stable")(instances());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].version, "v1");
    }

    #[test]
    fn test_filter_node_metadata() {
        let result = filter_node_metadata("zone", "west")(instances());
        let ids: Vec<&str> = result.iter().flat_map(|i| i.nodes.iter()).map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n2", "n3"]);
    }

    #[test]
    fn test_filter_node_metadata_drops_empty_instances() {
        let result = filter_node_metadata("zone", "east")(instances());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].version, "v1");
    }
}
