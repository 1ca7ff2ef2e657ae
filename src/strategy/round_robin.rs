//! Round-robin selection strategy

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::counter::RotationCounter;
use super::{Next, RotationScope, Strategy};
use crate::registry::{Node, ServiceInstance};
use crate::selector::SelectorError;

/// Round-robin strategy: cycles through the flattened node pool in order
///
/// Nodes are taken in instance order, then node order within each instance.
/// The counter outlives each pool, so rotation continues across `select` calls.
pub struct RoundRobin {
    scope: RotationScope,
    shared: Arc<RotationCounter>,
    per_service: Mutex<HashMap<String, Arc<RotationCounter>>>,
}

impl RoundRobin {
    pub fn new(scope: RotationScope) -> Self {
        Self {
            scope,
            shared: Arc::new(RotationCounter::default()),
            per_service: Mutex::new(HashMap::new()),
        }
    }

    pub fn scope(&self) -> RotationScope {
        self.scope
    }

    /// Counter driving the rotation for `service`
    pub fn counter(&self, service: &str) -> Arc<RotationCounter> {
        match self.scope {
            RotationScope::Shared => Arc::clone(&self.shared),
            RotationScope::PerService => {
                let mut counters = self.per_service.lock().unwrap_or_else(|e| e.into_inner());
                Arc::clone(counters.entry(service.to_string()).or_default())
            }
        }
    }

    /// Set where the rotation for `service` starts
    pub fn seed(&self, service: &str, value: u64) {
        self.counter(service).set(value);
    }

    /// Number of services holding their own counter
    pub fn tracked_services(&self) -> usize {
        self.per_service.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new(RotationScope::default())
    }
}

impl Strategy for RoundRobin {
    fn next(&self, service: &str, instances: Vec<ServiceInstance>) -> Next {
        let instance_count = instances.len();
        let pool: Vec<Node> = instances.into_iter().flat_map(|i| i.nodes).collect();

        tracing::debug!(
            service = %service,
            instances = instance_count,
            nodes = pool.len(),
            "Built round-robin node pool"
        );

        let counter = self.counter(service);
        let service = service.to_string();

        Box::new(move || match counter.next_index(pool.len()) {
            Some(index) => Ok(pool[index].clone()),
            None => Err(SelectorError::NoneAvailable(service.clone())),
        })
    }

    fn forget(&self, service: &str) {
        let mut counters = self.per_service.lock().unwrap_or_else(|e| e.into_inner());
        if counters.remove(service).is_some() {
            tracing::debug!(service = %service, "Dropped round-robin counter");
        }
    }

    fn strategy_name(&self) -> &'static str {
        "round_robin"
    }
}
