//! Node selection strategies

mod counter;
mod round_robin;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::registry::{Node, ServiceInstance};
use crate::selector::SelectorError;

pub use counter::RotationCounter;
pub use round_robin::RoundRobin;

/// Picks one node per invocation from the pool captured when it was built
pub type Next = Box<dyn Fn() -> Result<Node, SelectorError> + Send + Sync>;

/// Trait for node selection strategies
pub trait Strategy: Send + Sync {
    /// Build a picker over the nodes of `instances`
    fn next(&self, service: &str, instances: Vec<ServiceInstance>) -> Next;

    /// Drop any per-service state kept for `service`
    ///
    /// Called when the registry reports the service gone.
    fn forget(&self, _service: &str) {}

    /// Return the strategy name (for logging)
    fn strategy_name(&self) -> &'static str;
}

/// Which callers share a rotation counter
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RotationScope {
    /// One counter per service name
    #[default]
    PerService,
    /// One counter for every service selected through the same strategy.
    /// Selections for one service shift the rotation of all others.
    Shared,
}

/// Build a strategy from its configured name
pub fn build_strategy(
    name: &str,
    scope: RotationScope,
) -> Result<Arc<dyn Strategy>, Box<dyn std::error::Error + Send + Sync>> {
    match name {
        "round_robin" => Ok(Arc::new(RoundRobin::new(scope))),
        other => Err(format!("Unknown selection strategy: '{}'. Supported: round_robin", other).into()),
    }
}
