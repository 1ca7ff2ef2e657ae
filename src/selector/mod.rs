//! Service selector: registry lookup, filtering and node selection

mod filter;
mod options;
mod registry_selector;

use async_trait::async_trait;

use crate::registry::{Node, RegistryError};
use crate::strategy::Next;

pub use filter::{filter_metadata, filter_node_metadata, filter_version, Filter};
pub use options::{
    options_from_config, select_filter, select_strategy, with_filter, with_registry, with_strategy,
    with_max_stale, with_sweep_interval, with_ttl, SelectOption, SelectOptions, SelectorOption, SelectorOptions,
};
pub use registry_selector::RegistrySelector;

/// Outcome reporting for selected nodes
///
/// Lets a health-aware selector penalize failing nodes. The registry selector
/// accepts and discards every report.
pub trait SelectionFeedback {
    /// Report the outcome of a call made to `node`
    fn mark(&self, service: &str, node: &Node, err: Option<&(dyn std::error::Error + 'static)>);

    /// Forget everything recorded for `service`
    fn reset(&self, service: &str);
}

/// Chooses one node per outbound call
#[async_trait]
pub trait Selector: SelectionFeedback + Send + Sync {
    /// Apply option mutators and rebuild the registry cache
    async fn init(&self, options: Vec<SelectorOption>) -> Result<(), SelectorError>;

    /// Snapshot of the current options
    async fn options(&self) -> SelectorOptions;

    /// Resolve `service` and return a picker over its eligible nodes
    async fn select(&self, service: &str, options: Vec<SelectOption>) -> Result<Next, SelectorError>;

    /// Stop the registry cache and release its resources
    async fn close(&self) -> Result<(), SelectorError>;

    /// Selector kind (for logging and registration)
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("service not found: {0}")]
    NotFound(String),

    #[error("no nodes available for service: {0}")]
    NoneAvailable(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl SelectorError {
    /// Whether retrying after a backoff may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            SelectorError::NotFound(_) => false,
            SelectorError::NoneAvailable(_) => true,
            SelectorError::Registry(err) => !err.is_not_found(),
        }
    }
}
