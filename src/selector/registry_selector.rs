//! Selector backed by a cached registry and a pluggable strategy

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::options::{SelectOption, SelectOptions, SelectorOption, SelectorOptions};
use super::{SelectionFeedback, Selector, SelectorError};
use crate::registry::{CacheSnapshot, Node, RegistryCache, DEFAULT_MAX_STALE};
use crate::strategy::Next;

struct SelectorState {
    options: SelectorOptions,
    cache: RegistryCache,
}

/// Registry-backed selector, round-robin by default
///
/// `select` runs under a shared lock and `init` under an exclusive one, so an
/// `init` waits for in-flight selections and blocks new ones until the
/// replacement cache is in place.
pub struct RegistrySelector {
    state: RwLock<SelectorState>,
}

fn build_cache(options: &SelectorOptions) -> RegistryCache {
    let cache = RegistryCache::new(options.registry.clone(), options.ttl);
    match options.sweep_interval {
        Some(interval) => cache.with_sweeper(interval, options.max_stale.unwrap_or(DEFAULT_MAX_STALE)),
        None => cache,
    }
}

impl RegistrySelector {
    pub fn new(options: impl IntoIterator<Item = SelectorOption>) -> Self {
        let mut opts = SelectorOptions::default();
        for option in options {
            option(&mut opts);
        }

        tracing::info!(
            registry = opts.registry.name(),
            strategy = opts.strategy.strategy_name(),
            ttl = ?opts.ttl,
            filters = opts.filters.len(),
            "Registering service selector"
        );

        let cache = build_cache(&opts);
        Self {
            state: RwLock::new(SelectorState { options: opts, cache }),
        }
    }

    /// Diagnostic view of the registry cache
    pub async fn cache_entries(&self) -> Vec<CacheSnapshot> {
        self.state.read().await.cache.entries()
    }
}

impl Default for RegistrySelector {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl Selector for RegistrySelector {
    async fn init(&self, options: Vec<SelectorOption>) -> Result<(), SelectorError> {
        let mut state = self.state.write().await;
        for option in options {
            option(&mut state.options);
        }

        state.cache.stop();
        let cache = build_cache(&state.options);
        state.cache = cache;

        tracing::info!(options = ?state.options, "Selector reinitialized");
        Ok(())
    }

    async fn options(&self) -> SelectorOptions {
        self.state.read().await.options.clone()
    }

    async fn select(&self, service: &str, options: Vec<SelectOption>) -> Result<Next, SelectorError> {
        let state = self.state.read().await;

        let mut sopts = SelectOptions {
            strategy: state.options.strategy.clone(),
            filters: state.options.filters.clone(),
        };
        for option in options {
            option(&mut sopts);
        }

        let mut instances = match state.cache.lookup(service).await {
            Ok(instances) => instances,
            Err(err) if err.is_not_found() => {
                state.options.strategy.forget(service);
                sopts.strategy.forget(service);
                return Err(SelectorError::NotFound(service.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        for filter in &sopts.filters {
            instances = filter(instances);
        }

        if instances.is_empty() {
            tracing::debug!(service = %service, "No instances left after filtering");
            return Err(SelectorError::NoneAvailable(service.to_string()));
        }

        Ok(sopts.strategy.next(service, instances))
    }

    async fn close(&self) -> Result<(), SelectorError> {
        self.state.read().await.cache.stop();
        tracing::info!("Selector closed");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "registry"
    }
}

impl SelectionFeedback for RegistrySelector {
    fn mark(&self, service: &str, node: &Node, err: Option<&(dyn std::error::Error + 'static)>) {
        tracing::trace!(
            service = %service,
            node = %node.id,
            failed = err.is_some(),
            "Ignoring selection feedback"
        );
    }

    fn reset(&self, service: &str) {
        tracing::trace!(service = %service, "Ignoring selection reset");
    }
}
