//! Selector and per-call option mutators

use std::sync::Arc;
use std::time::Duration;

use super::filter::{filter_metadata, filter_version, Filter};
use crate::config::{AppConfig, ConfigError, RegistryKind};
use crate::registry::{default_registry, HttpRegistry, MemoryRegistry, Registry};
use crate::strategy::{build_strategy, RoundRobin, Strategy};

/// Configuration of a selector
#[derive(Clone)]
pub struct SelectorOptions {
    pub registry: Arc<dyn Registry>,
    pub strategy: Arc<dyn Strategy>,
    /// Freshness bound on cached lookups; `None` keeps entries until invalidated
    pub ttl: Option<Duration>,
    pub sweep_interval: Option<Duration>,
    /// How long past the TTL the sweeper keeps entries for stale fallback
    pub max_stale: Option<Duration>,
    /// Applied to every selection, before any per-call filters
    pub filters: Vec<Filter>,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            registry: default_registry(),
            strategy: Arc::new(RoundRobin::default()),
            ttl: None,
            sweep_interval: None,
            max_stale: None,
            filters: Vec::new(),
        }
    }
}

impl std::fmt::Debug for SelectorOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectorOptions")
            .field("registry", &self.registry.name())
            .field("strategy", &self.strategy.strategy_name())
            .field("ttl", &self.ttl)
            .field("sweep_interval", &self.sweep_interval)
            .field("max_stale", &self.max_stale)
            .field("filters", &self.filters.len())
            .finish()
    }
}

/// Mutates [`SelectorOptions`]; applied in order, later options win
pub type SelectorOption = Box<dyn FnOnce(&mut SelectorOptions) + Send>;

pub fn with_registry(registry: Arc<dyn Registry>) -> SelectorOption {
    Box::new(move |o| o.registry = registry)
}

pub fn with_strategy(strategy: Arc<dyn Strategy>) -> SelectorOption {
    Box::new(move |o| o.strategy = strategy)
}

pub fn with_ttl(ttl: Duration) -> SelectorOption {
    Box::new(move |o| o.ttl = Some(ttl))
}

pub fn with_sweep_interval(interval: Duration) -> SelectorOption {
    Box::new(move |o| o.sweep_interval = Some(interval))
}

pub fn with_max_stale(max_stale: Duration) -> SelectorOption {
    Box::new(move |o| o.max_stale = Some(max_stale))
}

pub fn with_filter(filter: Filter) -> SelectorOption {
    Box::new(move |o| o.filters.push(filter))
}

/// Per-call selection settings, seeded from the selector's options
pub struct SelectOptions {
    pub strategy: Arc<dyn Strategy>,
    pub filters: Vec<Filter>,
}

pub type SelectOption = Box<dyn FnOnce(&mut SelectOptions) + Send>;

/// Use a different strategy for one call
pub fn select_strategy(strategy: Arc<dyn Strategy>) -> SelectOption {
    Box::new(move |o| o.strategy = strategy)
}

/// Add a filter for one call
pub fn select_filter(filter: Filter) -> SelectOption {
    Box::new(move |o| o.filters.push(filter))
}

/// Translate the application config into selector options
pub fn options_from_config(config: &AppConfig) -> Result<Vec<SelectorOption>, ConfigError> {
    let selector = &config.selector;
    let mut options = Vec::new();

    let registry: Arc<dyn Registry> = match config.registry.kind {
        RegistryKind::Memory if config.registry.services.is_empty() => default_registry(),
        RegistryKind::Memory => Arc::new(MemoryRegistry::from_instances(config.registry.services.clone())),
        RegistryKind::Http => {
            let url = config
                .registry
                .url
                .as_deref()
                .ok_or_else(|| ConfigError::Validation("http registry requires a url".to_string()))?;
            Arc::new(
                HttpRegistry::new(url, config.registry.timeout_seconds)
                    .map_err(|e| ConfigError::Validation(e.to_string()))?,
            )
        }
    };
    options.push(with_registry(registry));

    let strategy = build_strategy(&selector.strategy, selector.rotation)
        .map_err(|e| ConfigError::Validation(e.to_string()))?;
    options.push(with_strategy(strategy));

    if let Some(ttl) = selector.ttl_seconds {
        options.push(with_ttl(Duration::from_secs(ttl)));
    }
    if let Some(interval) = selector.sweep_interval_seconds {
        options.push(with_sweep_interval(Duration::from_secs(interval)));
    }
    if let Some(max_stale) = selector.max_stale_seconds {
        options.push(with_max_stale(Duration::from_secs(max_stale)));
    }
    if let Some(ref version) = selector.filters.version {
        options.push(with_filter(filter_version(version.clone())));
    }
    for (key, value) in &selector.filters.metadata {
        options.push(with_filter(filter_metadata(key.clone(), value.clone())));
    }

    Ok(options)
}
