//! micro-selector: client-side service selection for RPC clients
//!
//! Features:
//! - Registry lookups served from a TTL-bounded cache
//! - Round-robin node rotation with per-service or shared counters
//! - Version and metadata filters applied before selection
//! - In-memory and HTTP registry backends

pub mod config;
pub mod registry;
pub mod selector;
pub mod strategy;

pub use config::AppConfig;
pub use registry::{default_registry, Node, Registry, RegistryCache, RegistryError, ServiceInstance};
pub use selector::{RegistrySelector, SelectionFeedback, Selector, SelectorError};
pub use strategy::{Next, RoundRobin, Strategy};
