mod loader;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::registry::ServiceInstance;
use crate::strategy::{build_strategy, RotationScope};

pub use loader::load_config;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub selector: SelectorConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Selector configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SelectorConfig {
    /// Strategy name; only "round_robin" is supported
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Whether services share one rotation counter
    #[serde(default)]
    pub rotation: RotationScope,
    /// Cache TTL in seconds. Unset keeps lookups until invalidated.
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
    /// How often expired cache entries are swept. Requires `ttl_seconds`.
    #[serde(default)]
    pub sweep_interval_seconds: Option<u64>,
    /// How long past the TTL the sweeper keeps entries for stale fallback.
    /// Defaults to 300.
    #[serde(default)]
    pub max_stale_seconds: Option<u64>,
    #[serde(default)]
    pub filters: FilterConfig,
}

fn default_strategy() -> String {
    "round_robin".to_string()
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            rotation: RotationScope::default(),
            ttl_seconds: None,
            sweep_interval_seconds: None,
            max_stale_seconds: None,
            filters: FilterConfig::default(),
        }
    }
}

/// Filters applied to every selection
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FilterConfig {
    /// Keep only instances of this version
    #[serde(default)]
    pub version: Option<String>,
    /// Keep only instances carrying all of these metadata pairs
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Registry backend kind
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    #[default]
    Memory,
    Http,
}

/// Registry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub kind: RegistryKind,
    /// Base URL of an http registry (e.g., "http://localhost:8500")
    #[serde(default)]
    pub url: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Instances to seed a memory registry with
    #[serde(default)]
    pub services: Vec<ServiceInstance>,
}

fn default_timeout() -> u64 {
    5
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            kind: RegistryKind::default(),
            url: None,
            timeout_seconds: default_timeout(),
            services: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        load_config(path)
    }

    /// Load configuration with fallback to default path
    pub fn load_or_default(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) => Self::from_file(path),
            None => {
                let default_paths = ["selector.yaml", "selector.yml", "./config/selector.yaml"];
                for p in default_paths {
                    let path = Path::new(p);
                    if path.exists() {
                        return Self::from_file(path);
                    }
                }
                Err(ConfigError::NotFound(
                    "No config file found. Tried: selector.yaml, selector.yml, ./config/selector.yaml"
                        .to_string(),
                ))
            }
        }
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        build_strategy(&self.selector.strategy, self.selector.rotation)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        if self.selector.ttl_seconds == Some(0) {
            return Err(ConfigError::Validation("ttl_seconds must be greater than 0".to_string()));
        }

        match self.selector.sweep_interval_seconds {
            Some(0) => {
                return Err(ConfigError::Validation(
                    "sweep_interval_seconds must be greater than 0".to_string(),
                ));
            }
            Some(_) if self.selector.ttl_seconds.is_none() => {
                return Err(ConfigError::Validation(
                    "sweep_interval_seconds requires ttl_seconds".to_string(),
                ));
            }
            _ => {}
        }

        if self.selector.max_stale_seconds.is_some() && self.selector.sweep_interval_seconds.is_none() {
            return Err(ConfigError::Validation(
                "max_stale_seconds requires sweep_interval_seconds".to_string(),
            ));
        }

        if self.registry.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "registry timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.registry.kind == RegistryKind::Http {
            let raw = self
                .registry
                .url
                .as_deref()
                .ok_or_else(|| ConfigError::Validation("http registry requires a url".to_string()))?;
            let parsed = url::Url::parse(raw)
                .map_err(|e| ConfigError::Validation(format!("invalid registry url '{}': {}", raw, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::Validation(format!(
                    "registry url must be http or https, got '{}'",
                    parsed.scheme()
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
