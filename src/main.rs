//! micro-selector: resolve service nodes from a registry and rotate through them
//!
//! Command-line front end for the selector library:
//! - Pick nodes for a service using the configured strategy
//! - Inspect the services a config file seeds
//! - Validate configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

use micro_selector::{
    config::{AppConfig, RegistryKind},
    selector::{filter_version, options_from_config, select_filter},
    RegistrySelector, Selector,
};

#[derive(Parser)]
#[command(name = "micro-selector")]
#[command(version = "0.1.0")]
#[command(about = "Client-side service selector with round-robin rotation")]
#[command(long_about = "
micro-selector resolves the nodes registered for a service and hands back one
node per call, rotating round-robin and caching registry lookups.

Example usage:
  micro-selector select --service orders --count 5
  micro-selector list-services
  micro-selector check-config --config selector.yaml
")]
struct Cli {
    /// Path to config file (default: selector.yaml, selector.yml, ./config/selector.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select nodes for a service
    Select {
        /// Service name to resolve
        #[arg(short, long)]
        service: String,
        /// Number of selections to make
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
        /// Only consider instances of this version
        #[arg(long)]
        version: Option<String>,
    },

    /// List services seeded in a memory registry config
    ListServices,

    /// Validate configuration file
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level_filter = if let Some(level) = cli.log_level {
        level.to_string()
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
            .to_string()
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&level_filter))
        .init();

    match cli.command {
        Commands::Select {
            service,
            count,
            version,
        } => {
            select_nodes(cli.config.as_deref(), &service, count, version).await?;
        }
        Commands::ListServices => {
            list_services(cli.config.as_deref());
        }
        Commands::CheckConfig => {
            check_config(cli.config.as_deref());
        }
    }

    Ok(())
}

/// Resolve a service and print the selected nodes
async fn select_nodes(
    config_path: Option<&Path>,
    service: &str,
    count: usize,
    version: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_or_exit(config_path);
    tracing::info!(path = ?config_path, "Configuration loaded");

    let selector = RegistrySelector::new(options_from_config(&config)?);

    let mut select_options = Vec::new();
    if let Some(version) = version {
        select_options.push(select_filter(filter_version(version)));
    }

    let next = match selector.select(service, select_options).await {
        Ok(next) => next,
        Err(e) => {
            eprintln!("✗ {}", e);
            selector.close().await?;
            std::process::exit(1);
        }
    };

    for i in 0..count {
        match next() {
            Ok(node) => println!("{:>4}  {:<36} {}", i + 1, node.id, node.address),
            Err(e) => {
                eprintln!("✗ {}", e);
                break;
            }
        }
    }

    selector.close().await?;
    Ok(())
}

/// List services seeded in the config
fn list_services(config_path: Option<&Path>) {
    let config = load_config_or_exit(config_path);

    if config.registry.kind != RegistryKind::Memory {
        println!("Registry kind {:?} does not support listing services", config.registry.kind);
        return;
    }

    if config.registry.services.is_empty() {
        println!("No services configured");
        return;
    }

    println!("Configured services:\n");
    for instance in &config.registry.services {
        let version = if instance.version.is_empty() {
            "-"
        } else {
            instance.version.as_str()
        };
        println!("  {:24} {:10} {} node(s)", instance.name, version, instance.nodes.len());
        for node in &instance.nodes {
            println!("    - {} ({})", node.address, node.id);
        }
    }
}

/// Validate configuration file
fn check_config(config_path: Option<&Path>) {
    match AppConfig::load_or_default(config_path) {
        Ok(config) => {
            println!("✓ Configuration file is valid\n");
            println!("Selector:");
            println!("  Strategy: {}", config.selector.strategy);
            println!("  Rotation: {:?}", config.selector.rotation);
            match config.selector.ttl_seconds {
                Some(ttl) => println!("  Cache TTL: {}s", ttl),
                None => println!("  Cache TTL: none (entries kept until invalidated)"),
            }
            if let Some(interval) = config.selector.sweep_interval_seconds {
                println!("  Sweep interval: {}s", interval);
                println!(
                    "  Max stale: {}s",
                    config
                        .selector
                        .max_stale_seconds
                        .unwrap_or(micro_selector::registry::DEFAULT_MAX_STALE.as_secs())
                );
            }
            if let Some(ref version) = config.selector.filters.version {
                println!("  Version filter: {}", version);
            }
            for (key, value) in &config.selector.filters.metadata {
                println!("  Metadata filter: {}={}", key, value);
            }
            println!("\nRegistry:");
            println!("  Kind: {:?}", config.registry.kind);
            if let Some(ref url) = config.registry.url {
                println!("  URL: {}", url);
                println!("  Timeout: {}s", config.registry.timeout_seconds);
            }
            println!("  Seeded instances: {}", config.registry.services.len());
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Load configuration or exit with error
fn load_config_or_exit(config_path: Option<&Path>) -> AppConfig {
    match AppConfig::load_or_default(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            eprintln!("\nMake sure you have a selector.yaml file.");
            eprintln!("You can copy selector.yaml.default and modify it:");
            eprintln!("  cp selector.yaml.default selector.yaml");
            std::process::exit(1);
        }
    }
}
