//! Configuration loading utilities for CLI commands

use crate::cli::Cli;
use anyhow::{Context, Result};
use onestop_core::config::{
    parse_cache_policy, parse_prefix_length, CliConfigOverrides, LayeredConfig, ENV_REGISTRY_PATH,
};
use onestop_store::FeedRegistry;
use std::env;
use std::path::PathBuf;

pub const CONFIG_FILE: &str = "onestop.toml";

/// Registry root used to locate `onestop.toml`
fn registry_root(cli: &Cli) -> PathBuf {
    if let Some(path) = &cli.registry {
        return path.clone();
    }
    match env::var(ENV_REGISTRY_PATH) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from("."),
    }
}

/// Load layered configuration: defaults, file, environment, then flags
pub fn load_config(cli: &Cli) -> Result<LayeredConfig> {
    let mut config = LayeredConfig::with_defaults();

    let config_path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => Some(registry_root(cli).join(CONFIG_FILE)).filter(|path| path.is_file()),
    };
    if let Some(path) = config_path {
        tracing::debug!("Loading configuration from {}", path.display());
        config = config
            .load_from_file(&path)
            .with_context(|| format!("Failed to load configuration file {}", path.display()))?;
    }
    let mut config = config.load_from_env();

    let cache_policy = cli.cache.as_deref().map(parse_cache_policy).transpose()?;
    let stop_bin_prefix_length = cli.stopbin_prefix.as_deref().map(parse_prefix_length).transpose()?;
    config.update_from_cli(CliConfigOverrides {
        registry_path: cli.registry.clone(),
        datastore_url: cli.datastore.clone(),
        stop_bin_prefix_length,
        cache_policy,
        ..Default::default()
    });
    Ok(config)
}

/// Open the configured registry
pub fn open_registry(config: &LayeredConfig) -> Result<FeedRegistry> {
    let path = &config.registry_path.value;
    FeedRegistry::open(path).with_context(|| format!("Failed to open registry {}", path.display()))
}
