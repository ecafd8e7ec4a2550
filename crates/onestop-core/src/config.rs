use crate::error::{OnestopError, Result};
use crate::models::CachePolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable holding the registry root
pub const ENV_REGISTRY_PATH: &str = "TRANSITLAND_FEED_REGISTRY_PATH";
/// Environment variable holding the datastore endpoint
pub const ENV_DATASTORE_URL: &str = "TRANSITLAND_DATASTORE_URL";
/// Environment variable holding the datastore API token
pub const ENV_AUTH_TOKEN: &str = "TRANSITLAND_DATASTORE_AUTH_TOKEN";
pub const ENV_STOP_BIN_PREFIX: &str = "ONESTOP_STOP_BIN_PREFIX";
pub const ENV_CACHE_POLICY: &str = "ONESTOP_CACHE";

pub const DEFAULT_DATASTORE_URL: &str = "http://localhost:3000";
pub const DEFAULT_STOP_BIN_PREFIX: usize = 5;

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Layered configuration for the registry tools
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub registry_path: ConfigValue<PathBuf>,
    pub datastore_url: ConfigValue<String>,
    pub auth_token: ConfigValue<Option<String>>,
    pub stop_bin_prefix_length: ConfigValue<usize>,
    pub cache_policy: ConfigValue<CachePolicy>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            registry_path: ConfigValue::new(PathBuf::from("."), ConfigSource::Default),
            datastore_url: ConfigValue::new(
                DEFAULT_DATASTORE_URL.to_string(),
                ConfigSource::Default,
            ),
            auth_token: ConfigValue::new(None, ConfigSource::Default),
            stop_bin_prefix_length: ConfigValue::new(
                DEFAULT_STOP_BIN_PREFIX,
                ConfigSource::Default,
            ),
            cache_policy: ConfigValue::new(CachePolicy::Cache, ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| OnestopError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| OnestopError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(registry_path) = file_config.registry_path {
            self.registry_path.update(registry_path, ConfigSource::File);
        }

        if let Some(datastore_url) = file_config.datastore_url {
            self.datastore_url.update(datastore_url, ConfigSource::File);
        }

        if let Some(token) = file_config.auth_token {
            self.auth_token.update(Some(token), ConfigSource::File);
        }

        if let Some(length) = file_config.stop_bin_prefix_length {
            let length = parse_prefix_length(&length.to_string())?;
            self.stop_bin_prefix_length.update(length, ConfigSource::File);
        }

        if let Some(policy) = file_config.cache_policy {
            self.cache_policy.update(parse_cache_policy(&policy)?, ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        if let Ok(path) = env::var(ENV_REGISTRY_PATH) {
            if !path.is_empty() {
                self.registry_path.update(PathBuf::from(path), ConfigSource::Environment);
            }
        }

        if let Ok(url) = env::var(ENV_DATASTORE_URL) {
            if !url.is_empty() {
                self.datastore_url.update(url, ConfigSource::Environment);
            }
        }

        if let Ok(token) = env::var(ENV_AUTH_TOKEN) {
            if !token.is_empty() {
                self.auth_token.update(Some(token), ConfigSource::Environment);
            }
        }

        if let Ok(length_str) = env::var(ENV_STOP_BIN_PREFIX) {
            match parse_prefix_length(&length_str) {
                Ok(length) => {
                    self.stop_bin_prefix_length.update(length, ConfigSource::Environment)
                }
                Err(_) => tracing::warn!(
                    "Invalid {} value '{}': expected an integer between 1 and 10",
                    ENV_STOP_BIN_PREFIX,
                    length_str
                ),
            }
        }

        if let Ok(policy_str) = env::var(ENV_CACHE_POLICY) {
            match parse_cache_policy(&policy_str) {
                Ok(policy) => self.cache_policy.update(policy, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid {} value '{}': expected cache, reuse, or refresh",
                    ENV_CACHE_POLICY,
                    policy_str
                ),
            }
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(registry_path) = overrides.registry_path {
            self.registry_path.update(registry_path, ConfigSource::Cli);
        }

        if let Some(datastore_url) = overrides.datastore_url {
            self.datastore_url.update(datastore_url, ConfigSource::Cli);
        }

        if let Some(length) = overrides.stop_bin_prefix_length {
            self.stop_bin_prefix_length.update(length, ConfigSource::Cli);
        }

        if let Some(policy) = overrides.cache_policy {
            self.cache_policy.update(policy, ConfigSource::Cli);
        }
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "registry_path".to_string(),
            (self.registry_path.value.display().to_string(), self.registry_path.source),
        );

        map.insert(
            "datastore_url".to_string(),
            (self.datastore_url.value.clone(), self.datastore_url.source),
        );

        // Never echo the token itself
        let token = if self.auth_token.value.is_some() { "(set)" } else { "(unset)" };
        map.insert("auth_token".to_string(), (token.to_string(), self.auth_token.source));

        map.insert(
            "stop_bin_prefix_length".to_string(),
            (self.stop_bin_prefix_length.value.to_string(), self.stop_bin_prefix_length.source),
        );

        map.insert(
            "cache_policy".to_string(),
            (self.cache_policy.value.to_string(), self.cache_policy.source),
        );

        map
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    registry_path: Option<PathBuf>,
    datastore_url: Option<String>,
    auth_token: Option<String>,
    stop_bin_prefix_length: Option<i64>,
    cache_policy: Option<String>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub registry_path: Option<PathBuf>,
    pub datastore_url: Option<String>,
    pub stop_bin_prefix_length: Option<usize>,
    pub cache_policy: Option<CachePolicy>,
}

/// Parse a download cache policy from string
pub fn parse_cache_policy(s: &str) -> Result<CachePolicy> {
    match s.trim().to_lowercase().as_str() {
        "cache" => Ok(CachePolicy::Cache),
        "reuse" => Ok(CachePolicy::Reuse),
        "refresh" => Ok(CachePolicy::Refresh),
        _ => Err(OnestopError::ConfigInvalid {
            key: "cache_policy".to_string(),
            reason: format!("Invalid cache policy: {}. Use cache, reuse, or refresh", s),
        }),
    }
}

/// Parse a stop bin prefix length; geohash prefixes of identifiers hold 10 characters
pub fn parse_prefix_length(s: &str) -> Result<usize> {
    match s.trim().parse::<usize>() {
        Ok(length) if (1..=10).contains(&length) => Ok(length),
        _ => Err(OnestopError::ConfigInvalid {
            key: "stop_bin_prefix_length".to_string(),
            reason: format!("Invalid prefix length: {}. Use an integer between 1 and 10", s),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = LayeredConfig::with_defaults();
        assert_eq!(config.registry_path.value, PathBuf::from("."));
        assert_eq!(config.registry_path.source, ConfigSource::Default);
        assert_eq!(config.datastore_url.value, "http://localhost:3000");
        assert_eq!(config.auth_token.value, None);
        assert_eq!(config.stop_bin_prefix_length.value, 5);
        assert_eq!(config.cache_policy.value, CachePolicy::Cache);
    }

    #[test]
    fn test_config_precedence() {
        let mut value = ConfigValue::new(100, ConfigSource::Default);

        value.update(200, ConfigSource::File);
        assert_eq!(value.value, 200);
        assert_eq!(value.source, ConfigSource::File);

        value.update(300, ConfigSource::Environment);
        assert_eq!(value.value, 300);
        assert_eq!(value.source, ConfigSource::Environment);

        value.update(400, ConfigSource::Cli);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);

        // Lower precedence should not override
        value.update(500, ConfigSource::File);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
registry_path = "/srv/transitland"
datastore_url = "https://transit.land"
auth_token = "secret"
stop_bin_prefix_length = 4
cache_policy = "refresh"
"#
        )
        .unwrap();

        let config = LayeredConfig::with_defaults().load_from_file(file.path()).unwrap();

        assert_eq!(config.registry_path.value, PathBuf::from("/srv/transitland"));
        assert_eq!(config.registry_path.source, ConfigSource::File);
        assert_eq!(config.datastore_url.value, "https://transit.land");
        assert_eq!(config.auth_token.value.as_deref(), Some("secret"));
        assert_eq!(config.stop_bin_prefix_length.value, 4);
        assert_eq!(config.cache_policy.value, CachePolicy::Refresh);
    }

    #[test]
    fn test_load_from_file_rejects_bad_prefix_length() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "stop_bin_prefix_length = 0").unwrap();

        let result = LayeredConfig::with_defaults().load_from_file(file.path());
        assert!(matches!(result, Err(OnestopError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = LayeredConfig::with_defaults();

        let overrides = CliConfigOverrides {
            registry_path: Some(PathBuf::from("/tmp/registry")),
            cache_policy: Some(CachePolicy::Reuse),
            ..Default::default()
        };

        config.update_from_cli(overrides);

        assert_eq!(config.registry_path.value, PathBuf::from("/tmp/registry"));
        assert_eq!(config.registry_path.source, ConfigSource::Cli);
        assert_eq!(config.cache_policy.value, CachePolicy::Reuse);
        assert_eq!(config.datastore_url.source, ConfigSource::Default);
        assert_eq!(config.auth_token.source, ConfigSource::Default);
    }

    #[test]
    fn test_parse_cache_policy() {
        assert_eq!(parse_cache_policy("cache").unwrap(), CachePolicy::Cache);
        assert_eq!(parse_cache_policy("REUSE").unwrap(), CachePolicy::Reuse);
        assert_eq!(parse_cache_policy(" refresh ").unwrap(), CachePolicy::Refresh);
        assert!(parse_cache_policy("ignore").is_err());
    }

    #[test]
    fn test_parse_prefix_length() {
        assert_eq!(parse_prefix_length("5").unwrap(), 5);
        assert_eq!(parse_prefix_length("10").unwrap(), 10);
        assert!(parse_prefix_length("11").is_err());
        assert!(parse_prefix_length("five").is_err());
    }

    #[test]
    fn test_inspection_map_hides_token() {
        let mut config = LayeredConfig::with_defaults();
        config.auth_token.update(Some("secret".to_string()), ConfigSource::File);
        let map = config.to_inspection_map();

        let (token, source) = &map["auth_token"];
        assert_eq!(token, "(set)");
        assert_eq!(*source, ConfigSource::File);

        let (prefix, _) = &map["stop_bin_prefix_length"];
        assert_eq!(prefix, "5");
    }
}
