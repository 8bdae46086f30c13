//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::storage::StoreConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Result store configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_root")]
    pub root: String,

    #[serde(default = "default_compress")]
    pub compress: bool,
}

fn default_root() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("qrstore").to_string_lossy().to_string())
        .unwrap_or_else(|| "./qrstore_data".to_string())
}

fn default_compress() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            compress: default_compress(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    ///
    /// Files that fail to load are logged and skipped.
    pub fn load_default() -> Self {
        let search = Self::search_default();
        search.log();
        search.config
    }

    /// Search the default locations without logging
    ///
    /// For callers that install a subscriber only after the config is known;
    /// they can report the outcome later with [`ConfigSearch::log`].
    pub fn search_default() -> ConfigSearch {
        let config_paths: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("qrstore").join("config.toml")),
            Some(PathBuf::from("./qrstore.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::search(&config_paths)
    }

    /// Load the first of `paths` that exists and parses; fall back to environment
    pub fn search(paths: &[PathBuf]) -> ConfigSearch {
        let mut errors = Vec::new();

        for path in paths {
            if !path.exists() {
                continue;
            }
            match Self::load_with_env(path) {
                Ok(config) => {
                    return ConfigSearch {
                        config,
                        source: Some(path.clone()),
                        errors,
                    };
                }
                Err(e) => errors.push(e),
            }
        }

        ConfigSearch {
            config: Self::from_env(),
            source: None,
            errors,
        }
    }

    /// Settings for opening a [`crate::storage::ResultStore`]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(expand_home(&self.storage.root)).compress(self.storage.compress)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `QRSTORE_*` overrides read through `lookup`
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Storage overrides
        if let Some(root) = lookup("QRSTORE_ROOT") {
            self.storage.root = root;
        }
        if let Some(compress) = lookup("QRSTORE_COMPRESS") {
            match parse_bool(&compress) {
                Some(value) => self.storage.compress = value,
                None => tracing::warn!("Ignoring QRSTORE_COMPRESS={:?}", compress),
            }
        }

        // Logging overrides
        if let Some(level) = lookup("QRSTORE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("QRSTORE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Outcome of searching the default config locations
#[derive(Debug)]
pub struct ConfigSearch {
    pub config: Config,
    /// File the config was read from; `None` when only the environment applied
    pub source: Option<PathBuf>,
    /// Files that exist but could not be loaded
    pub errors: Vec<ConfigError>,
}

impl ConfigSearch {
    /// Report skipped files and where the config came from
    pub fn log(&self) {
        for error in &self.errors {
            tracing::warn!("Skipping config: {}", error);
        }
        match &self.source {
            Some(path) => tracing::info!("Loaded config from {:?}", path),
            None => tracing::debug!("Using default config with environment overrides"),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# qrstore Configuration
#
# Environment variables override these settings:
# - QRSTORE_ROOT
# - QRSTORE_COMPRESS
# - QRSTORE_LOG_LEVEL
# - QRSTORE_LOG_FORMAT

[storage]
# Directory holding the queries/ and results/ folders
root = "~/.local/share/qrstore"

# Gzip stored files (.json.gz); set to false for plain .json
compress = true

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
