//! TOML configuration parsing and management.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    /// Application identity
    pub app: AppConfig,
    /// Lifecycle journal settings
    pub logging: LoggingConfig,
    #[cfg(feature = "storage")]
    /// Storage settings, defaults when absent
    pub storage: Option<crate::storage::StorageConfig>,
}

/// Application identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name
    pub name: String,
    /// Application version
    pub version: String,
}

/// Lifecycle journal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Journal file path
    pub log_file: String,
    /// Minimum journal level
    pub log_level: String,
}

/// Loads and manages TOML configuration.
#[derive(Debug)]
pub struct ConfigurationLoader {
    /// Path the configuration was loaded from
    pub config_path: PathBuf,
    /// Parsed configuration
    pub config: Configuration,
}

impl ConfigurationLoader {
    /// Initialize configuration loader.
    ///
    /// # Arguments
    /// * `config_path` - Path to TOML config file. If None or missing, uses default config.
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config_path = config_path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("config/app.toml"));

        let config = if config_path.exists() {
            Self::load_config(&config_path)?
        } else {
            Self::get_default_config()
        };

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Create a configuration loader from a pre-parsed Configuration.
    pub fn from_config(config: Configuration) -> Self {
        Self {
            config_path: PathBuf::from("config/app.toml"),
            config,
        }
    }

    /// Load configuration from TOML file.
    fn load_config(path: &Path) -> Result<Configuration> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }

    /// Get default configuration.
    fn get_default_config() -> Configuration {
        Configuration {
            app: AppConfig {
                name: "adl".to_string(),
                version: "0.1.0".to_string(),
            },
            logging: LoggingConfig {
                log_file: std::env::temp_dir()
                    .join("adl")
                    .join(format!(
                        "lifecycle_{}_{}.md",
                        Utc::now().timestamp_millis(),
                        std::process::id()
                    ))
                    .to_string_lossy()
                    .to_string(),
                log_level: "INFO".to_string(),
            },
            #[cfg(feature = "storage")]
            storage: None,
        }
    }

    /// Default data directory: the platform data dir joined with the app name
    pub fn default_data_dir(&self) -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(&self.config.app.name)
    }

    /// Storage configuration with `~` expanded in `data_dir`.
    ///
    /// A missing `[storage]` section yields defaults rooted at
    /// [`default_data_dir`](Self::default_data_dir).
    #[cfg(feature = "storage")]
    pub fn storage_config(&self) -> crate::storage::StorageConfig {
        match &self.config.storage {
            Some(storage) => {
                let raw = storage.data_dir.to_string_lossy();
                let expanded = shellexpand::tilde(raw.as_ref()).into_owned();
                crate::storage::StorageConfig {
                    data_dir: PathBuf::from(expanded),
                    ..storage.clone()
                }
            }
            None => crate::storage::StorageConfig::with_data_dir(self.default_data_dir()),
        }
    }

    /// Check the loaded configuration, returning every problem found
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.config.app.name.trim().is_empty() {
            errors.push("App name cannot be empty".to_string());
        }

        let level = self.config.logging.log_level.to_uppercase();
        if !["TRACE", "DEBUG", "INFO", "WARN", "WARNING", "ERROR"].contains(&level.as_str()) {
            errors.push(format!("Unknown log level: {}", self.config.logging.log_level));
        }

        #[cfg(feature = "storage")]
        for error in self.storage_config().validate() {
            errors.push(format!("storage: {}", error));
        }

        errors
    }

    /// Get configuration value by dot-notation key.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match key {
            "app.name" => Some(self.config.app.name.clone()),
            "app.version" => Some(self.config.app.version.clone()),
            "logging.log_file" => Some(self.config.logging.log_file.clone()),
            "logging.log_level" => Some(self.config.logging.log_level.clone()),
            #[cfg(feature = "storage")]
            "storage.data_dir" => Some(self.storage_config().data_dir.to_string_lossy().to_string()),
            #[cfg(feature = "storage")]
            "storage.default_language" => Some(self.storage_config().default_language),
            _ => None,
        }
    }

    /// Get numeric configuration value.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match key {
            #[cfg(feature = "storage")]
            "storage.min_free_space_bytes" => Some(self.storage_config().min_free_space_bytes),
            #[cfg(feature = "storage")]
            "storage.retention.max_backups_to_keep" => {
                Some(self.storage_config().retention.max_backups_to_keep as u64)
            }
            _ => None,
        }
    }

    /// Get boolean configuration value.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match key {
            #[cfg(feature = "storage")]
            "storage.retention.remove_old_backups" => {
                Some(self.storage_config().retention.remove_old_backups)
            }
            _ => None,
        }
    }
}
