//! Configuration structures for the storage subsystem

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default minimum free space: 10 MiB
pub const DEFAULT_MIN_FREE_SPACE_BYTES: u64 = 10 * 1024 * 1024;

/// Default used-percentage above which a warning is raised
pub const DEFAULT_WARNING_THRESHOLD_PERCENT: f64 = 90.0;

/// Storage subsystem configuration
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding both stores
    pub data_dir: PathBuf,
    /// Key-value document inside `data_dir`
    pub kv_file_name: String,
    /// SQLite database inside `data_dir`
    pub db_file_name: String,
    /// Fail capacity validation below this
    pub min_free_space_bytes: u64,
    /// Warn (never fail) above this usage
    pub warning_threshold_percent: f64,
    /// Backup retention
    pub retention: RetentionPolicy,
    /// Written when no language is stored
    pub default_language: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            kv_file_name: "kv_store.json".to_string(),
            db_file_name: "app.db".to_string(),
            min_free_space_bytes: DEFAULT_MIN_FREE_SPACE_BYTES,
            warning_threshold_percent: DEFAULT_WARNING_THRESHOLD_PERCENT,
            retention: RetentionPolicy::default(),
            default_language: "en".to_string(),
        }
    }
}

impl StorageConfig {
    /// Defaults rooted at `data_dir`
    pub fn with_data_dir<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Path of the key-value document
    pub fn kv_path(&self) -> PathBuf {
        self.data_dir.join(&self.kv_file_name)
    }

    /// Path of the relational database
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file_name)
    }

    /// Directory holding both stores
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Check the configuration, returning every problem found
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.kv_file_name.trim().is_empty() {
            errors.push("Key-value file name cannot be empty".to_string());
        }

        if self.db_file_name.trim().is_empty() {
            errors.push("Database file name cannot be empty".to_string());
        }

        if self.min_free_space_bytes == 0 {
            errors.push("Minimum free space cannot be zero".to_string());
        }

        if !(self.warning_threshold_percent > 0.0 && self.warning_threshold_percent <= 100.0) {
            errors.push(format!(
                "Warning threshold must be within (0, 100], got {}",
                self.warning_threshold_percent
            ));
        }

        if self.retention.max_backups_to_keep == 0 {
            errors.push("Max backups to keep cannot be zero".to_string());
        }

        if !is_language_code(&self.default_language) {
            errors.push(format!(
                "Default language must be a two-letter lowercase code, got '{}'",
                self.default_language
            ));
        }

        errors
    }
}

/// Whether `code` is a two-letter lowercase language code
pub fn is_language_code(code: &str) -> bool {
    code.len() == 2 && code.chars().all(|c| c.is_ascii_lowercase())
}

/// Backup retention policy
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Number of newest backups kept
    /// Keep only N newest backups
    pub max_backups_to_keep: usize,
    /// Retire backups beyond the limit
    /// Retire backups beyond the limit
    pub remove_old_backups: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_backups_to_keep: 3,
            remove_old_backups: true,
        }
    }
}

/// Per-call cleanup options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupOptions {
    /// Retire backups beyond the limit
    pub remove_old_backups: bool,
    /// Number of newest backups kept
    pub max_backups_to_keep: usize,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        RetentionPolicy::default().into()
    }
}

impl From<RetentionPolicy> for CleanupOptions {
    fn from(policy: RetentionPolicy) -> Self {
        Self {
            remove_old_backups: policy.remove_old_backups,
            max_backups_to_keep: policy.max_backups_to_keep,
        }
    }
}
