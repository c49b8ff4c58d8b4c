//! Markdown journal of data lifecycle events.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Journal for initialization runs, backups, restores and cleanups.
///
/// Entries are appended to a markdown file. Entries below the configured
/// level are skipped; the level order is `DEBUG < INFO < WARN < ERROR`.
#[derive(Debug)]
pub struct Logger {
    log_file: PathBuf,
    log_level: String,
}

impl Logger {
    /// Initialize logger.
    ///
    /// # Arguments
    /// * `log_file` - Path to the journal. If None, creates a timestamped file in the temp directory.
    /// * `log_level` - Minimum level written (defaults to "INFO").
    pub fn new(log_file: Option<&Path>, log_level: Option<&str>) -> Result<Self> {
        let log_file = match log_file {
            Some(p) => p.to_path_buf(),
            None => {
                let mut dir = std::env::temp_dir();
                dir.push("adl-logs");
                std::fs::create_dir_all(&dir).with_context(|| {
                    format!("Failed to create log directory: {}", dir.display())
                })?;
                let filename = format!(
                    "lifecycle_{}_{}.md",
                    Utc::now().timestamp_millis(),
                    std::process::id()
                );
                dir.join(filename)
            }
        };

        let log_level = log_level.unwrap_or("INFO").to_uppercase();

        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }

        let logger = Self {
            log_file,
            log_level,
        };

        if !logger.log_file.exists() {
            logger.initialize_log_file()?;
        }

        Ok(logger)
    }

    fn initialize_log_file(&self) -> Result<()> {
        let mut file = File::create(&self.log_file)
            .with_context(|| format!("Failed to create log file: {}", self.log_file.display()))?;

        let now: DateTime<Utc> = Utc::now();

        writeln!(file, "# Data Lifecycle Journal\n")?;
        writeln!(file, "Journal started: {}\n", now.to_rfc3339())?;
        writeln!(file, "---\n")?;

        Ok(())
    }

    fn append_to_log(&self, content: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .with_context(|| format!("Failed to open log file: {}", self.log_file.display()))?;

        write!(file, "{}", content).with_context(|| "Failed to write to log file")?;

        Ok(())
    }

    /// Whether entries at `level` are written
    pub fn is_enabled(&self, level: &str) -> bool {
        level_rank(level) >= level_rank(&self.log_level)
    }

    fn append_at(&self, level: &str, content: &str) -> Result<()> {
        if !self.is_enabled(level) {
            return Ok(());
        }
        self.append_to_log(content)
    }

    /// Log the start of an initialization run.
    ///
    /// # Arguments
    /// * `options` - Options of the run, as JSON values.
    pub fn log_run_start(&self, options: &HashMap<String, serde_json::Value>) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "## Initialization Started - {}\n\n**Options:** {}\n\n",
            now.to_rfc3339(),
            serde_json::to_string_pretty(options).unwrap_or_default()
        );

        self.append_at("INFO", &content)?;
        info!("Initialization started");
        Ok(())
    }

    /// Log the outcome of an initialization run.
    pub fn log_run_complete(
        &self,
        success: bool,
        data_restored: bool,
        warnings: &[String],
        errors: &[String],
    ) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let mut content = format!(
            "### Initialization {} - {}\n\n**Data Restored:** {}\n\n",
            if success { "Completed" } else { "Failed" },
            now.to_rfc3339(),
            data_restored
        );

        if !warnings.is_empty() {
            content.push_str("**Warnings:**\n");
            for warning in warnings {
                content.push_str(&format!("- {}\n", warning));
            }
            content.push('\n');
        }

        if !errors.is_empty() {
            content.push_str("**Errors:**\n");
            for err in errors {
                content.push_str(&format!("- {}\n", err));
            }
            content.push('\n');
        }
        content.push_str("---\n\n");

        let level = if success { "INFO" } else { "ERROR" };
        self.append_at(level, &content)?;
        info!(
            "Initialization finished: success={} warnings={} errors={}",
            success,
            warnings.len(),
            errors.len()
        );
        Ok(())
    }

    /// Log a created backup.
    ///
    /// # Arguments
    /// * `timestamp` - Backup identity (epoch milliseconds).
    /// * `size` - Serialized payload size in bytes.
    /// * `keys` - Number of key-value entries captured.
    /// * `rows` - Number of relational rows captured.
    pub fn log_backup_created(&self, timestamp: i64, size: u64, keys: usize, rows: usize) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "### Backup Created - {}\n\n**Backup:** {}\n**Size:** {} bytes\n**Entries:** {} keys, {} rows\n\n",
            now.to_rfc3339(),
            timestamp,
            size,
            keys,
            rows
        );

        self.append_at("INFO", &content)?;
        Ok(())
    }

    /// Log a restore attempt.
    pub fn log_restore(&self, timestamp: Option<i64>, success: bool, detail: Option<&str>) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let mut content = format!(
            "### Restore {} - {}\n\n**Backup:** {}\n\n",
            if success { "Completed" } else { "Failed" },
            now.to_rfc3339(),
            timestamp
                .map(|ts| ts.to_string())
                .unwrap_or_else(|| "none".to_string())
        );

        if let Some(detail) = detail {
            content.push_str(&format!("**Detail:** {}\n\n", detail));
        }

        self.append_at(if success { "INFO" } else { "ERROR" }, &content)?;
        Ok(())
    }

    /// Log a retention cleanup.
    ///
    /// # Arguments
    /// * `deleted` - Backup keys that were removed.
    /// * `kept` - Number of backups kept.
    pub fn log_cleanup(&self, deleted: &[String], kept: usize) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let mut content = format!(
            "### Cleanup - {}\n\n**Kept:** {}\n**Removed:** {}\n",
            now.to_rfc3339(),
            kept,
            deleted.len()
        );
        for key in deleted {
            content.push_str(&format!("- `{}`\n", key));
        }
        content.push('\n');

        self.append_at("INFO", &content)?;
        Ok(())
    }

    /// Log a non-fatal storage condition.
    pub fn log_storage_warning(&self, message: &str) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "### Storage Warning - {}\n\n{}\n\n",
            now.to_rfc3339(),
            message
        );

        self.append_at("WARN", &content)?;
        warn!("{}", message);
        Ok(())
    }

    /// Log a failure that aborted a lifecycle operation.
    ///
    /// # Arguments
    /// * `error` - Error message.
    /// * `context` - Run options and the error kind, rendered as JSON.
    pub fn log_error(
        &self,
        error: &str,
        context: Option<&HashMap<String, serde_json::Value>>,
    ) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let mut content = format!(
            "### Error - {}\n\n**Error:** {}\n\n",
            now.to_rfc3339(),
            error
        );

        if let Some(ctx) = context {
            content.push_str(&format!(
                "**Context:** {}\n\n",
                serde_json::to_string_pretty(ctx).unwrap_or_default()
            ));
        }

        self.append_at("ERROR", &content)?;
        error!("{}", error);
        Ok(())
    }

    /// Get the log file path.
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Get the log level.
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

fn level_rank(level: &str) -> u8 {
    match level.to_uppercase().as_str() {
        "DEBUG" | "TRACE" => 0,
        "WARN" | "WARNING" => 2,
        "ERROR" => 3,
        _ => 1,
    }
}
