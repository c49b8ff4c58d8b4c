//! App Initialization Orchestrator
//!
//! Runs the startup sequence against a [`StorageManager`]:
//!
//! 1. short-circuit when already initialized
//! 2. capacity validation
//! 3. language bootstrap
//! 4. app data initialization, with optional recovery from the latest backup
//! 5. integrity check
//! 6. retention cleanup
//!
//! Steps run strictly one after another. Only an unexpected failure in step 2
//! or step 4 aborts the run; everything else is reported through the
//! warnings and errors of the [`InitializationResult`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::language::LanguageBootstrap;
use crate::observability::Logger;
use crate::storage::{BackupData, StorageError, StorageErrorKind, StorageManager, StorageResult};

/// Warning returned when `initialize` runs on an initialized application
pub const ALREADY_INITIALIZED: &str = "Application already initialized";

/// Prefix of every recovery error string
pub const RECOVERY_FAILED: &str = "Data recovery failed";

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitState {
    /// No successful run yet, or reset
    Uninitialized,
    /// A run is in progress
    Initializing,
    /// The last run completed
    Initialized,
}

/// Caller-supplied toggles for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitializationOptions {
    /// Check free space before anything else
    pub validate_storage: bool,
    /// Restore the latest backup when corruption is detected
    pub restore_from_backup: bool,
    /// Apply the retention policy at the end of the run
    pub cleanup_old_data: bool,
}

impl Default for InitializationOptions {
    fn default() -> Self {
        Self {
            validate_storage: true,
            restore_from_backup: false,
            cleanup_old_data: true,
        }
    }
}

/// Outcome of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InitializationResult {
    /// `false` only when a fatal step aborted the run
    pub success: bool,
    /// Failures, fatal or not
    pub errors: Vec<String>,
    /// Non-fatal conditions
    pub warnings: Vec<String>,
    /// A backup was written back during this run
    pub data_restored: bool,
}

/// Sequences application startup and shutdown over the storage subsystem
pub struct AppInitializer {
    storage: Arc<StorageManager>,
    language: Arc<dyn LanguageBootstrap>,
    logger: Option<Logger>,
    state: Mutex<InitState>,
    /// Serializes `initialize` runs
    run_lock: tokio::sync::Mutex<()>,
}

impl AppInitializer {
    /// Create an uninitialized orchestrator
    pub fn new(storage: Arc<StorageManager>, language: Arc<dyn LanguageBootstrap>) -> Self {
        Self {
            storage,
            language,
            logger: None,
            state: Mutex::new(InitState::Uninitialized),
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Record runs, backups, restores and cleanups in a journal
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Storage manager the orchestrator drives
    pub fn storage(&self) -> &Arc<StorageManager> {
        &self.storage
    }

    fn lock_state(&self) -> MutexGuard<'_, InitState> {
        // State is a plain enum; a poisoned guard still holds a valid value
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, next: InitState) {
        let mut state = self.lock_state();
        debug!("Lifecycle state {:?} -> {:?}", *state, next);
        *state = next;
    }

    /// Current state
    pub fn state(&self) -> InitState {
        *self.lock_state()
    }

    /// Whether the last run completed
    pub fn is_initialized(&self) -> bool {
        self.state() == InitState::Initialized
    }

    /// Return to `Uninitialized`; the next `initialize` runs every step again
    pub fn reset(&self) {
        self.set_state(InitState::Uninitialized);
        info!("Lifecycle reset");
    }

    /// Run the startup sequence.
    ///
    /// Concurrent calls are serialized; a caller that waited observes the
    /// state left by the previous run.
    pub async fn initialize(&self, options: InitializationOptions) -> InitializationResult {
        let _run = self.run_lock.lock().await;
        let mut result = InitializationResult::default();

        if self.is_initialized() {
            result.success = true;
            result.warnings.push(ALREADY_INITIALIZED.to_string());
            return result;
        }

        self.set_state(InitState::Initializing);
        self.journal(|logger| logger.log_run_start(&options_map(&options)));

        match self.run_steps(&options, &mut result).await {
            Ok(()) => {
                result.success = true;
                self.set_state(InitState::Initialized);
            }
            Err(e) => {
                warn!("Initialization aborted: {}", e);
                let message = format!("Initialization failed: {}", e);
                let mut context = options_map(&options);
                context.insert(
                    "kind".to_string(),
                    serde_json::Value::String(e.kind().as_str().to_string()),
                );
                self.journal(|logger| logger.log_error(&message, Some(&context)));

                result.success = false;
                result.errors.push(message);
                self.set_state(InitState::Uninitialized);
            }
        }

        self.journal(|logger| {
            logger.log_run_complete(
                result.success,
                result.data_restored,
                &result.warnings,
                &result.errors,
            )
        });
        result
    }

    async fn run_steps(
        &self,
        options: &InitializationOptions,
        result: &mut InitializationResult,
    ) -> StorageResult<()> {
        if options.validate_storage {
            match self.storage.validate_storage_space().await {
                Ok(stats) => {
                    let threshold = self.storage.config().warning_threshold_percent;
                    if stats.used_percentage() > threshold {
                        let message = format!(
                            "Storage usage at {:.1}% exceeds {:.1}%",
                            stats.used_percentage(),
                            threshold
                        );
                        self.journal(|logger| logger.log_storage_warning(&message));
                        result.warnings.push(message);
                    }
                }
                Err(e) if e.kind() == StorageErrorKind::InsufficientSpace => {
                    result
                        .warnings
                        .push(format!("Low storage space: {}", e.message()));
                }
                Err(e) => return Err(e),
            }
        }

        match self.language.initialize_language().await {
            Ok(code) => debug!("Language initialized: {}", code),
            Err(e) => result
                .errors
                .push(format!("Language initialization failed: {:#}", e)),
        }

        match self.storage.initialize_app_data().await {
            Ok(()) => {}
            Err(e) if e.kind() == StorageErrorKind::CorruptedData => {
                result
                    .warnings
                    .push(format!("Data corruption detected: {}", e.message()));
                if options.restore_from_backup {
                    self.recover(result).await;
                }
            }
            Err(e) => return Err(e),
        }

        if !self.storage.verify_data_integrity().await {
            result.warnings.push("Data integrity check failed".to_string());
        }

        if options.cleanup_old_data {
            match self.storage.cleanup_with_policy().await {
                Ok(report) => {
                    if report.deleted_backups > 0 {
                        self.journal(|logger| {
                            logger.log_cleanup(&report.deleted_keys, report.kept_backups)
                        });
                    }
                }
                Err(e) => result.warnings.push(format!("Cleanup failed: {}", e.message())),
            }
        }

        Ok(())
    }

    /// Restore the newest readable backup after corruption was detected.
    /// A relational store that is still unreadable is reset first.
    async fn recover(&self, result: &mut InitializationResult) {
        let backup = match self.storage.get_latest_backup().await {
            Ok(Some(backup)) => backup,
            Ok(None) => {
                result
                    .errors
                    .push(format!("{}: no backup available", RECOVERY_FAILED));
                self.journal(|logger| logger.log_restore(None, false, Some("no backup available")));
                return;
            }
            Err(e) => {
                result.errors.push(format!("{}: {}", RECOVERY_FAILED, e));
                return;
            }
        };

        let timestamp = backup.metadata.timestamp;
        match self.storage.recover_from_backup(&backup).await {
            Ok(()) => {
                result.data_restored = true;
                info!("Recovered data from backup {}", timestamp);
                self.journal(|logger| logger.log_restore(Some(timestamp), true, None));
            }
            Err(e) => {
                let detail = e.to_string();
                result.errors.push(format!("{}: {}", RECOVERY_FAILED, detail));
                self.journal(|logger| logger.log_restore(Some(timestamp), false, Some(&detail)));
            }
        }
    }

    /// Take one final backup; its error is returned unchanged
    pub async fn shutdown(&self) -> Result<BackupData, StorageError> {
        let backup = self.storage.create_backup().await?;
        self.journal(|logger| {
            logger.log_backup_created(
                backup.metadata.timestamp,
                backup.metadata.size,
                backup.async_storage_data.len(),
                backup.database_data.row_count(),
            )
        });
        info!("Shutdown backup {} written", backup.metadata.timestamp);
        Ok(backup)
    }

    /// Journal writes never fail the operation being recorded
    fn journal<F>(&self, write: F)
    where
        F: FnOnce(&Logger) -> anyhow::Result<()>,
    {
        if let Some(logger) = &self.logger {
            if let Err(e) = write(logger) {
                warn!("Failed to write lifecycle journal: {:#}", e);
            }
        }
    }
}

fn options_map(options: &InitializationOptions) -> HashMap<String, serde_json::Value> {
    HashMap::from([
        (
            "validate_storage".to_string(),
            serde_json::Value::Bool(options.validate_storage),
        ),
        (
            "restore_from_backup".to_string(),
            serde_json::Value::Bool(options.restore_from_backup),
        ),
        (
            "cleanup_old_data".to_string(),
            serde_json::Value::Bool(options.cleanup_old_data),
        ),
    ])
}
