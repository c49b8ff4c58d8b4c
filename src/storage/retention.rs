//! Retention cleanup for stored backups

use serde::Serialize;
use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::adapters::KeyValueStore;
use super::config::CleanupOptions;
use super::errors::{StorageError, StorageResult};
use super::models::{is_backup_key, parse_backup_timestamp};

/// Result of one cleanup run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Backups removed, or that would be removed on a dry run
    pub deleted_backups: usize,
    /// Backups left in place
    pub kept_backups: usize,
    /// Keys of the removed backups
    pub deleted_keys: Vec<String>,
    /// Wall-clock duration of the run
    pub duration_ms: u64,
    /// Nothing was removed
    pub dry_run: bool,
}

/// Retires backups beyond the retention limit
pub struct RetentionManager {
    kv: Arc<dyn KeyValueStore>,
    dry_run: bool,
}

impl RetentionManager {
    /// Create a new retention manager
    pub fn new(kv: Arc<dyn KeyValueStore>, dry_run: bool) -> Self {
        Self { kv, dry_run }
    }

    /// Run cleanup with the given options
    pub async fn run_cleanup(&self, options: &CleanupOptions) -> StorageResult<CleanupReport> {
        let start_time = Instant::now();
        let mut report = CleanupReport {
            dry_run: self.dry_run,
            ..CleanupReport::default()
        };

        let keys: Vec<String> = self
            .kv
            .list_keys()
            .await
            .map_err(|e| StorageError::cleanup_failed(format!("Failed to list backups: {}", e)))?
            .into_iter()
            .filter(|key| is_backup_key(key))
            .collect();

        if !options.remove_old_backups || keys.len() <= options.max_backups_to_keep {
            report.kept_backups = keys.len();
            report.duration_ms = start_time.elapsed().as_millis() as u64;
            debug!("Cleanup: nothing to do ({} backups)", keys.len());
            return Ok(report);
        }

        let (kept, expired) = select_expired(keys, options.max_backups_to_keep);

        if !self.dry_run {
            self.kv.remove_many(&expired).await.map_err(|e| {
                StorageError::cleanup_failed(format!("Failed to remove old backups: {}", e))
            })?;
        }

        report.kept_backups = kept.len();
        report.deleted_backups = expired.len();
        report.deleted_keys = expired;
        report.duration_ms = start_time.elapsed().as_millis() as u64;

        info!(
            "Cleanup {} {} backups, kept {}",
            if self.dry_run { "would remove" } else { "removed" },
            report.deleted_backups,
            report.kept_backups
        );
        Ok(report)
    }
}

/// Split backup keys into the `keep` newest and the rest.
///
/// Keys are ordered by embedded timestamp, newest first. Keys without a
/// parseable timestamp sort as oldest.
pub fn select_expired(mut keys: Vec<String>, keep: usize) -> (Vec<String>, Vec<String>) {
    keys.sort_by_key(|key| Reverse(parse_backup_timestamp(key)));
    let expired = keys.split_off(keep.min(keys.len()));
    (keys, expired)
}
