//! Backup Engine
//!
//! Captures both stores into a [`BackupData`] snapshot stored under
//! `@backup:<timestamp>` in the key-value store, and writes snapshots back.
//!
//! The engine does no locking and no capacity validation of its own. The
//! [`StorageManager`](super::StorageManager) sequences both around it.

use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::adapters::{
    AdapterError, AdapterResult, KeyValueStore, KeyValueStoreExt, RelationalStore,
};
use super::errors::{StorageError, StorageResult};
use super::models::{
    backup_key, is_backup_key, parse_backup_timestamp, BackupData, BackupMetadata,
    KeyValueSnapshot, RelationalSnapshot, TaskRow,
};

/// Serializes and deserializes snapshots of both stores
pub struct BackupEngine {
    kv: Arc<dyn KeyValueStore>,
    db: Arc<dyn RelationalStore>,
    last_timestamp: AtomicI64,
}

impl BackupEngine {
    /// Create an engine over both stores
    pub fn new(kv: Arc<dyn KeyValueStore>, db: Arc<dyn RelationalStore>) -> Self {
        Self {
            kv,
            db,
            last_timestamp: AtomicI64::new(0),
        }
    }

    /// Capture both stores and persist the snapshot
    pub async fn create(&self) -> StorageResult<BackupData> {
        let backup = self
            .capture()
            .await
            .map_err(|e| StorageError::backup_failed(format!("Failed to create backup: {}", e)))?;

        info!(
            "Backup {} created ({} keys, {} rows, {} bytes)",
            backup.metadata.timestamp,
            backup.async_storage_data.len(),
            backup.database_data.row_count(),
            backup.metadata.size
        );
        Ok(backup)
    }

    async fn capture(&self) -> AdapterResult<BackupData> {
        let keys = self.kv.list_keys().await?;
        let existing: HashSet<i64> = keys
            .iter()
            .filter_map(|key| parse_backup_timestamp(key))
            .collect();

        let data_keys: Vec<String> = keys.into_iter().filter(|k| !is_backup_key(k)).collect();
        let key_values: KeyValueSnapshot = self
            .kv
            .multi_get(&data_keys)
            .await?
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect();

        let relational = self.snapshot_relational().await?;

        let timestamp = self.next_timestamp(&existing);
        let backup = BackupData::assemble(timestamp, key_values, relational)
            .map_err(|e| AdapterError::Serialization(e.to_string()))?;

        self.kv.set_json(&backup.key(), &backup).await?;
        Ok(backup)
    }

    async fn snapshot_relational(&self) -> AdapterResult<RelationalSnapshot> {
        let rows = self.db.execute(TaskRow::SELECT_ALL, &[]).await?;
        let tasks = rows
            .iter()
            .map(TaskRow::from_row)
            .collect::<AdapterResult<Vec<_>>>()?;
        Ok(RelationalSnapshot { tasks })
    }

    /// Next timestamp: wall-clock millis, strictly above the last one issued
    /// and not already used by a stored backup
    fn next_timestamp(&self, existing: &HashSet<i64>) -> i64 {
        let mut last = self.last_timestamp.load(Ordering::SeqCst);
        loop {
            let mut candidate = Utc::now().timestamp_millis().max(last + 1);
            while existing.contains(&candidate) {
                candidate += 1;
            }

            match self.last_timestamp.compare_exchange(
                last,
                candidate,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return candidate,
                Err(current) => last = current,
            }
        }
    }

    /// Fail with `RestoreFailed` when the payload does not match its checksum
    pub fn verify(backup: &BackupData) -> StorageResult<()> {
        match backup.verify_checksum() {
            Ok(true) => Ok(()),
            Ok(false) => Err(restore_error(format!(
                "checksum mismatch for backup {}",
                backup.metadata.timestamp
            ))),
            Err(e) => Err(restore_error(e)),
        }
    }

    /// Write a snapshot back into both stores
    pub async fn restore(&self, backup: &BackupData) -> StorageResult<()> {
        Self::verify(backup)?;

        self.write_back(backup).await.map_err(restore_error)?;

        info!(
            "Backup {} restored ({} keys, {} rows)",
            backup.metadata.timestamp,
            backup.async_storage_data.len(),
            backup.database_data.row_count()
        );
        Ok(())
    }

    async fn write_back(&self, backup: &BackupData) -> AdapterResult<()> {
        let pairs = backup.async_storage_data.to_pairs();
        if !pairs.is_empty() {
            self.kv.multi_set(&pairs).await?;
        }

        self.db.execute(TaskRow::DELETE_ALL, &[]).await?;
        for task in &backup.database_data.tasks {
            self.db.execute(TaskRow::INSERT, &task.insert_params()).await?;
        }
        Ok(())
    }

    /// Backup keys with their parsed timestamps, `None` when unparseable
    pub(crate) async fn backup_keys(&self) -> AdapterResult<Vec<(String, Option<i64>)>> {
        Ok(self
            .kv
            .list_keys()
            .await?
            .into_iter()
            .filter(|key| is_backup_key(key))
            .map(|key| {
                let timestamp = parse_backup_timestamp(&key);
                (key, timestamp)
            })
            .collect())
    }

    /// Load one snapshot; unreadable entries are logged and treated as absent
    async fn load(&self, key: &str) -> AdapterResult<Option<BackupData>> {
        let backup: BackupData = match self.kv.get_json(key).await {
            Ok(Some(backup)) => backup,
            Ok(None) => return Ok(None),
            Err(AdapterError::Deserialization(e)) => {
                warn!("Skipping unreadable backup {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if !matches!(backup.verify_checksum(), Ok(true)) {
            warn!("Skipping backup {} with a bad checksum", key);
            return Ok(None);
        }
        Ok(Some(backup))
    }

    /// Timestamps of parseable backup keys, newest first
    async fn timestamps_newest_first(&self) -> AdapterResult<Vec<i64>> {
        let mut timestamps: Vec<i64> = self
            .backup_keys()
            .await?
            .into_iter()
            .filter_map(|(key, timestamp)| {
                if timestamp.is_none() {
                    warn!("Skipping backup key with unparseable timestamp: {}", key);
                }
                timestamp
            })
            .collect();
        timestamps.sort_unstable_by(|a, b| b.cmp(a));
        Ok(timestamps)
    }

    /// Newest readable snapshot, skipping corrupt entries
    pub async fn latest(&self) -> StorageResult<Option<BackupData>> {
        let lookup = async {
            for timestamp in self.timestamps_newest_first().await? {
                if let Some(backup) = self.load(&backup_key(timestamp)).await? {
                    return Ok(Some(backup));
                }
            }
            Ok::<_, AdapterError>(None)
        };

        lookup
            .await
            .map_err(|e| StorageError::backup_failed(format!("Failed to read backups: {}", e)))
    }

    /// Metadata of every readable snapshot, newest first
    pub async fn list(&self) -> StorageResult<Vec<BackupMetadata>> {
        let lookup = async {
            let mut listed = Vec::new();
            for timestamp in self.timestamps_newest_first().await? {
                if let Some(backup) = self.load(&backup_key(timestamp)).await? {
                    listed.push(backup.metadata);
                }
            }
            Ok::<_, AdapterError>(listed)
        };

        lookup
            .await
            .map_err(|e| StorageError::backup_failed(format!("Failed to list backups: {}", e)))
    }

    /// Snapshot stored under `timestamp`, if present and readable
    pub async fn get(&self, timestamp: i64) -> StorageResult<Option<BackupData>> {
        self.load(&backup_key(timestamp)).await.map_err(|e| {
            StorageError::backup_failed(format!("Failed to read backup {}: {}", timestamp, e))
        })
    }

    /// Remove the snapshot stored under `timestamp`; `false` when absent
    pub async fn delete(&self, timestamp: i64) -> StorageResult<bool> {
        let key = backup_key(timestamp);
        let removal = async {
            if self.kv.get(&key).await?.is_none() {
                return Ok(false);
            }
            self.kv.remove(&key).await?;
            Ok::<_, AdapterError>(true)
        };

        let removed = removal.await.map_err(|e| {
            StorageError::cleanup_failed(format!("Failed to delete backup {}: {}", timestamp, e))
        })?;
        debug!("Delete backup {}: removed={}", timestamp, removed);
        Ok(removed)
    }
}

fn restore_error(err: impl std::fmt::Display) -> StorageError {
    StorageError::restore_failed(format!("Failed to restore backup: {}", err))
}
