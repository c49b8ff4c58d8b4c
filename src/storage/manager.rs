//! Storage Manager
//!
//! Composition root for capacity validation, store initialization, integrity
//! checks, backups and retention. A manager is an explicit value; share it
//! with `Arc<StorageManager>`.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::adapters::{AdapterError, KeyValueStore, RelationalStore};
use super::backup::BackupEngine;
use super::capacity::CapacityProbe;
use super::config::{CleanupOptions, StorageConfig};
use super::errors::{StorageError, StorageResult};
use super::integrity::{IntegrityChecker, IntegrityReport};
use super::models::{BackupData, BackupMetadata, StorageStats};
use super::retention::{CleanupReport, RetentionManager};

/// Non-fatal conditions raised while validating storage
#[derive(Debug, Clone, PartialEq)]
pub enum StorageWarning {
    /// Usage is above the warning threshold while free space is still sufficient
    HighUsage {
        /// Reading that crossed the threshold
        stats: StorageStats,
        /// Configured warning threshold in percent
        threshold: f64,
    },
}

/// Callback receiving storage warnings
pub type WarningCallback = Arc<dyn Fn(&StorageWarning) + Send + Sync>;

/// High-level API over both stores
pub struct StorageManager {
    config: StorageConfig,
    kv: Arc<dyn KeyValueStore>,
    db: Arc<dyn RelationalStore>,
    capacity: Arc<dyn CapacityProbe>,
    backups: BackupEngine,
    integrity: IntegrityChecker,
    on_warning: Option<WarningCallback>,
    /// Serializes backup, restore, cleanup and delete
    critical: Mutex<()>,
}

impl StorageManager {
    /// Create a manager over the given stores and probe
    pub fn new(
        config: StorageConfig,
        kv: Arc<dyn KeyValueStore>,
        db: Arc<dyn RelationalStore>,
        capacity: Arc<dyn CapacityProbe>,
    ) -> Self {
        Self {
            backups: BackupEngine::new(kv.clone(), db.clone()),
            integrity: IntegrityChecker::new(kv.clone(), db.clone()),
            config,
            kv,
            db,
            capacity,
            on_warning: None,
            critical: Mutex::new(()),
        }
    }

    /// Open the file-backed key-value store, SQLite database and disk probe
    /// under `config.data_dir`.
    ///
    /// Open failures are reported with the same kinds as
    /// [`initialize_app_data`](Self::initialize_app_data).
    #[cfg(all(feature = "sqlite", feature = "disk"))]
    pub async fn open(config: StorageConfig) -> StorageResult<Self> {
        use super::adapters::{FileKeyValueStore, SqliteRelationalStore};
        use super::capacity::DiskCapacityProbe;

        let kv = FileKeyValueStore::open(config.kv_path())
            .await
            .map_err(|e| init_error("key-value store", e))?;
        let db = SqliteRelationalStore::open(&config.db_path())
            .map_err(|e| init_error("relational store", e))?;
        let capacity = DiskCapacityProbe::new(config.data_dir.clone());

        info!("Opened storage under {}", config.data_dir.display());
        Ok(Self::new(
            config,
            Arc::new(kv),
            Arc::new(db),
            Arc::new(capacity),
        ))
    }

    /// Register a callback for storage warnings
    pub fn on_warning<F>(mut self, callback: F) -> Self
    where
        F: Fn(&StorageWarning) + Send + Sync + 'static,
    {
        self.on_warning = Some(Arc::new(callback));
        self
    }

    /// Configuration the manager was built with
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Shared handle to the key-value store
    pub fn key_value_store(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }

    /// Shared handle to the relational store
    pub fn relational_store(&self) -> &Arc<dyn RelationalStore> {
        &self.db
    }

    /// Read the current capacity from the probe
    pub async fn check_storage_space(&self) -> StorageResult<StorageStats> {
        self.capacity.check_storage_space().await
    }

    /// Fail with `InsufficientSpace` when free space is below the minimum.
    ///
    /// High usage above the warning threshold only raises a warning.
    pub async fn validate_storage_space(&self) -> StorageResult<StorageStats> {
        let stats = self.check_storage_space().await?;

        if stats.free_space < self.config.min_free_space_bytes {
            return Err(StorageError::insufficient_space(format!(
                "Only {} bytes free, at least {} required",
                stats.free_space, self.config.min_free_space_bytes
            )));
        }

        let threshold = self.config.warning_threshold_percent;
        if stats.used_percentage() > threshold {
            warn!(
                "Storage usage at {:.1}% exceeds the {:.1}% warning threshold",
                stats.used_percentage(),
                threshold
            );
            if let Some(callback) = &self.on_warning {
                callback(&StorageWarning::HighUsage { stats, threshold });
            }
        }

        Ok(stats)
    }

    /// Prepare both stores: relational schema plus a key-value probe
    pub async fn initialize_app_data(&self) -> StorageResult<()> {
        self.db
            .initialize_schema()
            .await
            .map_err(|e| init_error("relational store", e))?;
        self.kv
            .list_keys()
            .await
            .map_err(|e| init_error("key-value store", e))?;

        info!(
            "App data initialized ({} + {})",
            self.kv.backend_type(),
            self.db.backend_type()
        );
        Ok(())
    }

    /// `true` only when both stores answer their probes. Never fails.
    pub async fn verify_data_integrity(&self) -> bool {
        self.integrity.verify_data_integrity().await
    }

    /// Detailed integrity probe
    pub async fn integrity_report(&self) -> IntegrityReport {
        self.integrity.check().await
    }

    /// Validate capacity, then capture both stores into a stored snapshot.
    ///
    /// A capacity failure is returned unchanged before either store is touched.
    pub async fn create_backup(&self) -> StorageResult<BackupData> {
        let _guard = self.critical.lock().await;
        self.validate_storage_space().await?;
        self.backups.create().await
    }

    /// Write a snapshot back into both stores
    pub async fn restore_from_backup(&self, backup: &BackupData) -> StorageResult<()> {
        let _guard = self.critical.lock().await;
        self.backups.restore(backup).await
    }

    /// Restore a snapshot into stores that failed initialization.
    ///
    /// The checksum is verified first. When the relational store still fails
    /// `initialize_schema` as corrupted it is reset before the snapshot is
    /// written back; any other schema failure is left to the restore.
    pub async fn recover_from_backup(&self, backup: &BackupData) -> StorageResult<()> {
        let _guard = self.critical.lock().await;
        BackupEngine::verify(backup)?;

        if let Err(e) = self.db.initialize_schema().await {
            if matches!(e, AdapterError::Corrupted(_)) {
                warn!("Resetting relational store before recovery: {}", e);
                self.db.reset_store().await.map_err(|e| {
                    StorageError::restore_failed(format!(
                        "Failed to reset relational store: {}",
                        e
                    ))
                })?;
            }
        }

        self.backups.restore(backup).await
    }

    /// Newest readable snapshot; corrupt entries are skipped
    pub async fn get_latest_backup(&self) -> StorageResult<Option<BackupData>> {
        self.backups.latest().await
    }

    /// Metadata of every readable snapshot, newest first
    pub async fn list_backups(&self) -> StorageResult<Vec<BackupMetadata>> {
        self.backups.list().await
    }

    /// Snapshot stored under `timestamp`, if present and readable
    pub async fn get_backup(&self, timestamp: i64) -> StorageResult<Option<BackupData>> {
        self.backups.get(timestamp).await
    }

    /// Remove one snapshot; `false` when it did not exist
    pub async fn delete_backup(&self, timestamp: i64) -> StorageResult<bool> {
        let _guard = self.critical.lock().await;
        self.backups.delete(timestamp).await
    }

    /// Retire backups beyond `options.max_backups_to_keep`
    pub async fn cleanup_storage(&self, options: CleanupOptions) -> StorageResult<CleanupReport> {
        let _guard = self.critical.lock().await;
        RetentionManager::new(self.kv.clone(), false)
            .run_cleanup(&options)
            .await
    }

    /// Cleanup using the configured retention policy
    pub async fn cleanup_with_policy(&self) -> StorageResult<CleanupReport> {
        self.cleanup_storage(self.config.retention.into()).await
    }

    /// Report what a cleanup would remove without removing anything
    pub async fn preview_cleanup(&self, options: CleanupOptions) -> StorageResult<CleanupReport> {
        debug!("Previewing cleanup keeping {}", options.max_backups_to_keep);
        RetentionManager::new(self.kv.clone(), true)
            .run_cleanup(&options)
            .await
    }
}

fn init_error(store: &str, err: AdapterError) -> StorageError {
    let message = format!("Failed to initialize {}: {}", store, err);
    if err.is_permission_denied() {
        StorageError::permission_denied(message)
    } else {
        StorageError::corrupted(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::adapters::{AdapterResult, MemoryKeyValueStore, Row, SqlValue};
    use crate::storage::capacity::FixedCapacityProbe;
    use crate::storage::errors::StorageErrorKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    const MIB: u64 = 1024 * 1024;

    #[derive(Default)]
    struct NullDb {
        fail_schema: Option<fn() -> AdapterError>,
        resets: AtomicUsize,
    }

    #[async_trait]
    impl RelationalStore for NullDb {
        fn backend_type(&self) -> &'static str {
            "null"
        }

        async fn initialize_schema(&self) -> AdapterResult<()> {
            match self.fail_schema {
                Some(make) => Err(make()),
                None => Ok(()),
            }
        }

        async fn execute(&self, _statement: &str, _params: &[SqlValue]) -> AdapterResult<Vec<Row>> {
            Ok(Vec::new())
        }

        async fn reset_store(&self) -> AdapterResult<()> {
            self.resets.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Key-value store whose `multi_get` parks until released while gated
    #[derive(Default)]
    struct GatedKv {
        inner: MemoryKeyValueStore,
        gated: AtomicBool,
        entered: Notify,
        release: Notify,
        writes: AtomicUsize,
    }

    impl GatedKv {
        fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KeyValueStore for GatedKv {
        fn backend_type(&self) -> &'static str {
            "gated"
        }

        async fn get(&self, key: &str) -> AdapterResult<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> AdapterResult<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.set(key, value).await
        }

        async fn multi_set(&self, entries: &[(String, String)]) -> AdapterResult<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.multi_set(entries).await
        }

        async fn remove(&self, key: &str) -> AdapterResult<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.remove(key).await
        }

        async fn remove_many(&self, keys: &[String]) -> AdapterResult<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.remove_many(keys).await
        }

        async fn list_keys(&self) -> AdapterResult<Vec<String>> {
            self.inner.list_keys().await
        }

        async fn clear(&self) -> AdapterResult<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.clear().await
        }

        async fn multi_get(&self, keys: &[String]) -> AdapterResult<Vec<(String, Option<String>)>> {
            if self.gated.load(Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.multi_get(keys).await
        }
    }

    fn manager(total: u64, free: u64) -> StorageManager {
        StorageManager::new(
            StorageConfig::default(),
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(NullDb::default()),
            Arc::new(FixedCapacityProbe::new(total, free)),
        )
    }

    #[tokio::test]
    async fn test_insufficient_space() {
        let err = manager(100 * MIB, 5 * MIB)
            .validate_storage_space()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::InsufficientSpace);
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_high_usage_warns_without_failing() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        let manager = manager(1000 * MIB, 50 * MIB).on_warning(move |warning| {
            sink.lock().unwrap().push(warning.clone());
        });

        let stats = manager.validate_storage_space().await.unwrap();
        assert!(stats.used_percentage() > 90.0);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(
            seen[0],
            StorageWarning::HighUsage { threshold, .. } if threshold == 90.0
        ));
    }

    #[tokio::test]
    async fn test_unavailable_probe_is_permission_denied() {
        let manager = StorageManager::new(
            StorageConfig::default(),
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(NullDb::default()),
            Arc::new(FixedCapacityProbe::unavailable()),
        );
        let err = manager.create_backup().await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_initialize_maps_failures() {
        let corrupt = StorageManager::new(
            StorageConfig::default(),
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(NullDb {
                fail_schema: Some(|| AdapterError::Corrupted("malformed".into())),
                ..Default::default()
            }),
            Arc::new(FixedCapacityProbe::new(100 * MIB, 50 * MIB)),
        );
        let err = corrupt.initialize_app_data().await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::CorruptedData);

        let denied = StorageManager::new(
            StorageConfig::default(),
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(NullDb {
                fail_schema: Some(|| AdapterError::PermissionDenied("read-only".into())),
                ..Default::default()
            }),
            Arc::new(FixedCapacityProbe::new(100 * MIB, 50 * MIB)),
        );
        let err = denied.initialize_app_data().await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_preview_then_cleanup() {
        let manager = manager(100 * MIB, 50 * MIB);
        for _ in 0..5 {
            manager.create_backup().await.unwrap();
        }

        let preview = manager.preview_cleanup(CleanupOptions::default()).await.unwrap();
        assert_eq!(preview.deleted_backups, 2);
        assert_eq!(manager.list_backups().await.unwrap().len(), 5);

        let report = manager.cleanup_with_policy().await.unwrap();
        assert_eq!(report.deleted_keys, preview.deleted_keys);

        let remaining = manager.list_backups().await.unwrap();
        assert_eq!(remaining.len(), 3);
        let latest = manager.get_latest_backup().await.unwrap().unwrap();
        assert_eq!(latest.metadata, remaining[0]);
    }

    #[tokio::test]
    async fn test_restore_and_cleanup_wait_for_running_backup() {
        let kv = Arc::new(GatedKv::default());
        kv.inner.set("@app:language", "es").await.unwrap();
        let manager = Arc::new(StorageManager::new(
            StorageConfig::default(),
            kv.clone(),
            Arc::new(NullDb::default()),
            Arc::new(FixedCapacityProbe::new(100 * MIB, 50 * MIB)),
        ));
        let earlier = manager.create_backup().await.unwrap();

        kv.gated.store(true, Ordering::SeqCst);
        let backup = tokio::spawn({
            let manager = manager.clone();
            async move { manager.create_backup().await }
        });
        kv.entered.notified().await;
        let writes_before = kv.writes();

        let restore = tokio::spawn({
            let manager = manager.clone();
            async move { manager.restore_from_backup(&earlier).await }
        });
        let cleanup = tokio::spawn({
            let manager = manager.clone();
            async move {
                manager
                    .cleanup_storage(CleanupOptions {
                        remove_old_backups: true,
                        max_backups_to_keep: 1,
                    })
                    .await
            }
        });
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }

        assert_eq!(kv.writes(), writes_before);
        assert!(!restore.is_finished());
        assert!(!cleanup.is_finished());

        kv.gated.store(false, Ordering::SeqCst);
        kv.release.notify_one();
        backup.await.unwrap().unwrap();
        restore.await.unwrap().unwrap();
        cleanup.await.unwrap().unwrap();

        assert!(kv.writes() > writes_before);
        assert_eq!(manager.list_backups().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_recover_resets_corrupted_relational_store() {
        let db = Arc::new(NullDb {
            fail_schema: Some(|| AdapterError::Corrupted("file is not a database".into())),
            ..Default::default()
        });
        let manager = StorageManager::new(
            StorageConfig::default(),
            Arc::new(MemoryKeyValueStore::new()),
            db.clone(),
            Arc::new(FixedCapacityProbe::new(100 * MIB, 50 * MIB)),
        );
        let backup = manager.create_backup().await.unwrap();

        manager.recover_from_backup(&backup).await.unwrap();
        assert_eq!(db.resets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recover_rejects_tampered_backup_before_reset() {
        let db = Arc::new(NullDb {
            fail_schema: Some(|| AdapterError::Corrupted("malformed".into())),
            ..Default::default()
        });
        let manager = StorageManager::new(
            StorageConfig::default(),
            Arc::new(MemoryKeyValueStore::new()),
            db.clone(),
            Arc::new(FixedCapacityProbe::new(100 * MIB, 50 * MIB)),
        );
        let mut backup = manager.create_backup().await.unwrap();
        backup.metadata.checksum = Some("0".repeat(64));

        let err = manager.recover_from_backup(&backup).await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::RestoreFailed);
        assert_eq!(db.resets.load(Ordering::SeqCst), 0);
    }
}
