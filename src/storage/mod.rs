//! Storage lifecycle subsystem
//!
//! Validates available space, initializes the key-value and relational
//! stores, checks their integrity, and creates, restores and retires
//! point-in-time backups.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use adl::storage::{CleanupOptions, StorageConfig, StorageManager};
//!
//! # #[cfg(all(feature = "sqlite", feature = "disk"))]
//! async fn example() -> anyhow::Result<()> {
//!     let manager = StorageManager::open(StorageConfig::with_data_dir("/var/lib/app")).await?;
//!     manager.initialize_app_data().await?;
//!
//!     let backup = manager.create_backup().await?;
//!     println!("backup {} ({} bytes)", backup.metadata.timestamp, backup.metadata.size);
//!
//!     manager.cleanup_storage(CleanupOptions::default()).await?;
//!     Ok(())
//! }
//! ```

/// Store adapter traits and implementations
pub mod adapters;
/// Snapshot capture and restore
pub mod backup;
/// Storage capacity probes
pub mod capacity;
/// Storage and retention configuration
pub mod config;
/// Storage error taxonomy
pub mod errors;
/// Store reachability checks
pub mod integrity;
/// High-level storage API
pub mod manager;
/// Capacity and snapshot models
pub mod models;
/// Backup retention
pub mod retention;

pub use adapters::{
    AdapterError, AdapterResult, FileKeyValueStore, KeyValueStore, KeyValueStoreExt,
    MemoryKeyValueStore, RelationalStore, Row, SqlValue,
};
#[cfg(feature = "sqlite")]
pub use adapters::SqliteRelationalStore;
pub use backup::BackupEngine;
#[cfg(feature = "disk")]
pub use capacity::DiskCapacityProbe;
pub use capacity::{CapacityProbe, FixedCapacityProbe};
pub use config::{CleanupOptions, RetentionPolicy, StorageConfig};
pub use errors::{StorageError, StorageErrorKind, StorageResult, GENERIC_STORAGE_ADVISORY};
pub use integrity::{IntegrityChecker, IntegrityReport};
pub use manager::{StorageManager, StorageWarning, WarningCallback};
pub use models::{
    BackupData, BackupMetadata, KeyValueSnapshot, RelationalSnapshot, StorageStats, TaskRow,
    BACKUP_FORMAT_VERSION, BACKUP_KEY_PREFIX,
};
pub use retention::{CleanupReport, RetentionManager};
