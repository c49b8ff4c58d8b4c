//! App Data Lifecycle (ADL) - storage validation, dual-store initialization,
//! backups and retention
//!
//! ADL provides a set of feature-gated modules:
//!
//! - **`storage`** - Capacity probes, store adapters, integrity checks, backups and retention
//! - **`sqlite`** - SQLite relational store (`rusqlite`, bundled)
//! - **`disk`** - Disk capacity probe (`sysinfo`)
//! - **`lifecycle`** - Startup and shutdown orchestration
//! - **`config`** - TOML configuration loading
//! - **`observability`** - Markdown lifecycle journal
//!
//! # Features
//!
//! Enable the features you need in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! adl = { version = "0.3", default-features = false, features = ["storage"] }
//! # Or enable everything:
//! adl = { version = "0.3", features = ["all"] }
//! ```
//!
//! # Example: Startup and shutdown
//!
//! ```ignore
//! use adl::prelude::*;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! async fn run() -> anyhow::Result<()> {
//!     let loader = ConfigurationLoader::new(Some(Path::new("config/app.toml")))?;
//!     let storage_config = loader.storage_config();
//!     let default_language = storage_config.default_language.clone();
//!
//!     let storage = Arc::new(StorageManager::open(storage_config).await?);
//!     let language = Arc::new(StoredLanguage::new(
//!         storage.key_value_store().clone(),
//!         default_language,
//!     ));
//!     let logger = Logger::new(Some(Path::new(&loader.config.logging.log_file)), None)?;
//!
//!     let app = AppInitializer::new(storage, language).with_logger(logger);
//!     let result = app.initialize(InitializationOptions::default()).await;
//!     if !result.success {
//!         anyhow::bail!("startup failed: {:?}", result.errors);
//!     }
//!
//!     if let Err(e) = app.shutdown().await {
//!         eprintln!("{}", handle_storage_error(&e));
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Configuration management (enabled with the `config` feature)
#[cfg(feature = "config")]
pub mod config;

/// Observability utilities (enabled with the `observability` feature)
#[cfg(feature = "observability")]
pub mod observability;

/// Storage lifecycle subsystem (enabled with the `storage` feature)
#[cfg(feature = "storage")]
pub mod storage;

/// Application lifecycle orchestration (enabled with the `lifecycle` feature)
#[cfg(feature = "lifecycle")]
pub mod lifecycle;

/// Prelude module for convenient imports
pub mod prelude {
    #[cfg(feature = "config")]
    pub use crate::config::{Configuration, ConfigurationLoader};

    #[cfg(feature = "observability")]
    pub use crate::observability::Logger;

    #[cfg(feature = "storage")]
    pub use crate::storage::{
        BackupData, BackupMetadata, CapacityProbe, CleanupOptions, CleanupReport, KeyValueStore,
        RelationalStore, StorageConfig, StorageError, StorageErrorKind, StorageManager,
        StorageResult, StorageStats,
    };

    #[cfg(feature = "lifecycle")]
    pub use crate::lifecycle::{
        handle_storage_error, AppInitializer, InitState, InitializationOptions,
        InitializationResult, LanguageBootstrap, StoredLanguage,
    };
}
