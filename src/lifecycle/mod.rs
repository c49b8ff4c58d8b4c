//! Application lifecycle over the storage subsystem
//!
//! [`AppInitializer`] sequences startup (capacity, language, app data,
//! integrity, cleanup) and shutdown (final backup). [`handle_storage_error`]
//! turns any error into an advisory suitable for end users.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use adl::lifecycle::{AppInitializer, InitializationOptions, StoredLanguage};
//! use adl::storage::{StorageConfig, StorageManager};
//! use std::sync::Arc;
//!
//! # #[cfg(all(feature = "sqlite", feature = "disk"))]
//! async fn example() -> anyhow::Result<()> {
//!     let storage = Arc::new(StorageManager::open(StorageConfig::with_data_dir("/var/lib/app")).await?);
//!     let language = Arc::new(StoredLanguage::new(storage.key_value_store().clone(), "en"));
//!     let app = AppInitializer::new(storage, language);
//!
//!     let result = app
//!         .initialize(InitializationOptions {
//!             restore_from_backup: true,
//!             ..Default::default()
//!         })
//!         .await;
//!     for warning in &result.warnings {
//!         println!("warning: {}", warning);
//!     }
//!
//!     app.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod initializer;
mod language;

pub use initializer::{
    AppInitializer, InitState, InitializationOptions, InitializationResult, ALREADY_INITIALIZED,
    RECOVERY_FAILED,
};
pub use language::{LanguageBootstrap, StoredLanguage, LANGUAGE_KEY};

use crate::storage::{StorageError, GENERIC_STORAGE_ADVISORY};

/// Map an error to a fixed user-facing advisory.
///
/// The error and its source chain are searched for a [`StorageError`]; its
/// kind selects the advisory. Anything else gets the generic advisory.
pub fn handle_storage_error(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(storage_err) = e.downcast_ref::<StorageError>() {
            return storage_err.user_friendly_message().to_string();
        }
        current = e.source();
    }
    GENERIC_STORAGE_ADVISORY.to_string()
}
