//! Configuration management for the data lifecycle.
//!
//! Loads the application's TOML file. The `[storage]` section maps onto
//! [`StorageConfig`](crate::storage::StorageConfig); the storage subsystem
//! itself never reads files or environment variables.
//!
//! # Example
//!
//! ```no_run
//! use adl::config::ConfigurationLoader;
//! use std::path::Path;
//!
//! let loader = ConfigurationLoader::new(Some(Path::new("config/app.toml"))).unwrap();
//! for problem in loader.validate() {
//!     eprintln!("config: {}", problem);
//! }
//!
//! println!("Journal: {}", loader.config.logging.log_file);
//! ```

/// TOML configuration loader
pub mod config;

// Re-export main types for convenience
pub use self::config::{AppConfig, Configuration, ConfigurationLoader, LoggingConfig};
