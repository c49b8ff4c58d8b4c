//! Observability utilities for the data lifecycle.
//!
//! Diagnostic output goes through `tracing`; the crate installs no
//! subscriber. [`Logger`] additionally keeps a markdown journal of lifecycle
//! events that outlives the process.
//!
//! # Example
//!
//! ```no_run
//! use adl::observability::Logger;
//! use std::collections::HashMap;
//!
//! let logger = Logger::new(None, Some("INFO")).unwrap();
//!
//! logger.log_run_start(&HashMap::new()).unwrap();
//! logger.log_backup_created(1700000000000, 2048, 4, 1).unwrap();
//! logger.log_run_complete(true, false, &[], &[]).unwrap();
//! ```

/// Markdown lifecycle journal
pub mod logger;

// Re-export main types for convenience
pub use logger::Logger;
