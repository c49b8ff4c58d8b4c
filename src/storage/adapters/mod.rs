//! Store Adapter Abstraction
//!
//! The lifecycle system talks to two external stores through traits: a
//! string-keyed [`KeyValueStore`] and a [`RelationalStore`]. In-memory and
//! file-backed key-value stores ship with the crate; the SQLite relational
//! store is behind the `sqlite` feature.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   StorageManager    │
//! │  (high-level API)   │
//! └──────────┬──────────┘
//!            │
//!     ┌──────┴───────────────┐
//!     │                      │
//! ┌───▼───────────┐   ┌──────▼──────────┐
//! │ KeyValueStore │   │ RelationalStore │  <-- Traits
//! └───┬───────────┘   └──────┬──────────┘
//!     │                      │
//! ┌───┴─────┐          ┌─────▼────┐
//! │ Memory  │          │  SQLite  │
//! │ File    │          └──────────┘
//! └─────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use adl::storage::adapters::{FileKeyValueStore, KeyValueStore};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let store = FileKeyValueStore::open("/path/to/kv_store.json").await?;
//!     store.set("@app:language", "es").await?;
//!     let language = store.get("@app:language").await?;
//!     Ok(())
//! }
//! ```

mod file_backend;
mod memory;
mod traits;

pub use file_backend::*;
pub use memory::*;
pub use traits::*;

#[cfg(feature = "sqlite")]
mod sqlite_backend;

#[cfg(feature = "sqlite")]
pub use sqlite_backend::SqliteRelationalStore;
