//! Store Adapter Traits
//!
//! Defines the contracts the lifecycle system needs from the key-value store
//! and the relational store.

use async_trait::async_trait;
use std::collections::BTreeMap;

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Error types for adapter operations
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// IO error during a store operation
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Key or row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Permission denied by the platform
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The store reports damaged content
    #[error("Corrupted store: {0}")]
    Corrupted(String),

    /// Generic backend error
    #[error("Backend error: {0}")]
    Backend(String),
}

impl AdapterError {
    /// Whether the platform refused access, directly or through an IO error
    pub fn is_permission_denied(&self) -> bool {
        match self {
            AdapterError::PermissionDenied(_) => true,
            AdapterError::Io(e) => e.kind() == std::io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }
}

/// A single relational column value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL `NULL`
    Null,
    /// 64-bit integer
    Integer(i64),
    /// Floating point
    Real(f64),
    /// UTF-8 text
    Text(String),
}

impl SqlValue {
    /// Whether this is SQL `NULL`
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Integer value, if this is an integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Text value, if this is text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One result row keyed by column name
pub type Row = BTreeMap<String, SqlValue>;

/// String-keyed, string-valued persistent map
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get the backend type name (e.g., "memory", "file")
    fn backend_type(&self) -> &'static str;

    /// Read a value, `None` when the key is absent
    async fn get(&self, key: &str) -> AdapterResult<Option<String>>;

    /// Write a single value
    async fn set(&self, key: &str, value: &str) -> AdapterResult<()>;

    /// Write many values in one batch
    async fn multi_set(&self, entries: &[(String, String)]) -> AdapterResult<()>;

    /// Remove a key; removing an absent key is not an error
    async fn remove(&self, key: &str) -> AdapterResult<()>;

    /// List every key in the store
    async fn list_keys(&self) -> AdapterResult<Vec<String>>;

    /// Remove every key in the store
    async fn clear(&self) -> AdapterResult<()>;

    /// Remove multiple keys (default implementation)
    async fn remove_many(&self, keys: &[String]) -> AdapterResult<()> {
        for key in keys {
            self.remove(key).await?;
        }
        Ok(())
    }

    /// Read multiple keys (default implementation)
    async fn multi_get(&self, keys: &[String]) -> AdapterResult<Vec<(String, Option<String>)>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push((key.clone(), self.get(key).await?));
        }
        Ok(values)
    }
}

/// Extension trait for JSON values stored in a key-value store
#[async_trait]
pub trait KeyValueStoreExt: KeyValueStore {
    /// Write a JSON-serializable value
    async fn set_json<T: serde::Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> AdapterResult<()> {
        let json =
            serde_json::to_string(value).map_err(|e| AdapterError::Serialization(e.to_string()))?;
        self.set(key, &json).await
    }

    /// Read and deserialize a JSON value
    async fn get_json<T: serde::de::DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> AdapterResult<Option<T>> {
        match self.get(key).await? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| AdapterError::Deserialization(format!("{}: {}", key, e))),
            None => Ok(None),
        }
    }
}

// Blanket implementation for all KeyValueStore implementors
impl<T: KeyValueStore + ?Sized> KeyValueStoreExt for T {}

/// Single relational store exposing schema setup and statement execution
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Get the backend type name (e.g., "sqlite")
    fn backend_type(&self) -> &'static str;

    /// Create the schema if needed and check the store is usable
    async fn initialize_schema(&self) -> AdapterResult<()>;

    /// Run a statement with positional parameters.
    ///
    /// Statements that produce columns return their rows; everything else
    /// returns an empty vector. `execute("SELECT 1", &[])` succeeds iff the
    /// store is reachable and its schema is valid.
    async fn execute(&self, statement: &str, params: &[SqlValue]) -> AdapterResult<Vec<Row>>;

    /// Replace a damaged store with an empty one carrying the schema.
    ///
    /// Called before a backup is written into a store that failed
    /// `initialize_schema` as corrupted. Stores with nothing to discard keep
    /// the default, which does nothing.
    async fn reset_store(&self) -> AdapterResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_error_display() {
        let err = AdapterError::NotFound("@app:language".to_string());
        assert_eq!(err.to_string(), "Not found: @app:language");

        let err = AdapterError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_permission_denied_detection() {
        assert!(AdapterError::PermissionDenied("db".into()).is_permission_denied());
        assert!(AdapterError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied"
        ))
        .is_permission_denied());
        assert!(!AdapterError::Backend("other".into()).is_permission_denied());
    }

    #[test]
    fn test_sql_value_conversions() {
        assert_eq!(SqlValue::from(7i64), SqlValue::Integer(7));
        assert_eq!(SqlValue::from("t1"), SqlValue::Text("t1".into()));
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(5i64)).as_i64(), Some(5));
        assert!(SqlValue::Null.is_null());
        assert_eq!(SqlValue::Integer(1).as_str(), None);
    }
}
