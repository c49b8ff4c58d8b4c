//! In-memory key-value store.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::traits::{AdapterResult, KeyValueStore};

/// Key-value store held entirely in memory.
///
/// Useful for embedding hosts that persist elsewhere and for tests.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Copy of the current contents
    pub async fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> AdapterResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> AdapterResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn multi_set(&self, entries: &[(String, String)]) -> AdapterResult<()> {
        let mut guard = self.entries.write().await;
        for (key, value) in entries {
            guard.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> AdapterResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn remove_many(&self, keys: &[String]) -> AdapterResult<()> {
        let mut guard = self.entries.write().await;
        for key in keys {
            guard.remove(key);
        }
        Ok(())
    }

    async fn list_keys(&self) -> AdapterResult<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn clear(&self) -> AdapterResult<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_basic_operations() {
        let store = MemoryKeyValueStore::new();

        store.set("@app:language", "es").await.unwrap();
        assert_eq!(
            store.get("@app:language").await.unwrap(),
            Some("es".to_string())
        );

        store.remove("@app:language").await.unwrap();
        assert_eq!(store.get("@app:language").await.unwrap(), None);

        // Removing again is fine
        store.remove("@app:language").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_store_batch_operations() {
        let store = MemoryKeyValueStore::with_entries([("a", "1")]);

        store
            .multi_set(&[
                ("b".to_string(), "2".to_string()),
                ("c".to_string(), "3".to_string()),
            ])
            .await
            .unwrap();
        assert_eq!(store.list_keys().await.unwrap(), vec!["a", "b", "c"]);

        store
            .remove_many(&["a".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(store.list_keys().await.unwrap(), vec!["b", "c"]);

        store.clear().await.unwrap();
        assert!(store.snapshot().await.is_empty());
    }
}
