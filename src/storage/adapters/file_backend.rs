//! File System Key-Value Store
//!
//! Persists the whole map as one JSON document. Every mutation rewrites the
//! document with the temp file + rename pattern, so a crash leaves either the
//! old or the new document on disk.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::traits::{AdapterError, AdapterResult, KeyValueStore};

/// File system key-value store
pub struct FileKeyValueStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileKeyValueStore {
    /// Open the store at `path`, creating parent directories as needed.
    ///
    /// A missing file is an empty store. A file that is not a JSON object of
    /// strings fails with [`AdapterError::Deserialization`].
    pub async fn open<P: AsRef<Path>>(path: P) -> AdapterResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let entries = if fs::try_exists(&path).await? {
            let raw = fs::read(&path).await?;
            if raw.is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_slice(&raw).map_err(|e| {
                    AdapterError::Deserialization(format!("{}: {}", path.display(), e))
                })?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Get the document path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "kv_store.json".to_string());
        self.path
            .with_file_name(format!("{}.tmp.{}", file_name, Uuid::new_v4()))
    }

    /// Write `entries` to disk atomically
    async fn persist(&self, entries: &BTreeMap<String, String>) -> AdapterResult<()> {
        let data = serde_json::to_vec_pretty(entries)
            .map_err(|e| AdapterError::Serialization(e.to_string()))?;

        let temp_path = self.temp_path();
        let write_result = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, &self.path).await
        }
        .await;

        if let Err(e) = write_result {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Apply `mutate` to a copy of the map, persist it, then publish it.
    ///
    /// The in-memory map only changes once the document is on disk.
    async fn mutate<F>(&self, mutate: F) -> AdapterResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) + Send,
    {
        let mut guard = self.entries.write().await;
        let mut next = guard.clone();
        mutate(&mut next);
        self.persist(&next).await?;
        *guard = next;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    fn backend_type(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &str) -> AdapterResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> AdapterResult<()> {
        let (key, value) = (key.to_string(), value.to_string());
        self.mutate(move |map| {
            map.insert(key, value);
        })
        .await
    }

    async fn multi_set(&self, entries: &[(String, String)]) -> AdapterResult<()> {
        self.mutate(|map| {
            for (key, value) in entries {
                map.insert(key.clone(), value.clone());
            }
        })
        .await
    }

    async fn remove(&self, key: &str) -> AdapterResult<()> {
        if !self.entries.read().await.contains_key(key) {
            return Ok(()); // Idempotent delete
        }
        self.mutate(|map| {
            map.remove(key);
        })
        .await
    }

    async fn remove_many(&self, keys: &[String]) -> AdapterResult<()> {
        self.mutate(|map| {
            for key in keys {
                map.remove(key);
            }
        })
        .await
    }

    async fn list_keys(&self) -> AdapterResult<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn clear(&self) -> AdapterResult<()> {
        self.mutate(|map| map.clear()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_store_persists_across_open() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data").join("kv_store.json");

        {
            let store = FileKeyValueStore::open(&path).await.unwrap();
            store.set("@app:language", "es").await.unwrap();
            store
                .multi_set(&[
                    ("@sticky_note:1".to_string(), "{\"text\":\"hi\"}".to_string()),
                    ("@voice_notes:index".to_string(), "[]".to_string()),
                ])
                .await
                .unwrap();
        }

        let reopened = FileKeyValueStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get("@app:language").await.unwrap(),
            Some("es".to_string())
        );
        assert_eq!(reopened.list_keys().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_file_store_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("kv_store.json");
        let store = FileKeyValueStore::open(&path).await.unwrap();

        store.set("a", "1").await.unwrap();
        store.remove("a").await.unwrap();
        store.clear().await.unwrap();

        let names: Vec<String> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["kv_store.json".to_string()]);
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("kv_store.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = FileKeyValueStore::open(&path).await;
        assert!(matches!(result, Err(AdapterError::Deserialization(_))));
    }

    #[tokio::test]
    async fn test_file_store_remove_many_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileKeyValueStore::open(temp_dir.path().join("kv.json"))
            .await
            .unwrap();

        for i in 0..4 {
            store.set(&format!("@backup:{}", i), "{}").await.unwrap();
        }
        store
            .remove_many(&["@backup:0".to_string(), "@backup:1".to_string()])
            .await
            .unwrap();
        assert_eq!(
            store.list_keys().await.unwrap(),
            vec!["@backup:2".to_string(), "@backup:3".to_string()]
        );

        store.clear().await.unwrap();
        assert!(store.list_keys().await.unwrap().is_empty());
        assert_eq!(store.backend_type(), "file");
    }
}
