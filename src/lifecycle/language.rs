//! Locale bootstrap collaborator

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::storage::config::is_language_code;
use crate::storage::KeyValueStore;

/// Key holding the two-letter locale code
pub const LANGUAGE_KEY: &str = "@app:language";

/// Prepares the application's language before app data is initialized
#[async_trait]
pub trait LanguageBootstrap: Send + Sync {
    /// Resolve the active language code
    async fn initialize_language(&self) -> Result<String>;
}

/// Language stored under [`LANGUAGE_KEY`] in the key-value store.
///
/// Writes the default when nothing is stored. A stored value that is not a
/// two-letter lowercase code is an error and is left untouched.
pub struct StoredLanguage {
    kv: Arc<dyn KeyValueStore>,
    default_language: String,
}

impl StoredLanguage {
    /// Bootstrap over `kv`, writing `default_language` when none is stored
    pub fn new<S: Into<String>>(kv: Arc<dyn KeyValueStore>, default_language: S) -> Self {
        Self {
            kv,
            default_language: default_language.into(),
        }
    }
}

#[async_trait]
impl LanguageBootstrap for StoredLanguage {
    async fn initialize_language(&self) -> Result<String> {
        let stored = self
            .kv
            .get(LANGUAGE_KEY)
            .await
            .with_context(|| format!("Failed to read {}", LANGUAGE_KEY))?;

        match stored {
            Some(code) if is_language_code(&code) => {
                debug!("Using stored language '{}'", code);
                Ok(code)
            }
            Some(code) => bail!("Stored language '{}' is not a two-letter code", code),
            None => {
                if !is_language_code(&self.default_language) {
                    bail!(
                        "Default language '{}' is not a two-letter code",
                        self.default_language
                    );
                }
                self.kv
                    .set(LANGUAGE_KEY, &self.default_language)
                    .await
                    .with_context(|| format!("Failed to write {}", LANGUAGE_KEY))?;
                info!("No language stored, defaulting to '{}'", self.default_language);
                Ok(self.default_language.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKeyValueStore;

    #[tokio::test]
    async fn test_default_written_when_missing() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let language = StoredLanguage::new(kv.clone(), "en");

        assert_eq!(language.initialize_language().await.unwrap(), "en");
        assert_eq!(kv.get(LANGUAGE_KEY).await.unwrap().as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn test_stored_language_wins() {
        let kv = Arc::new(MemoryKeyValueStore::with_entries([(LANGUAGE_KEY, "es")]));
        let language = StoredLanguage::new(kv, "en");
        assert_eq!(language.initialize_language().await.unwrap(), "es");
    }

    #[tokio::test]
    async fn test_invalid_stored_language_is_left_alone() {
        let kv = Arc::new(MemoryKeyValueStore::with_entries([(LANGUAGE_KEY, "Spanish")]));
        let language = StoredLanguage::new(kv.clone(), "en");

        let err = language.initialize_language().await.unwrap_err();
        assert!(err.to_string().contains("Spanish"));
        assert_eq!(
            kv.get(LANGUAGE_KEY).await.unwrap().as_deref(),
            Some("Spanish")
        );
    }
}
