//! Read-only reachability probes against both stores

use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use super::adapters::{KeyValueStore, RelationalStore};

/// Outcome of one integrity probe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// The key-value store listed its keys
    pub key_value_ok: bool,
    /// The relational store answered `SELECT 1`
    pub relational_ok: bool,
    /// One line per failed probe
    pub problems: Vec<String>,
}

impl IntegrityReport {
    /// Both stores answered
    pub fn is_healthy(&self) -> bool {
        self.key_value_ok && self.relational_ok
    }
}

/// Verifies both stores are reachable
pub struct IntegrityChecker {
    kv: Arc<dyn KeyValueStore>,
    db: Arc<dyn RelationalStore>,
}

impl IntegrityChecker {
    /// Create a checker over both stores
    pub fn new(kv: Arc<dyn KeyValueStore>, db: Arc<dyn RelationalStore>) -> Self {
        Self { kv, db }
    }

    /// Probe both stores. Never fails; problems are reported in the result.
    pub async fn check(&self) -> IntegrityReport {
        let mut report = IntegrityReport::default();

        match self.kv.list_keys().await {
            Ok(_) => report.key_value_ok = true,
            Err(e) => {
                warn!("Key-value store probe failed: {}", e);
                report.problems.push(format!("key-value store: {}", e));
            }
        }

        match self.db.execute("SELECT 1", &[]).await {
            Ok(_) => report.relational_ok = true,
            Err(e) => {
                warn!("Relational store probe failed: {}", e);
                report.problems.push(format!("relational store: {}", e));
            }
        }

        report
    }

    /// `true` only when both probes succeed
    pub async fn verify_data_integrity(&self) -> bool {
        self.check().await.is_healthy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::adapters::{AdapterError, AdapterResult, MemoryKeyValueStore, Row, SqlValue};
    use async_trait::async_trait;

    struct StubDb {
        healthy: bool,
    }

    #[async_trait]
    impl RelationalStore for StubDb {
        fn backend_type(&self) -> &'static str {
            "stub"
        }

        async fn initialize_schema(&self) -> AdapterResult<()> {
            Ok(())
        }

        async fn execute(&self, _statement: &str, _params: &[SqlValue]) -> AdapterResult<Vec<Row>> {
            if self.healthy {
                Ok(vec![Row::new()])
            } else {
                Err(AdapterError::Backend("database is locked".to_string()))
            }
        }
    }

    #[tokio::test]
    async fn test_healthy_stores() {
        let checker = IntegrityChecker::new(
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(StubDb { healthy: true }),
        );
        assert!(checker.verify_data_integrity().await);
    }

    #[tokio::test]
    async fn test_failing_probe_becomes_false() {
        let checker = IntegrityChecker::new(
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(StubDb { healthy: false }),
        );

        let report = checker.check().await;
        assert!(report.key_value_ok);
        assert!(!report.relational_ok);
        assert_eq!(report.problems.len(), 1);
        assert!(!checker.verify_data_integrity().await);
    }
}
