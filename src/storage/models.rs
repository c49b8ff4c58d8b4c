//! Data models for capacity readings and backup snapshots

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::adapters::{AdapterError, AdapterResult, Row, SqlValue};

/// Key prefix reserved for backup snapshots
pub const BACKUP_KEY_PREFIX: &str = "@backup:";

/// Snapshot format version written into every backup
pub const BACKUP_FORMAT_VERSION: &str = "1.0.0";

/// Data type name of the key-value section
pub const DATA_TYPE_KEY_VALUE: &str = "keyValueStore";

/// Data type name of the relational section
pub const DATA_TYPE_RELATIONAL: &str = "relationalStore";

/// Build the backup key for a timestamp
pub fn backup_key(timestamp: i64) -> String {
    format!("{}{}", BACKUP_KEY_PREFIX, timestamp)
}

/// Whether `key` lives in the backup namespace
pub fn is_backup_key(key: &str) -> bool {
    key.starts_with(BACKUP_KEY_PREFIX)
}

/// Parse the timestamp suffix of a backup key.
///
/// Only canonical suffixes parse: `@backup:007` and `@backup:+5` are `None`
/// because [`backup_key`] would never produce them.
pub fn parse_backup_timestamp(key: &str) -> Option<i64> {
    let timestamp: i64 = key.strip_prefix(BACKUP_KEY_PREFIX)?.parse().ok()?;
    (backup_key(timestamp) == key).then_some(timestamp)
}

/// Point-in-time capacity reading of the storage medium
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    /// Capacity of the medium in bytes
    pub total_space: u64,
    /// Bytes available to the application
    pub free_space: u64,
    /// `total_space - free_space`
    pub used_space: u64,
}

impl StorageStats {
    /// Build a reading from total and free bytes
    pub fn new(total_space: u64, free_space: u64) -> Self {
        Self {
            total_space,
            free_space,
            used_space: total_space.saturating_sub(free_space),
        }
    }

    /// Used share of the medium, always derived from `used_space / total_space`
    pub fn used_percentage(&self) -> f64 {
        if self.total_space == 0 {
            return 0.0;
        }
        self.used_space as f64 / self.total_space as f64 * 100.0
    }
}

/// Descriptor of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    /// Epoch milliseconds, unique per backup
    pub timestamp: i64,
    /// Snapshot format version
    pub version: String,
    /// Sections included in the snapshot
    pub data_types: Vec<String>,
    /// Serialized payload size in bytes
    pub size: u64,
    /// SHA-256 of the serialized payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Contents of the key-value store at backup time.
///
/// Backup keys are dropped on construction and on deserialization, so a
/// snapshot never carries other backups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct KeyValueSnapshot {
    entries: BTreeMap<String, String>,
}

impl KeyValueSnapshot {
    /// Empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored under `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.entries.iter()
    }

    /// Entries as owned pairs, ready for a batched write
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl From<BTreeMap<String, String>> for KeyValueSnapshot {
    fn from(mut entries: BTreeMap<String, String>) -> Self {
        entries.retain(|key, _| !is_backup_key(key));
        Self { entries }
    }
}

impl From<KeyValueSnapshot> for BTreeMap<String, String> {
    fn from(snapshot: KeyValueSnapshot) -> Self {
        snapshot.entries
    }
}

impl FromIterator<(String, String)> for KeyValueSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        BTreeMap::from_iter(iter).into()
    }
}

/// One row of the `tasks` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRow {
    /// Primary key
    pub id: String,
    /// Task text
    pub description: String,
    /// `1` when done, `0` otherwise
    pub completed: i64,
    /// Creation time, epoch milliseconds
    pub created_at: i64,
    #[serde(default)]
    /// Completion time, epoch milliseconds
    pub completed_at: Option<i64>,
}

impl TaskRow {
    /// Every row, ordered by id
    pub const SELECT_ALL: &'static str =
        "SELECT id, description, completed, created_at, completed_at FROM tasks ORDER BY id";
    /// Remove every row
    pub const DELETE_ALL: &'static str = "DELETE FROM tasks";
    /// Insert one row; see [`TaskRow::insert_params`]
    pub const INSERT: &'static str = "INSERT INTO tasks (id, description, completed, created_at, completed_at) VALUES (?1, ?2, ?3, ?4, ?5)";

    /// Decode a row returned by [`TaskRow::SELECT_ALL`]
    pub fn from_row(row: &Row) -> AdapterResult<Self> {
        let text = |column: &str| -> AdapterResult<String> {
            row.get(column)
                .and_then(SqlValue::as_str)
                .map(str::to_string)
                .ok_or_else(|| bad_column(column))
        };
        let integer = |column: &str| -> AdapterResult<i64> {
            row.get(column)
                .and_then(SqlValue::as_i64)
                .ok_or_else(|| bad_column(column))
        };

        let completed_at = match row.get("completed_at") {
            None | Some(SqlValue::Null) => None,
            Some(SqlValue::Integer(v)) => Some(*v),
            Some(_) => return Err(bad_column("completed_at")),
        };

        Ok(Self {
            id: text("id")?,
            description: text("description")?,
            completed: integer("completed")?,
            created_at: integer("created_at")?,
            completed_at,
        })
    }

    /// Positional parameters for [`TaskRow::INSERT`]
    pub fn insert_params(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::from(self.id.as_str()),
            SqlValue::from(self.description.as_str()),
            SqlValue::from(self.completed),
            SqlValue::from(self.created_at),
            SqlValue::from(self.completed_at),
        ]
    }
}

fn bad_column(column: &str) -> AdapterError {
    AdapterError::Deserialization(format!("tasks.{} is missing or has the wrong type", column))
}

/// Rows of every tracked relational table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationalSnapshot {
    #[serde(default)]
    /// Rows of the `tasks` table
    pub tasks: Vec<TaskRow>,
}

impl RelationalSnapshot {
    /// Total rows across tracked tables
    pub fn row_count(&self) -> usize {
        self.tasks.len()
    }
}

/// A full snapshot of both stores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupData {
    /// Snapshot description
    pub metadata: BackupMetadata,
    /// Key-value entries, backups excluded
    pub async_storage_data: KeyValueSnapshot,
    /// Relational rows
    pub database_data: RelationalSnapshot,
}

/// The part of a backup covered by `size` and `checksum`
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotPayload<'a> {
    async_storage_data: &'a KeyValueSnapshot,
    database_data: &'a RelationalSnapshot,
}

/// Serialized size and SHA-256 hex digest of the snapshot payload
pub(crate) fn payload_digest(
    key_value: &KeyValueSnapshot,
    relational: &RelationalSnapshot,
) -> serde_json::Result<(u64, String)> {
    let bytes = serde_json::to_vec(&SnapshotPayload {
        async_storage_data: key_value,
        database_data: relational,
    })?;
    Ok((bytes.len() as u64, format!("{:x}", Sha256::digest(&bytes))))
}

impl BackupData {
    /// Assemble a snapshot, computing size and checksum
    pub fn assemble(
        timestamp: i64,
        async_storage_data: KeyValueSnapshot,
        database_data: RelationalSnapshot,
    ) -> serde_json::Result<Self> {
        let (size, checksum) = payload_digest(&async_storage_data, &database_data)?;
        Ok(Self {
            metadata: BackupMetadata {
                timestamp,
                version: BACKUP_FORMAT_VERSION.to_string(),
                data_types: vec![
                    DATA_TYPE_KEY_VALUE.to_string(),
                    DATA_TYPE_RELATIONAL.to_string(),
                ],
                size,
                checksum: Some(checksum),
            },
            async_storage_data,
            database_data,
        })
    }

    /// Key this snapshot is stored under
    pub fn key(&self) -> String {
        backup_key(self.metadata.timestamp)
    }

    /// Check the recorded checksum; snapshots without one are accepted
    pub fn verify_checksum(&self) -> serde_json::Result<bool> {
        match &self.metadata.checksum {
            Some(expected) => {
                let (_, actual) = payload_digest(&self.async_storage_data, &self.database_data)?;
                Ok(&actual == expected)
            }
            None => Ok(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> TaskRow {
        TaskRow {
            id: "t1".to_string(),
            description: "buy milk".to_string(),
            completed: 0,
            created_at: 1000,
            completed_at: None,
        }
    }

    #[test]
    fn test_backup_key_helpers() {
        assert_eq!(backup_key(1700000000000), "@backup:1700000000000");
        assert_eq!(parse_backup_timestamp("@backup:42"), Some(42));
        assert_eq!(parse_backup_timestamp("@backup:latest"), None);
        assert_eq!(parse_backup_timestamp("@app:language"), None);
        assert_eq!(parse_backup_timestamp("@backup:007"), None);
        assert_eq!(parse_backup_timestamp("@backup:+5"), None);
        assert_eq!(parse_backup_timestamp("@backup:-5"), Some(-5));
        assert!(is_backup_key("@backup:"));
        assert!(!is_backup_key("@sticky_note:1"));
    }

    #[test]
    fn test_used_percentage_is_derived() {
        let stats = StorageStats::new(200, 50);
        assert_eq!(stats.used_space, 150);
        assert!((stats.used_percentage() - 75.0).abs() < f64::EPSILON);

        let empty = StorageStats::new(0, 0);
        assert_eq!(empty.used_percentage(), 0.0);

        let json = serde_json::to_value(stats).unwrap();
        assert!(json.get("usedPercentage").is_none());
    }

    #[test]
    fn test_key_value_snapshot_drops_backup_keys() {
        let snapshot: KeyValueSnapshot = vec![
            ("@app:language".to_string(), "es".to_string()),
            ("@backup:1".to_string(), "{}".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("@app:language"), Some("es"));

        let parsed: KeyValueSnapshot =
            serde_json::from_str(r#"{"@backup:9":"{}","@voice_notes:index":"[]"}"#).unwrap();
        assert_eq!(parsed.len(), 1);
        assert!(parsed.get("@backup:9").is_none());
    }

    #[test]
    fn test_task_row_decoding() {
        let mut row = Row::new();
        row.insert("id".into(), SqlValue::from("t1"));
        row.insert("description".into(), SqlValue::from("buy milk"));
        row.insert("completed".into(), SqlValue::from(0i64));
        row.insert("created_at".into(), SqlValue::from(1000i64));
        row.insert("completed_at".into(), SqlValue::Null);
        assert_eq!(TaskRow::from_row(&row).unwrap(), sample_task());

        row.insert("completed".into(), SqlValue::from("no"));
        assert!(matches!(
            TaskRow::from_row(&row),
            Err(AdapterError::Deserialization(_))
        ));
    }

    #[test]
    fn test_backup_json_shape() {
        let kv: KeyValueSnapshot = [("@app:language".to_string(), "es".to_string())]
            .into_iter()
            .collect();
        let db = RelationalSnapshot {
            tasks: vec![sample_task()],
        };
        let backup = BackupData::assemble(1000, kv, db).unwrap();

        let json = serde_json::to_value(&backup).unwrap();
        assert_eq!(json["metadata"]["version"], "1.0.0");
        assert_eq!(
            json["metadata"]["dataTypes"],
            serde_json::json!(["keyValueStore", "relationalStore"])
        );
        assert_eq!(json["asyncStorageData"]["@app:language"], "es");
        assert!(json["databaseData"]["tasks"][0]["completed_at"].is_null());
        assert_eq!(backup.key(), "@backup:1000");
        assert!(backup.metadata.size > 0);
    }

    #[test]
    fn test_checksum_detects_tampering() {
        let backup = BackupData::assemble(
            5,
            KeyValueSnapshot::new(),
            RelationalSnapshot {
                tasks: vec![sample_task()],
            },
        )
        .unwrap();
        assert!(backup.verify_checksum().unwrap());

        let mut tampered = backup.clone();
        tampered.database_data.tasks[0].description = "buy oat milk".to_string();
        assert!(!tampered.verify_checksum().unwrap());

        let mut legacy = backup;
        legacy.metadata.checksum = None;
        assert!(legacy.verify_checksum().unwrap());
    }
}
