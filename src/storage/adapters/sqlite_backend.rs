//! SQLite relational store.

use async_trait::async_trait;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode, ToSql};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::traits::{AdapterError, AdapterResult, RelationalStore, Row, SqlValue};

/// Schema for the tables this system tracks
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    completed INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    completed_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at);
"#;

/// Relational store backed by a single SQLite database
pub struct SqliteRelationalStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>, // None for in-memory databases
}

impl SqliteRelationalStore {
    /// Open (or create) a database file
    pub fn open(db_path: &Path) -> AdapterResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        debug!("Opened SQLite database at {}", db_path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(db_path.to_path_buf()),
        })
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> AdapterResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Database file, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Move the database file and its journal sidecars out of the way.
    /// Returns where the database file went.
    fn quarantine(path: &Path) -> AdapterResult<Option<PathBuf>> {
        for sidecar in ["-wal", "-shm", "-journal"] {
            let sidecar = with_suffix(path, sidecar);
            if sidecar.exists() {
                std::fs::remove_file(&sidecar)?;
            }
        }
        if !path.exists() {
            return Ok(None);
        }

        let aside = with_suffix(
            path,
            &format!(".corrupt-{}", chrono::Utc::now().timestamp_millis()),
        );
        std::fs::rename(path, &aside)?;
        Ok(Some(aside))
    }

    fn lock(&self) -> AdapterResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| AdapterError::Backend(format!("Failed to lock database: {}", e)))
    }
}

#[async_trait]
impl RelationalStore for SqliteRelationalStore {
    fn backend_type(&self) -> &'static str {
        "sqlite"
    }

    async fn initialize_schema(&self) -> AdapterResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA)?;

        let verdict: String = conn.query_row("PRAGMA quick_check", [], |row| row.get(0))?;
        if verdict != "ok" {
            return Err(AdapterError::Corrupted(format!(
                "quick_check reported: {}",
                verdict
            )));
        }

        info!("Relational schema initialized");
        Ok(())
    }

    async fn execute(&self, statement: &str, params: &[SqlValue]) -> AdapterResult<Vec<Row>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(statement)?;

        if stmt.column_count() == 0 {
            stmt.execute(params_from_iter(params.iter()))?;
            return Ok(Vec::new());
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut out = Vec::new();

        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (index, column) in columns.iter().enumerate() {
                record.insert(column.clone(), sql_value_from_ref(row.get_ref(index)?)?);
            }
            out.push(record);
        }

        Ok(out)
    }

    async fn reset_store(&self) -> AdapterResult<()> {
        let mut conn = self.lock()?;

        let fresh = match &self.path {
            Some(path) => {
                // Close the damaged file before moving it
                drop(std::mem::replace(&mut *conn, Connection::open_in_memory()?));
                if let Some(aside) = Self::quarantine(path)? {
                    warn!("Moved damaged database aside to {}", aside.display());
                }
                Connection::open(path)?
            }
            None => Connection::open_in_memory()?,
        };
        fresh.execute_batch(SCHEMA)?;
        *conn = fresh;

        info!("Relational store reset to an empty schema");
        Ok(())
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn sql_value_from_ref(value: ValueRef<'_>) -> AdapterResult<SqlValue> {
    match value {
        ValueRef::Null => Ok(SqlValue::Null),
        ValueRef::Integer(v) => Ok(SqlValue::Integer(v)),
        ValueRef::Real(v) => Ok(SqlValue::Real(v)),
        ValueRef::Text(bytes) => String::from_utf8(bytes.to_vec())
            .map(SqlValue::Text)
            .map_err(|e| AdapterError::Deserialization(format!("invalid UTF-8 text: {}", e))),
        ValueRef::Blob(_) => Err(AdapterError::Deserialization(
            "blob columns are not supported".to_string(),
        )),
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            SqlValue::Real(v) => ToSqlOutput::Owned(Value::Real(*v)),
            SqlValue::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
        })
    }
}

impl From<rusqlite::Error> for AdapterError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::PermissionDenied | ErrorCode::ReadOnly | ErrorCode::CannotOpen => {
                    AdapterError::PermissionDenied(err.to_string())
                }
                ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase => {
                    AdapterError::Corrupted(err.to_string())
                }
                _ => AdapterError::Backend(err.to_string()),
            },
            _ => AdapterError::Backend(err.to_string()),
        }
    }
}
