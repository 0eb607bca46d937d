use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};

use super::domain::{record_timestamp, AppealId, AppealRecord, NewAppeal};

/// Storage abstraction for the system of record. Appeals are written once and
/// only read afterwards.
pub trait AppealRepository: Send + Sync {
    /// Persists a validated appeal, assigning its identifier and creation timestamp.
    fn insert(&self, appeal: NewAppeal) -> Result<AppealRecord, RepositoryError>;
    fn fetch(&self, id: &AppealId) -> Result<Option<AppealRecord>, RepositoryError>;
    fn count(&self) -> Result<usize, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("stored appeal could not be decoded: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Unavailable(value.to_string())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryAppealRepository {
    records: Arc<Mutex<HashMap<AppealId, AppealRecord>>>,
}

impl InMemoryAppealRepository {
    pub fn records(&self) -> Vec<AppealRecord> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut records: Vec<AppealRecord> = guard.values().cloned().collect();
        records.sort_by_key(|record| record.timestamp);
        records
    }
}

impl AppealRepository for InMemoryAppealRepository {
    fn insert(&self, appeal: NewAppeal) -> Result<AppealRecord, RepositoryError> {
        let record = appeal.into_record(AppealId::generate(), record_timestamp());
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &AppealId) -> Result<Option<AppealRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn count(&self) -> Result<usize, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.len())
    }
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS disability_appeals (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    document TEXT NOT NULL
)";

/// SQLite-backed store keeping each appeal as a JSON document.
pub struct SqliteAppealRepository {
    connection: Mutex<Connection>,
}

impl SqliteAppealRepository {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    /// Opens `:memory:` as an ephemeral database and anything else as a file path.
    pub fn from_location(location: &str) -> Result<Self, RepositoryError> {
        if location == ":memory:" {
            Self::open_in_memory()
        } else {
            Self::open(location)
        }
    }

    fn with_connection(connection: Connection) -> Result<Self, RepositoryError> {
        connection.execute_batch(SCHEMA)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn connection(&self) -> Result<std::sync::MutexGuard<'_, Connection>, RepositoryError> {
        self.connection
            .lock()
            .map_err(|_| RepositoryError::Unavailable("connection mutex poisoned".to_string()))
    }
}

impl AppealRepository for SqliteAppealRepository {
    fn insert(&self, appeal: NewAppeal) -> Result<AppealRecord, RepositoryError> {
        let record = appeal.into_record(AppealId::generate(), record_timestamp());
        let document = serde_json::to_string(&record)?;

        let connection = self.connection()?;
        let inserted = connection.execute(
            "INSERT OR IGNORE INTO disability_appeals (id, created_at, document) VALUES (?1, ?2, ?3)",
            params![record.id.0, record.timestamp.to_rfc3339(), document],
        )?;
        if inserted == 0 {
            return Err(RepositoryError::Conflict);
        }

        Ok(record)
    }

    fn fetch(&self, id: &AppealId) -> Result<Option<AppealRecord>, RepositoryError> {
        let connection = self.connection()?;
        let document: Option<String> = connection
            .query_row(
                "SELECT document FROM disability_appeals WHERE id = ?1",
                params![id.0],
                |row| row.get(0),
            )
            .optional()?;

        match document {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn count(&self) -> Result<usize, RepositoryError> {
        let connection = self.connection()?;
        let total: i64 =
            connection.query_row("SELECT COUNT(*) FROM disability_appeals", [], |row| {
                row.get(0)
            })?;
        Ok(usize::try_from(total).unwrap_or_default())
    }
}
