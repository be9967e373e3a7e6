//! Storage collaborator contract.
//!
//! The repository talks to storage only through [`Storage`]: read calls
//! return rows, mutating calls return a [`RunResult`] with the new row id and
//! the number of rows changed. Two backends implement it and one is picked at
//! startup from configuration.

use chrono::{DateTime, Utc};
use core::fmt;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::db::memory::MemoryStorage;
use crate::db::models::{ApplianceChangeset, ApplianceRow, NewApplianceRow, SettingRow};
use crate::db::sqlite::SqliteStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    pub last_insert_rowid: i64,
    pub changes: usize,
}

#[derive(Debug)]
pub enum StorageError {
    /// Backend could not be opened
    Connection(String),
    /// Embedded schema migrations failed
    Migration(String),
    /// Statement failed inside the engine
    Query(diesel::result::Error),
    /// Row rejected by a column constraint
    Constraint(String),
    /// Handle used after `close`
    Closed,
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Connection(e) => write!(f, "connection failed: {}", e),
            StorageError::Migration(e) => write!(f, "migration failed: {}", e),
            StorageError::Query(e) => write!(f, "query failed: {}", e),
            StorageError::Constraint(e) => write!(f, "constraint violated: {}", e),
            StorageError::Closed => write!(f, "storage is closed"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StorageError::Query(e) => Some(e),
            _ => None,
        }
    }
}

impl From<diesel::result::Error> for StorageError {
    fn from(value: diesel::result::Error) -> Self {
        StorageError::Query(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

impl StorageBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageBackend::Sqlite => "sqlite",
            StorageBackend::Memory => "memory",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend '{}' (expected sqlite or memory)", other)),
        }
    }
}

pub trait Storage {
    fn backend(&self) -> StorageBackend;

    /// All appliances, newest `created_at` first, ties by descending id.
    fn select_appliances(&mut self) -> Result<Vec<ApplianceRow>, StorageError>;

    fn select_appliance(&mut self, id: i64) -> Result<Option<ApplianceRow>, StorageError>;

    fn insert_appliance(&mut self, row: &NewApplianceRow) -> Result<RunResult, StorageError>;

    fn update_appliance(&mut self, id: i64, changes: &ApplianceChangeset) -> Result<RunResult, StorageError>;

    fn delete_appliance(&mut self, id: i64) -> Result<RunResult, StorageError>;

    fn select_settings(&mut self) -> Result<Vec<SettingRow>, StorageError>;

    fn select_setting(&mut self, key: &str) -> Result<Option<SettingRow>, StorageError>;

    fn upsert_setting(&mut self, key: &str, value: &str, now: DateTime<Utc>) -> Result<RunResult, StorageError>;

    /// Release the backend. Later calls fail with [`StorageError::Closed`].
    fn close(&mut self) -> Result<(), StorageError>;
}

/// Open the configured backend. `database_url` is ignored for `memory`.
pub fn open(backend: StorageBackend, database_url: &str) -> Result<Box<dyn Storage>, StorageError> {
    match backend {
        StorageBackend::Sqlite => Ok(Box::new(SqliteStorage::open(database_url)?)),
        StorageBackend::Memory => Ok(Box::new(MemoryStorage::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_parse() {
        assert_eq!("sqlite".parse::<StorageBackend>(), Ok(StorageBackend::Sqlite));
        assert_eq!(" Memory ".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert!("postgres".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn open_selects_requested_backend() {
        let mem = open(StorageBackend::Memory, "ignored").unwrap();
        assert_eq!(mem.backend(), StorageBackend::Memory);
        let sqlite = open(StorageBackend::Sqlite, ":memory:").unwrap();
        assert_eq!(sqlite.backend(), StorageBackend::Sqlite);
    }

    #[test]
    fn closed_storage_refuses_work() {
        for backend in [StorageBackend::Memory, StorageBackend::Sqlite] {
            let mut store = open(backend, ":memory:").unwrap();
            store.close().unwrap();
            assert!(matches!(store.select_appliances(), Err(StorageError::Closed)));
        }
    }
}
