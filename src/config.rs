//! Minimal runtime configuration helpers.
//! Defaults give a local SQLite file next to the working directory.

use crate::db::storage::StorageBackend;

pub const DEFAULT_DATABASE_URL: &str = "household-power.db";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub storage_backend: StorageBackend,
    /// SQLite file path, or `:memory:`. Unused by the memory backend.
    pub database_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let storage_backend = match lookup("STORAGE_BACKEND") {
            Some(s) if !s.trim().is_empty() => s
                .parse::<StorageBackend>()
                .map_err(|e| format!("STORAGE_BACKEND: {}", e))?,
            _ => StorageBackend::Sqlite,
        };

        let database_url = match lookup("DATABASE_URL") {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => DEFAULT_DATABASE_URL.to_string(),
        };

        Ok(Config {
            storage_backend,
            database_url,
        })
    }
}
