//! SQLite backend through diesel. Schema comes from the embedded migrations,
//! applied when the connection is opened.

use chrono::{DateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::BigInt;
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::{debug, info};

use crate::db::models::{ApplianceChangeset, ApplianceRow, NewApplianceRow, NewSettingRow, SettingRow};
use crate::db::storage::{RunResult, Storage, StorageBackend, StorageError};
use crate::schema;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

fn apply_database_migrations(conn: &mut SqliteConnection) -> Result<(), StorageError> {
    match conn.run_pending_migrations(MIGRATIONS) {
        Ok(applied) => {
            if applied.is_empty() {
                info!("Database schema is up to date; no migrations were applied");
            } else {
                let names = applied.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
                info!("Applied {} database migration(s): {}", applied.len(), names);
            }
            Ok(())
        }
        Err(e) => Err(StorageError::Migration(e.to_string())),
    }
}

pub struct SqliteStorage {
    conn: Option<SqliteConnection>,
}

impl SqliteStorage {
    /// `database_url` is a file path or `:memory:`.
    pub fn open(database_url: &str) -> Result<Self, StorageError> {
        let mut conn = SqliteConnection::establish(database_url)
            .map_err(|e| StorageError::Connection(format!("{}: {}", database_url, e)))?;
        conn.batch_execute("PRAGMA busy_timeout = 5000;")?;
        apply_database_migrations(&mut conn)?;
        debug!("Opened SQLite database at {}", database_url);
        Ok(SqliteStorage { conn: Some(conn) })
    }

    fn conn(&mut self) -> Result<&mut SqliteConnection, StorageError> {
        self.conn.as_mut().ok_or(StorageError::Closed)
    }
}

impl Storage for SqliteStorage {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Sqlite
    }

    fn select_appliances(&mut self) -> Result<Vec<ApplianceRow>, StorageError> {
        use schema::appliances::dsl as A;

        let rows = A::appliances
            .order((A::created_at.desc(), A::id.desc()))
            .select(ApplianceRow::as_select())
            .load(self.conn()?)?;
        Ok(rows)
    }

    fn select_appliance(&mut self, id: i64) -> Result<Option<ApplianceRow>, StorageError> {
        use schema::appliances::dsl as A;

        let row = A::appliances
            .find(id)
            .select(ApplianceRow::as_select())
            .first(self.conn()?)
            .optional()?;
        Ok(row)
    }

    fn insert_appliance(&mut self, row: &NewApplianceRow) -> Result<RunResult, StorageError> {
        use schema::appliances::dsl as A;

        let result = self.conn()?.transaction::<_, diesel::result::Error, _>(|conn| {
            let changes = diesel::insert_into(A::appliances).values(row).execute(conn)?;
            let last_insert_rowid = diesel::select(sql::<BigInt>("last_insert_rowid()")).get_result::<i64>(conn)?;
            Ok(RunResult {
                last_insert_rowid,
                changes,
            })
        })?;
        Ok(result)
    }

    fn update_appliance(&mut self, id: i64, changes: &ApplianceChangeset) -> Result<RunResult, StorageError> {
        use schema::appliances::dsl as A;

        let changes = diesel::update(A::appliances.find(id)).set(changes).execute(self.conn()?)?;
        Ok(RunResult {
            last_insert_rowid: 0,
            changes,
        })
    }

    fn delete_appliance(&mut self, id: i64) -> Result<RunResult, StorageError> {
        use schema::appliances::dsl as A;

        let changes = diesel::delete(A::appliances.find(id)).execute(self.conn()?)?;
        Ok(RunResult {
            last_insert_rowid: 0,
            changes,
        })
    }

    fn select_settings(&mut self) -> Result<Vec<SettingRow>, StorageError> {
        use schema::settings::dsl as S;

        let rows = S::settings
            .order(S::key.asc())
            .select(SettingRow::as_select())
            .load(self.conn()?)?;
        Ok(rows)
    }

    fn select_setting(&mut self, key: &str) -> Result<Option<SettingRow>, StorageError> {
        use schema::settings::dsl as S;

        let row = S::settings
            .find(key)
            .select(SettingRow::as_select())
            .first(self.conn()?)
            .optional()?;
        Ok(row)
    }

    fn upsert_setting(&mut self, key: &str, value: &str, now: DateTime<Utc>) -> Result<RunResult, StorageError> {
        use schema::settings::dsl as S;

        let new_row = NewSettingRow {
            key,
            value,
            updated_at: now.naive_utc(),
        };
        let changes = diesel::insert_into(S::settings)
            .values(&new_row)
            .on_conflict(S::key)
            .do_update()
            .set((S::value.eq(value), S::updated_at.eq(new_row.updated_at)))
            .execute(self.conn()?)?;
        Ok(RunResult {
            last_insert_rowid: 0,
            changes,
        })
    }

    fn close(&mut self) -> Result<(), StorageError> {
        if self.conn.take().is_some() {
            debug!("Closed SQLite connection");
        }
        Ok(())
    }
}
