//! In-process storage double.
//!
//! Keeps rows in their serialized column form and enforces the same column
//! checks as the SQLite migrations, so repository behavior does not depend
//! on which backend is configured.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::db::models::{setting_keys, ApplianceChangeset, ApplianceRow, NewApplianceRow, SettingRow};
use crate::db::storage::{RunResult, Storage, StorageBackend, StorageError};

#[derive(Debug)]
pub struct MemoryStorage {
    appliances: BTreeMap<i64, ApplianceRow>,
    settings: BTreeMap<String, SettingRow>,
    // AUTOINCREMENT semantics: ids are never reused
    last_id: i64,
    closed: bool,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        let now = Utc::now().naive_utc();
        let settings = setting_keys::DEFAULTS
            .iter()
            .map(|(key, value)| {
                (
                    key.to_string(),
                    SettingRow {
                        key: key.to_string(),
                        value: value.to_string(),
                        updated_at: now,
                    },
                )
            })
            .collect();
        MemoryStorage {
            appliances: BTreeMap::new(),
            settings,
            last_id: 0,
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed { Err(StorageError::Closed) } else { Ok(()) }
    }
}

fn check_range(column: &str, value: f64, min: f64, max: f64) -> Result<(), StorageError> {
    // written so NaN fails too
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(StorageError::Constraint(format!("CHECK constraint failed: {}", column)))
    }
}

fn check_row(row: &ApplianceRow) -> Result<(), StorageError> {
    let name_len = row.name.chars().count();
    if !(1..=600).contains(&name_len) {
        return Err(StorageError::Constraint("CHECK constraint failed: name".to_string()));
    }
    check_range("power_watts", row.power_watts, 0.1, 10_000.0)?;
    check_range("daily_hours", row.daily_hours, 0.0, 24.0)?;
    check_range("standby_watts", row.standby_watts, 0.0, 1_000.0)?;
    let days_ok = serde_json::from_str::<Vec<serde_json::Value>>(&row.usage_days)
        .map(|days| (1..=7).contains(&days.len()))
        .unwrap_or(false);
    if !days_ok {
        return Err(StorageError::Constraint("CHECK constraint failed: usage_days".to_string()));
    }
    if row.updated_at < row.created_at {
        return Err(StorageError::Constraint("CHECK constraint failed: updated_at".to_string()));
    }
    Ok(())
}

impl Storage for MemoryStorage {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Memory
    }

    fn select_appliances(&mut self) -> Result<Vec<ApplianceRow>, StorageError> {
        self.ensure_open()?;
        let mut rows = self.appliances.values().cloned().collect::<Vec<_>>();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    fn select_appliance(&mut self, id: i64) -> Result<Option<ApplianceRow>, StorageError> {
        self.ensure_open()?;
        Ok(self.appliances.get(&id).cloned())
    }

    fn insert_appliance(&mut self, row: &NewApplianceRow) -> Result<RunResult, StorageError> {
        self.ensure_open()?;
        let id = self.last_id + 1;
        let stored = ApplianceRow {
            id,
            name: row.name.clone(),
            power_watts: row.power_watts,
            daily_hours: row.daily_hours,
            usage_days: row.usage_days.clone(),
            standby_watts: row.standby_watts,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        check_row(&stored)?;
        self.appliances.insert(id, stored);
        self.last_id = id;
        Ok(RunResult {
            last_insert_rowid: id,
            changes: 1,
        })
    }

    fn update_appliance(&mut self, id: i64, changes: &ApplianceChangeset) -> Result<RunResult, StorageError> {
        self.ensure_open()?;
        let Some(current) = self.appliances.get(&id) else {
            return Ok(RunResult {
                last_insert_rowid: 0,
                changes: 0,
            });
        };
        // stage on a copy so a failed check leaves the row untouched
        let mut staged = current.clone();
        changes.apply_to(&mut staged);
        check_row(&staged)?;
        self.appliances.insert(id, staged);
        Ok(RunResult {
            last_insert_rowid: 0,
            changes: 1,
        })
    }

    fn delete_appliance(&mut self, id: i64) -> Result<RunResult, StorageError> {
        self.ensure_open()?;
        let changes = usize::from(self.appliances.remove(&id).is_some());
        Ok(RunResult {
            last_insert_rowid: 0,
            changes,
        })
    }

    fn select_settings(&mut self) -> Result<Vec<SettingRow>, StorageError> {
        self.ensure_open()?;
        Ok(self.settings.values().cloned().collect())
    }

    fn select_setting(&mut self, key: &str) -> Result<Option<SettingRow>, StorageError> {
        self.ensure_open()?;
        Ok(self.settings.get(key).cloned())
    }

    fn upsert_setting(&mut self, key: &str, value: &str, now: DateTime<Utc>) -> Result<RunResult, StorageError> {
        self.ensure_open()?;
        self.settings.insert(
            key.to_string(),
            SettingRow {
                key: key.to_string(),
                value: value.to_string(),
                updated_at: now.naive_utc(),
            },
        );
        Ok(RunResult {
            last_insert_rowid: 0,
            changes: 1,
        })
    }

    fn close(&mut self) -> Result<(), StorageError> {
        self.closed = true;
        Ok(())
    }
}
