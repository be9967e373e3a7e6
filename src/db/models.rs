//! Row structs for the `appliances` and `settings` tables and the mapping
//! between rows and domain values.
//!
//! This is the only place that sees `usage_days` in its serialized column
//! form; everything above gets a decoded [`UsageDays`].

use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::models::appliance::{Appliance, ApplianceId, AppliancePatch, NewAppliance, UsageDays, UsageDaysError};
use crate::schema;

pub mod setting_keys {
    pub const RATE_PER_KWH: &str = "rate_per_kwh";
    pub const CURRENCY: &str = "currency";
    pub const TIME_OF_USE_ENABLED: &str = "time_of_use_enabled";

    /// Rows present in a fresh database.
    pub const DEFAULTS: [(&str, &str); 3] = [
        (RATE_PER_KWH, "0.12"),
        (CURRENCY, "USD"),
        (TIME_OF_USE_ENABLED, "false"),
    ];
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = schema::appliances)]
pub struct ApplianceRow {
    pub id: i64,
    pub name: String,
    pub power_watts: f64,
    pub daily_hours: f64,
    pub usage_days: String,
    pub standby_watts: f64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = schema::appliances)]
pub struct NewApplianceRow {
    pub name: String,
    pub power_watts: f64,
    pub daily_hours: f64,
    pub usage_days: String,
    pub standby_watts: f64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Only `Some` fields are written; `updated_at` is always written.
#[derive(Debug, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = schema::appliances)]
pub struct ApplianceChangeset {
    pub name: Option<String>,
    pub power_watts: Option<f64>,
    pub daily_hours: Option<f64>,
    pub usage_days: Option<String>,
    pub standby_watts: Option<f64>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = schema::settings)]
pub struct SettingRow {
    pub key: String,
    pub value: String,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = schema::settings)]
pub struct NewSettingRow<'a> {
    pub key: &'a str,
    pub value: &'a str,
    pub updated_at: NaiveDateTime,
}

impl NewApplianceRow {
    pub fn new(appliance: &NewAppliance, now: DateTime<Utc>) -> Self {
        NewApplianceRow {
            name: appliance.name.clone(),
            power_watts: appliance.power_watts,
            daily_hours: appliance.daily_hours,
            usage_days: appliance.usage_days.encode(),
            standby_watts: appliance.standby_watts,
            created_at: now.naive_utc(),
            updated_at: now.naive_utc(),
        }
    }
}

impl ApplianceChangeset {
    pub fn new(patch: &AppliancePatch, updated_at: DateTime<Utc>) -> Self {
        ApplianceChangeset {
            name: patch.name.clone(),
            power_watts: patch.power_watts,
            daily_hours: patch.daily_hours,
            usage_days: patch.usage_days.as_ref().map(UsageDays::encode),
            standby_watts: patch.standby_watts,
            updated_at: updated_at.naive_utc(),
        }
    }

    /// Apply to an in-memory row the way `UPDATE ... SET` would.
    pub fn apply_to(&self, row: &mut ApplianceRow) {
        if let Some(name) = &self.name {
            row.name = name.clone();
        }
        if let Some(v) = self.power_watts {
            row.power_watts = v;
        }
        if let Some(v) = self.daily_hours {
            row.daily_hours = v;
        }
        if let Some(days) = &self.usage_days {
            row.usage_days = days.clone();
        }
        if let Some(v) = self.standby_watts {
            row.standby_watts = v;
        }
        row.updated_at = self.updated_at;
    }
}

impl TryFrom<ApplianceRow> for Appliance {
    type Error = UsageDaysError;

    fn try_from(row: ApplianceRow) -> Result<Self, Self::Error> {
        Ok(Appliance {
            id: ApplianceId(row.id),
            name: row.name,
            power_watts: row.power_watts,
            daily_hours: row.daily_hours,
            usage_days: UsageDays::decode(&row.usage_days)?,
            standby_watts: row.standby_watts,
            created_at: row.created_at.and_utc(),
            updated_at: row.updated_at.and_utc(),
        })
    }
}
