use crate::db::models::{setting_keys, SettingRow};
use crate::db::storage::Storage;
use crate::error::ServiceError;
use chrono::Utc;
use log::info;

fn check_key(key: &str) -> Result<(), ServiceError> {
    if setting_keys::DEFAULTS.iter().any(|(known, _)| *known == key) {
        Ok(())
    } else {
        Err(ServiceError::validation(
            "key",
            format!("Unknown setting '{}' (expected rate_per_kwh, currency or time_of_use_enabled)", key),
        ))
    }
}

fn parse_rate(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|r| r.is_finite() && *r > 0.0)
}

/// Returns the normalized form to store.
fn check_value(key: &str, value: &str) -> Result<String, ServiceError> {
    match key {
        setting_keys::RATE_PER_KWH => parse_rate(value)
            .map(|r| r.to_string())
            .ok_or_else(|| ServiceError::validation("value", "Rate per kWh must be positive")),
        setting_keys::TIME_OF_USE_ENABLED => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok("true".to_string()),
            "false" | "0" => Ok("false".to_string()),
            _ => Err(ServiceError::validation("value", "time_of_use_enabled must be true or false")),
        },
        _ => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Err(ServiceError::validation("value", "Currency must be a non-empty string"))
            } else {
                Ok(trimmed.to_uppercase())
            }
        }
    }
}

pub struct Settings<'a> {
    store: &'a mut dyn Storage,
}

impl<'a> Settings<'a> {
    pub fn new(store: &'a mut dyn Storage) -> Self {
        Settings { store }
    }

    pub fn list(&mut self) -> Result<Vec<SettingRow>, ServiceError> {
        self.store
            .select_settings()
            .map_err(|e| ServiceError::database("Failed to retrieve settings", e))
    }

    pub fn get(&mut self, key: &str) -> Result<SettingRow, ServiceError> {
        check_key(key)?;
        self.store
            .select_setting(key)
            .map_err(|e| ServiceError::database("Failed to retrieve setting", e))?
            .ok_or_else(|| ServiceError::validation("key", format!("Setting '{}' is not set", key)))
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<SettingRow, ServiceError> {
        check_key(key)?;
        let value = check_value(key, value)?;
        self.store
            .upsert_setting(key, &value, Utc::now())
            .map_err(|e| ServiceError::database("Failed to update setting", e))?;
        info!("Setting {} = {}", key, value);
        self.get(key)
    }

    /// Stored electricity rate; falls back to the seeded default when the
    /// row is missing or unusable.
    pub fn rate_per_kwh(&mut self) -> Result<f64, ServiceError> {
        let fallback = setting_keys::DEFAULTS
            .iter()
            .find(|(k, _)| *k == setting_keys::RATE_PER_KWH)
            .and_then(|(_, v)| parse_rate(v))
            .unwrap_or(0.12);
        let stored = self
            .store
            .select_setting(setting_keys::RATE_PER_KWH)
            .map_err(|e| ServiceError::database("Failed to retrieve setting", e))?;
        Ok(stored.and_then(|row| parse_rate(&row.value)).unwrap_or(fallback))
    }
}
