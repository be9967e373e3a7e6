use crate::error::{ErrorKind, ServiceError};
use crate::models::appliance::Appliance;
use crate::services::consumption::{round_kwh, EnergyProfile};
use crate::utils::round_to;
use csv::Writer;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartMode {
    Daily,
    Weekly,
    Breakdown,
}

impl ChartMode {
    pub fn label(self) -> &'static str {
        match self {
            ChartMode::Daily => "Daily Consumption (kWh)",
            ChartMode::Weekly => "Weekly Consumption (kWh)",
            ChartMode::Breakdown => "Share of daily total (%)",
        }
    }
}

impl FromStr for ChartMode {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(ChartMode::Daily),
            "weekly" => Ok(ChartMode::Weekly),
            "breakdown" => Ok(ChartMode::Breakdown),
            _ => Err(ServiceError::validation(
                "mode",
                "Chart mode must be one of daily, weekly, breakdown",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChartRecord {
    Daily {
        name: String,
        daily_kwh: f64,
    },
    Weekly {
        name: String,
        weekly_kwh: f64,
        usage_days: usize,
    },
    Share {
        name: String,
        daily_kwh: f64,
        share_pct: f64,
    },
}

impl ChartRecord {
    pub fn name(&self) -> &str {
        match self {
            ChartRecord::Daily { name, .. } | ChartRecord::Weekly { name, .. } | ChartRecord::Share { name, .. } => {
                name
            }
        }
    }

    /// The value plotted for this record.
    pub fn value(&self) -> f64 {
        match self {
            ChartRecord::Daily { daily_kwh, .. } => *daily_kwh,
            ChartRecord::Weekly { weekly_kwh, .. } => *weekly_kwh,
            ChartRecord::Share { share_pct, .. } => *share_pct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub mode: ChartMode,
    pub label: &'static str,
    pub records: Vec<ChartRecord>,
}

impl ChartSeries {
    pub fn build(mode: ChartMode, household: &[(Appliance, EnergyProfile)]) -> Self {
        let total_daily: f64 = household.iter().map(|(_, p)| p.daily_kwh).sum();
        let records = household
            .iter()
            .map(|(appliance, profile)| {
                let name = appliance.name.clone();
                match mode {
                    ChartMode::Daily => ChartRecord::Daily {
                        name,
                        daily_kwh: round_kwh(profile.daily_kwh),
                    },
                    ChartMode::Weekly => ChartRecord::Weekly {
                        name,
                        weekly_kwh: round_kwh(profile.weekly_kwh),
                        usage_days: profile.active_days,
                    },
                    ChartMode::Breakdown => {
                        let share = if total_daily > 0.0 { profile.daily_kwh / total_daily * 100.0 } else { 0.0 };
                        ChartRecord::Share {
                            name,
                            daily_kwh: round_kwh(profile.daily_kwh),
                            share_pct: round_to(share, 1),
                        }
                    }
                }
            })
            .collect();
        ChartSeries {
            mode,
            label: mode.label(),
            records,
        }
    }

    /// `Name,<label>` header, then one row per record with one decimal.
    pub fn to_csv(&self) -> Result<String, ServiceError> {
        let mut writer = Writer::from_writer(Vec::new());
        writer
            .write_record(["Name", self.label])
            .map_err(|e| export_error("Failed to write CSV header", e))?;
        for record in &self.records {
            let value = format!("{:.1}", record.value());
            writer
                .write_record([record.name(), value.as_str()])
                .map_err(|e| export_error("Failed to write CSV row", e))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| export_error("Failed to finish CSV output", e))?;
        String::from_utf8(bytes).map_err(|e| export_error("CSV output is not UTF-8", e))
    }
}

fn export_error(message: &str, cause: impl Display) -> ServiceError {
    ServiceError {
        error: ErrorKind::CalculationError,
        message: message.to_string(),
        field: None,
        details: Some(Value::String(cause.to_string())),
        id: None,
    }
}
