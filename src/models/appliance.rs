//! Appliance entity and the value types around it.
//!
//! Types here are already validated: anything holding a [`UsageDays`] or an
//! [`Appliance`] satisfies the domain rules. Untrusted input lives in
//! [`ApplianceDraft`] until the repository validates it.

use crate::error::ServiceError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::error::Error;
use std::fmt::{self, Display, Formatter};

pub const MIN_POWER_WATTS: f64 = 0.1;
pub const MAX_POWER_WATTS: f64 = 10_000.0;
pub const MAX_DAILY_HOURS: f64 = 24.0;
pub const MAX_STANDBY_WATTS: f64 = 1_000.0;
pub const MAX_NAME_CHARS: usize = 100;

/// Day numbers run from 0 (Sunday) to 6 (Saturday).
pub const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ApplianceId(pub i64);

impl Display for ApplianceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Anything a caller may hand over as an appliance id.
///
/// Text ids come straight from user input and are checked for presence and
/// numeric content before storage is touched.
pub trait IdInput {
    fn resolve(&self) -> Result<ApplianceId, ServiceError>;
}

impl IdInput for ApplianceId {
    fn resolve(&self) -> Result<ApplianceId, ServiceError> {
        Ok(*self)
    }
}

impl IdInput for i64 {
    fn resolve(&self) -> Result<ApplianceId, ServiceError> {
        Ok(ApplianceId(*self))
    }
}

impl IdInput for str {
    fn resolve(&self) -> Result<ApplianceId, ServiceError> {
        let trimmed = self.trim();
        if trimmed.is_empty() {
            return Err(ServiceError::validation("id", "ID is required"));
        }
        trimmed
            .parse::<i64>()
            .map(ApplianceId)
            .map_err(|_| ServiceError::validation("id", "ID must be numeric"))
    }
}

impl IdInput for String {
    fn resolve(&self) -> Result<ApplianceId, ServiceError> {
        self.as_str().resolve()
    }
}

impl<T: IdInput> IdInput for Option<T> {
    fn resolve(&self) -> Result<ApplianceId, ServiceError> {
        match self {
            Some(inner) => inner.resolve(),
            None => Err(ServiceError::validation("id", "ID is required")),
        }
    }
}

impl<T: IdInput + ?Sized> IdInput for &T {
    fn resolve(&self) -> Result<ApplianceId, ServiceError> {
        (**self).resolve()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageDaysError {
    Empty,
    OutOfRange(i64),
    Malformed(String),
}

impl Display for UsageDaysError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            UsageDaysError::Empty => write!(f, "at least one usage day is required"),
            UsageDaysError::OutOfRange(d) => write!(f, "usage day {} outside 0..=6", d),
            UsageDaysError::Malformed(e) => write!(f, "malformed usage_days value: {}", e),
        }
    }
}

impl Error for UsageDaysError {}

/// Non-empty set of weekdays, kept in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UsageDays(Vec<u8>);

impl UsageDays {
    /// Duplicates collapse onto their first occurrence.
    pub fn new(days: impl IntoIterator<Item = i64>) -> Result<Self, UsageDaysError> {
        let mut out: Vec<u8> = Vec::with_capacity(7);
        for day in days {
            let d = u8::try_from(day)
                .ok()
                .filter(|d| *d <= 6)
                .ok_or(UsageDaysError::OutOfRange(day))?;
            if !out.contains(&d) {
                out.push(d);
            }
        }
        if out.is_empty() {
            return Err(UsageDaysError::Empty);
        }
        Ok(UsageDays(out))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Column form: a JSON array such as `[1,2,3]`.
    pub fn encode(&self) -> String {
        serde_json::Value::from(self.0.clone()).to_string()
    }

    pub fn decode(raw: &str) -> Result<Self, UsageDaysError> {
        let days: Vec<i64> = serde_json::from_str(raw).map_err(|e| UsageDaysError::Malformed(e.to_string()))?;
        UsageDays::new(days)
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.0.iter().map(|d| WEEKDAY_NAMES[usize::from(*d)]).collect()
    }
}

/// A stored appliance. `name` is the sanitized form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Appliance {
    pub id: ApplianceId,
    pub name: String,
    pub power_watts: f64,
    pub daily_hours: f64,
    pub usage_days: UsageDays,
    pub standby_watts: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Untrusted appliance fields as supplied by a caller.
///
/// Used for both create (all of `name`, `power_watts`, `daily_hours`,
/// `usage_days` required) and update (any subset, at least one).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplianceDraft {
    pub name: Option<String>,
    pub power_watts: Option<f64>,
    pub daily_hours: Option<f64>,
    pub usage_days: Option<Vec<i64>>,
    pub standby_watts: Option<f64>,
}

impl ApplianceDraft {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.power_watts.is_none()
            && self.daily_hours.is_none()
            && self.usage_days.is_none()
            && self.standby_watts.is_none()
    }
}

/// Validated, sanitized input for an insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAppliance {
    pub name: String,
    pub power_watts: f64,
    pub daily_hours: f64,
    pub usage_days: UsageDays,
    pub standby_watts: f64,
}

/// Validated, sanitized partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliancePatch {
    pub name: Option<String>,
    pub power_watts: Option<f64>,
    pub daily_hours: Option<f64>,
    pub usage_days: Option<UsageDays>,
    pub standby_watts: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConsumptionEstimates {
    pub daily_kwh: f64,
    pub weekly_kwh: f64,
    pub monthly_kwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplianceWithEstimates {
    #[serde(flatten)]
    pub appliance: Appliance,
    pub consumption_estimates: ConsumptionEstimates,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplianceList {
    pub appliances: Vec<ApplianceWithEstimates>,
    pub total_consumption: ConsumptionEstimates,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteConfirmation {
    pub success: bool,
    pub id: ApplianceId,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    #[test]
    fn usage_days_rejects_empty_and_out_of_range() {
        assert_eq!(UsageDays::new(Vec::new()), Err(UsageDaysError::Empty));
        assert_eq!(UsageDays::new([1, 7]), Err(UsageDaysError::OutOfRange(7)));
        assert_eq!(UsageDays::new([-1]), Err(UsageDaysError::OutOfRange(-1)));
    }

    #[test]
    fn usage_days_collapses_duplicates_in_first_seen_order() {
        let days = UsageDays::new([5, 1, 5, 3, 1]).unwrap();
        assert_eq!(days.as_slice(), &[5, 1, 3]);
        assert_eq!(days.len(), 3);
        assert_eq!(days.labels(), vec!["Fri", "Mon", "Wed"]);
    }

    #[test]
    fn usage_days_column_form() {
        let days = UsageDays::new([1, 2, 3, 4, 5]).unwrap();
        assert_eq!(days.encode(), "[1,2,3,4,5]");
        assert_eq!(UsageDays::decode("[6,0]").unwrap().as_slice(), &[6, 0]);
        assert!(matches!(UsageDays::decode("monday"), Err(UsageDaysError::Malformed(_))));
        assert_eq!(UsageDays::decode("[]"), Err(UsageDaysError::Empty));
    }

    #[test]
    fn text_ids_are_checked() {
        assert_eq!("17".resolve().unwrap(), ApplianceId(17));
        assert_eq!(" 17 ".resolve().unwrap(), ApplianceId(17));

        let missing = "".resolve().unwrap_err();
        assert_eq!(missing.error, ErrorKind::ValidationError);
        assert_eq!(missing.message, "ID is required");

        let word = "abc".resolve().unwrap_err();
        assert_eq!(word.field.as_deref(), Some("id"));
        assert_eq!(word.message, "ID must be numeric");

        let none: Option<&str> = None;
        assert_eq!(none.resolve().unwrap_err().message, "ID is required");
    }

    #[test]
    fn draft_emptiness() {
        assert!(ApplianceDraft::default().is_empty());
        let draft = ApplianceDraft {
            standby_watts: Some(1.0),
            ..Default::default()
        };
        assert!(!draft.is_empty());
    }

    proptest! {
        #[test]
        fn usage_days_round_trip_through_column_form(days in prop::collection::vec(0i64..=6, 1..12)) {
            let parsed = UsageDays::new(days.clone()).unwrap();
            let decoded = UsageDays::decode(&parsed.encode()).unwrap();
            prop_assert_eq!(&decoded, &parsed);

            let mut expected: Vec<u8> = days.iter().map(|d| *d as u8).collect();
            expected.sort_unstable();
            expected.dedup();
            let mut got = decoded.as_slice().to_vec();
            got.sort_unstable();
            prop_assert_eq!(got, expected);
        }
    }
}
