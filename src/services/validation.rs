use crate::error::{FieldError, ServiceError};
use crate::models::appliance::{
    ApplianceDraft, AppliancePatch, NewAppliance, UsageDays, MAX_DAILY_HOURS, MAX_NAME_CHARS, MAX_POWER_WATTS,
    MAX_STANDBY_WATTS, MIN_POWER_WATTS,
};
use serde_json::{Map, Value};

/// Fields an update may carry.
pub const UPDATE_FIELDS: [&str; 5] = ["name", "power_watts", "daily_hours", "usage_days", "standby_watts"];

const DAYS_RANGE_MSG: &str = "Usage days must be numbers between 0 (Sunday) and 6 (Saturday)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Update,
}

fn check_name(name: Option<&str>, mode: Mode) -> Option<FieldError> {
    match name.map(str::trim) {
        None if mode == Mode::Create => Some(FieldError::new(
            "name",
            "Name is required and must be a non-empty string",
        )),
        None => None,
        Some("") if mode == Mode::Create => Some(FieldError::new(
            "name",
            "Name is required and must be a non-empty string",
        )),
        Some("") => Some(FieldError::new("name", "Name must be a non-empty string")),
        Some(n) if n.chars().count() > MAX_NAME_CHARS => {
            Some(FieldError::new("name", "Name must be 100 characters or less"))
        }
        Some(_) => None,
    }
}

fn check_number(
    field: &'static str,
    label: &str,
    value: Option<f64>,
    (min, max): (f64, f64),
    required: bool,
) -> Option<FieldError> {
    match value {
        None if required => Some(FieldError::new(field, format!("{} is required", label))),
        None => None,
        Some(v) if !v.is_finite() => Some(FieldError::new(field, format!("{} must be a valid number", label))),
        Some(v) if v < min || v > max => Some(FieldError::new(
            field,
            format!("{} must be between {} and {}", label, min, max),
        )),
        Some(_) => None,
    }
}

fn check_power(value: Option<f64>, mode: Mode) -> Option<FieldError> {
    check_number(
        "power_watts",
        "Power watts",
        value,
        (MIN_POWER_WATTS, MAX_POWER_WATTS),
        mode == Mode::Create,
    )
}

fn check_hours(value: Option<f64>, mode: Mode) -> Option<FieldError> {
    check_number(
        "daily_hours",
        "Daily hours",
        value,
        (0.0, MAX_DAILY_HOURS),
        mode == Mode::Create,
    )
}

fn check_standby(value: Option<f64>) -> Option<FieldError> {
    check_number("standby_watts", "Standby watts", value, (0.0, MAX_STANDBY_WATTS), false)
}

fn check_usage_days(days: Option<&[i64]>, mode: Mode) -> Option<FieldError> {
    match days {
        None if mode == Mode::Create => Some(FieldError::new("usage_days", "Usage days are required")),
        None => None,
        Some([]) => Some(FieldError::new("usage_days", "At least one usage day must be specified")),
        Some(d) if d.iter().any(|day| !(0..=6).contains(day)) => Some(FieldError::new("usage_days", DAYS_RANGE_MSG)),
        Some(_) => None,
    }
}

/// Errors in reporting order: name, power, hours, usage days, standby.
fn check_draft(draft: &ApplianceDraft, mode: Mode) -> Vec<FieldError> {
    let mut errors = [
        check_name(draft.name.as_deref(), mode),
        check_power(draft.power_watts, mode),
        check_hours(draft.daily_hours, mode),
        check_usage_days(draft.usage_days.as_deref(), mode),
        check_standby(draft.standby_watts),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>();
    if mode == Mode::Update && draft.is_empty() {
        errors.push(update_requires_field());
    }
    errors
}

fn update_requires_field() -> FieldError {
    FieldError::new("update", "Update requires at least one field to be provided")
}

fn to_usage_days(days: &[i64]) -> Result<UsageDays, ServiceError> {
    UsageDays::new(days.iter().copied()).map_err(|e| ServiceError::validation("usage_days", e.to_string()))
}

/// Check a create request. `name` comes back trimmed but not yet sanitized.
pub fn validate_create(draft: &ApplianceDraft) -> Result<NewAppliance, ServiceError> {
    let errors = check_draft(draft, Mode::Create);
    if !errors.is_empty() {
        return Err(ServiceError::invalid_fields(errors));
    }
    match (&draft.name, draft.power_watts, draft.daily_hours, &draft.usage_days) {
        (Some(name), Some(power_watts), Some(daily_hours), Some(days)) => Ok(NewAppliance {
            name: name.trim().to_string(),
            power_watts,
            daily_hours,
            usage_days: to_usage_days(days)?,
            standby_watts: draft.standby_watts.unwrap_or(0.0),
        }),
        _ => Err(ServiceError::validation("body", "Incomplete appliance data")),
    }
}

/// Check an update request. `name` comes back trimmed but not yet sanitized.
pub fn validate_update(draft: &ApplianceDraft) -> Result<AppliancePatch, ServiceError> {
    let errors = check_draft(draft, Mode::Update);
    if !errors.is_empty() {
        return Err(ServiceError::invalid_fields(errors));
    }
    Ok(AppliancePatch {
        name: draft.name.as_deref().map(|n| n.trim().to_string()),
        power_watts: draft.power_watts,
        daily_hours: draft.daily_hours,
        usage_days: draft.usage_days.as_deref().map(to_usage_days).transpose()?,
        standby_watts: draft.standby_watts,
    })
}

enum Extracted<T> {
    Absent,
    Present(T),
    WrongType(FieldError),
}

impl<T> Extracted<T> {
    fn split(self, errors: &mut Vec<FieldError>) -> (Option<T>, bool) {
        match self {
            Extracted::Absent => (None, true),
            Extracted::Present(v) => (Some(v), true),
            Extracted::WrongType(e) => {
                errors.push(e);
                (None, false)
            }
        }
    }
}

fn extract_name(obj: &Map<String, Value>) -> Extracted<String> {
    match obj.get("name") {
        None => Extracted::Absent,
        Some(Value::String(s)) => Extracted::Present(s.clone()),
        Some(_) => Extracted::WrongType(FieldError::new("name", "Name must be a string")),
    }
}

fn extract_number(obj: &Map<String, Value>, field: &'static str, label: &str) -> Extracted<f64> {
    match obj.get(field) {
        None => Extracted::Absent,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) => Extracted::Present(v),
            None => Extracted::WrongType(FieldError::new(field, format!("{} must be a valid number", label))),
        },
        Some(_) => Extracted::WrongType(FieldError::new(field, format!("{} must be a valid number", label))),
    }
}

fn extract_days(obj: &Map<String, Value>) -> Extracted<Vec<i64>> {
    match obj.get("usage_days") {
        None => Extracted::Absent,
        Some(Value::Array(items)) => {
            let days = items.iter().map(Value::as_i64).collect::<Option<Vec<_>>>();
            match days {
                Some(days) => Extracted::Present(days),
                None => Extracted::WrongType(FieldError::new("usage_days", DAYS_RANGE_MSG)),
            }
        }
        Some(_) => Extracted::WrongType(FieldError::new("usage_days", "Usage days must be an array")),
    }
}

impl ApplianceDraft {
    /// Decode an untrusted JSON object.
    ///
    /// Wrong JSON types (a string where a number belongs, a non-array
    /// `usage_days`) are reported as field errors in the same order as the
    /// domain checks, so `{"name": "", "power_watts": "100"}` fails on `name`.
    /// Unknown keys are ignored.
    pub fn from_json(payload: &Value, mode: Mode) -> Result<ApplianceDraft, ServiceError> {
        let Some(obj) = payload.as_object() else {
            return Err(ServiceError::validation("body", "Request body must be a JSON object"));
        };

        let mut errors = Vec::new();
        let mut draft = ApplianceDraft::default();

        let (name, ok) = extract_name(obj).split(&mut errors);
        if ok {
            errors.extend(check_name(name.as_deref(), mode));
        }
        draft.name = name;

        let (power, ok) = extract_number(obj, "power_watts", "Power watts").split(&mut errors);
        if ok {
            errors.extend(check_power(power, mode));
        }
        draft.power_watts = power;

        let (hours, ok) = extract_number(obj, "daily_hours", "Daily hours").split(&mut errors);
        if ok {
            errors.extend(check_hours(hours, mode));
        }
        draft.daily_hours = hours;

        let (days, ok) = extract_days(obj).split(&mut errors);
        if ok {
            errors.extend(check_usage_days(days.as_deref(), mode));
        }
        draft.usage_days = days;

        let (standby, ok) = extract_number(obj, "standby_watts", "Standby watts").split(&mut errors);
        if ok {
            errors.extend(check_standby(standby));
        }
        draft.standby_watts = standby;

        let recognized = UPDATE_FIELDS.iter().any(|f| obj.contains_key(*f));
        if mode == Mode::Update && !recognized {
            errors.push(update_requires_field());
        }

        if errors.is_empty() {
            Ok(draft)
        } else {
            Err(ServiceError::invalid_fields(errors))
        }
    }
}
