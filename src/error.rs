//! Tagged error payload shared by the repository, the consumption engine and
//! the CLI.
//!
//! Every failure crossing a component boundary is a [`ServiceError`], which
//! serializes to `{error, message, field?, details?, id?}` so callers can
//! branch on `error` without parsing messages.

use core::fmt;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ValidationError,
    NotFound,
    DatabaseError,
    CalculationError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::DatabaseError => "DATABASE_ERROR",
            ErrorKind::CalculationError => "CALCULATION_ERROR",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceError {
    pub error: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

impl ServiceError {
    fn bare(error: ErrorKind, message: impl Into<String>) -> Self {
        ServiceError {
            error,
            message: message.into(),
            field: None,
            details: None,
            id: None,
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError {
            field: Some(field.into()),
            ..Self::bare(ErrorKind::ValidationError, message)
        }
    }

    /// Surfaces the first error; the whole list goes into `details`.
    ///
    /// Callers must pass a non-empty list.
    pub fn invalid_fields(errors: Vec<FieldError>) -> Self {
        let (field, message) = match errors.first() {
            Some(first) => (first.field.clone(), first.message.clone()),
            None => ("body".to_string(), "Invalid input".to_string()),
        };
        let details = serde_json::to_value(&errors).ok();
        ServiceError {
            field: Some(field),
            details,
            ..Self::bare(ErrorKind::ValidationError, message)
        }
    }

    pub fn not_found(id: i64) -> Self {
        ServiceError {
            id: Some(id),
            ..Self::bare(ErrorKind::NotFound, "Appliance not found")
        }
    }

    pub fn database(message: impl Into<String>, cause: impl Display) -> Self {
        ServiceError {
            details: Some(serde_json::Value::String(cause.to_string())),
            ..Self::bare(ErrorKind::DatabaseError, message)
        }
    }

    /// Re-wraps a nested failure as a calculation error, keeping the nested
    /// message as the detail.
    pub fn calculation(message: impl Into<String>, cause: &ServiceError) -> Self {
        ServiceError {
            details: Some(serde_json::Value::String(cause.message_with_details())),
            ..Self::bare(ErrorKind::CalculationError, message)
        }
    }

    /// Validation and not-found errors travel through every layer unchanged.
    pub fn passes_through(&self) -> bool {
        matches!(self.error, ErrorKind::ValidationError | ErrorKind::NotFound)
    }

    fn message_with_details(&self) -> String {
        match &self.details {
            Some(serde_json::Value::String(d)) => format!("{}: {}", self.message, d),
            _ => self.message.clone(),
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)?;
        if let Some(field) = &self.field {
            write!(f, " (field {})", field)?;
        }
        if let Some(id) = self.id {
            write!(f, " (id {})", id)?;
        }
        Ok(())
    }
}

impl Error for ServiceError {}
