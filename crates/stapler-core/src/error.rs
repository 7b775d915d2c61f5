//! Core error types for stapler-rs.
//!
//! [`StaplerError`] covers ORM errors, validation errors, configuration errors
//! and I/O. Composite forms keep three outcomes apart:
//!
//! - a malformed declaration is [`StaplerError::ImproperlyConfigured`],
//! - a sub-form that does not validate is plain form state, never an `Err`,
//! - a failing database write is whatever the backend returned.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Represents a validation error with optional field-level errors.
///
/// Validation errors can be either simple (a single message) or compound
/// (containing per-field error lists).
///
/// # Examples
///
/// ```
/// use stapler_core::error::ValidationError;
///
/// // Simple validation error
/// let err = ValidationError::new("This field is required.", "required");
///
/// // Field-level validation errors
/// let mut field_errors = std::collections::HashMap::new();
/// field_errors.insert(
///     "price".to_string(),
///     vec![ValidationError::new("Enter a whole number.", "invalid")],
/// );
/// let err = ValidationError::with_field_errors(field_errors);
/// ```
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The primary error message.
    pub message: String,
    /// A short code identifying the type of validation failure (e.g. "required", "invalid").
    pub code: String,
    /// Additional parameters providing context for the error message.
    pub params: HashMap<String, String>,
    /// Per-field validation errors, keyed by field name.
    pub field_errors: HashMap<String, Vec<Self>>,
}

impl ValidationError {
    /// Creates a new `ValidationError` with a message and code.
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            params: HashMap::new(),
            field_errors: HashMap::new(),
        }
    }

    /// Creates a `ValidationError` containing per-field errors.
    pub fn with_field_errors(field_errors: HashMap<String, Vec<Self>>) -> Self {
        Self {
            message: String::new(),
            code: String::new(),
            params: HashMap::new(),
            field_errors,
        }
    }

    /// Builds a compound error from a form's `field -> messages` error map.
    pub fn from_form_errors(errors: &HashMap<String, Vec<String>>) -> Self {
        let field_errors = errors
            .iter()
            .map(|(field, messages)| {
                let list = messages
                    .iter()
                    .map(|m| Self::new(m.clone(), "invalid"))
                    .collect();
                (field.clone(), list)
            })
            .collect();
        Self::with_field_errors(field_errors)
    }

    /// Adds a parameter to this validation error.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.message.is_empty() {
            write!(f, "{}", self.message)?;
        } else if !self.field_errors.is_empty() {
            let mut fields: Vec<_> = self.field_errors.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            let mut first = true;
            for (field, errors) in fields {
                for error in errors {
                    if !first {
                        write!(f, "; ")?;
                    }
                    write!(f, "{field}: {error}")?;
                    first = false;
                }
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// The primary error type for stapler-rs.
#[derive(Error, Debug)]
pub enum StaplerError {
    // ── ORM errors ───────────────────────────────────────────────────

    /// Raised when a query expected exactly one result but found none.
    #[error("Object does not exist: {0}")]
    DoesNotExist(String),

    /// Raised when a query expected exactly one result but found multiple.
    #[error("Multiple objects returned when one expected: {0}")]
    MultipleObjectsReturned(String),

    /// A generic database error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A database integrity constraint was violated.
    #[error("Integrity error: {0}")]
    IntegrityError(String),

    /// An operational database error (connection failure, etc.).
    #[error("Operational error: {0}")]
    OperationalError(String),

    // ── Validation ───────────────────────────────────────────────────

    /// One or more fields failed validation.
    #[error("Validation error: {0}")]
    ValidationError(ValidationError),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A form or model declaration is structurally invalid.
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // ── Security ─────────────────────────────────────────────────────

    /// A potentially malicious operation was detected.
    #[error("Suspicious operation: {0}")]
    SuspiciousOperation(String),
}

impl StaplerError {
    /// Returns `true` for errors produced by the database layer.
    pub const fn is_database_error(&self) -> bool {
        matches!(
            self,
            Self::DoesNotExist(_)
                | Self::MultipleObjectsReturned(_)
                | Self::DatabaseError(_)
                | Self::IntegrityError(_)
                | Self::OperationalError(_)
        )
    }
}

impl From<ValidationError> for StaplerError {
    fn from(err: ValidationError) -> Self {
        Self::ValidationError(err)
    }
}

/// A convenience type alias for `Result<T, StaplerError>`.
pub type StaplerResult<T> = Result<T, StaplerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_simple() {
        let err = ValidationError::new("This field is required.", "required");
        assert_eq!(err.to_string(), "This field is required.");
    }

    #[test]
    fn test_validation_error_display_field_errors() {
        let mut field_errors = HashMap::new();
        field_errors.insert(
            "price".to_string(),
            vec![ValidationError::new("Enter a whole number.", "invalid")],
        );
        let err = ValidationError::with_field_errors(field_errors);
        assert_eq!(err.to_string(), "price: Enter a whole number.");
    }

    #[test]
    fn test_validation_error_from_form_errors_sorted() {
        let mut errors = HashMap::new();
        errors.insert("price".to_string(), vec!["This field is required.".to_string()]);
        errors.insert("name".to_string(), vec!["Too long.".to_string()]);
        let err = ValidationError::from_form_errors(&errors);
        assert_eq!(
            err.to_string(),
            "name: Too long.; price: This field is required."
        );
    }

    #[test]
    fn test_validation_error_with_param() {
        let err = ValidationError::new("Too short.", "min_length").with_param("min", "8");
        assert_eq!(err.params.get("min").unwrap(), "8");
    }

    #[test]
    fn test_is_database_error() {
        assert!(StaplerError::DatabaseError("x".into()).is_database_error());
        assert!(StaplerError::IntegrityError("x".into()).is_database_error());
        assert!(StaplerError::DoesNotExist("x".into()).is_database_error());
        assert!(!StaplerError::ImproperlyConfigured("x".into()).is_database_error());
        assert!(!StaplerError::ValidationError(ValidationError::new("x", "y")).is_database_error());
    }

    #[test]
    fn test_error_display() {
        let err = StaplerError::ImproperlyConfigured("duplicate sub-form 'bike'".into());
        assert_eq!(
            err.to_string(),
            "Improperly configured: duplicate sub-form 'bike'"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: StaplerError = io_err.into();
        assert!(err.to_string().contains("file missing"));
    }
}
