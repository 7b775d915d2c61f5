//! Form field definitions and type-level validation.
//!
//! Each [`FormFieldDef`] describes a single form field: its type, whether it
//! is required, its initial value and its labels. [`clean_field_value`] and
//! [`clean_field_values`] turn raw submitted strings into typed [`Value`]s.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use stapler_db::value::Value;

static EMAIL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").ok()
});

/// Defines the type of a form field, including type-specific parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum FormFieldType {
    /// A character (string) field.
    Char {
        /// Minimum length (characters).
        min_length: Option<usize>,
        /// Maximum length (characters).
        max_length: Option<usize>,
        /// Whether to strip leading/trailing whitespace.
        strip: bool,
    },
    /// An integer field.
    Integer {
        /// Minimum allowed value.
        min_value: Option<i64>,
        /// Maximum allowed value.
        max_value: Option<i64>,
    },
    /// A floating-point field.
    Float {
        /// Minimum allowed value.
        min_value: Option<f64>,
        /// Maximum allowed value.
        max_value: Option<f64>,
    },
    /// A boolean field (true/false).
    Boolean,
    /// A date field (YYYY-MM-DD).
    Date,
    /// An email address field.
    Email,
    /// A single-choice field.
    Choice {
        /// Available choices as `(value, display_label)` pairs.
        choices: Vec<(String, String)>,
    },
    /// Selects one related record by primary key.
    ModelChoice {
        /// The related model, as `"app_label.model_name"`.
        to: String,
    },
    /// Selects any number of related records by primary key.
    ///
    /// Bound from every submitted value of its key; cleans to a
    /// [`Value::List`] of integer keys.
    ModelMultipleChoice {
        /// The related model, as `"app_label.model_name"`.
        to: String,
    },
}

impl FormFieldType {
    /// A `Char` field with whitespace stripping and the given maximum length.
    pub const fn char(max_length: Option<usize>) -> Self {
        Self::Char {
            min_length: None,
            max_length,
            strip: true,
        }
    }

    /// An unbounded `Integer` field.
    pub const fn integer() -> Self {
        Self::Integer {
            min_value: None,
            max_value: None,
        }
    }

    /// Returns `true` if this field takes several submitted values.
    pub const fn is_multi_valued(&self) -> bool {
        matches!(self, Self::ModelMultipleChoice { .. })
    }
}

/// Complete definition of a form field.
#[derive(Debug, Clone, PartialEq)]
pub struct FormFieldDef {
    /// The field name.
    pub name: String,
    /// The field type, controlling parsing and coercion.
    pub field_type: FormFieldType,
    /// Whether this field is required.
    pub required: bool,
    /// Default/initial value.
    pub initial: Option<Value>,
    /// Help text displayed alongside the field.
    pub help_text: String,
    /// Human-readable label.
    pub label: String,
    /// Custom error messages keyed by error code.
    pub error_messages: HashMap<String, String>,
    /// Whether the field is disabled (its initial value is used as-is).
    pub disabled: bool,
}

impl FormFieldDef {
    /// Creates a new `FormFieldDef` with sensible defaults.
    ///
    /// The field is required by default.
    pub fn new(name: impl Into<String>, field_type: FormFieldType) -> Self {
        let name = name.into();
        let label = name.replace('_', " ");
        Self {
            name,
            field_type,
            required: true,
            initial: None,
            help_text: String::new(),
            label,
            error_messages: HashMap::new(),
            disabled: false,
        }
    }

    /// Sets whether this field is required.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Sets the initial value.
    pub fn initial(mut self, value: impl Into<Value>) -> Self {
        self.initial = Some(value.into());
        self
    }

    /// Sets the help text.
    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = text.into();
        self
    }

    /// Sets the label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets a custom error message for a given code.
    pub fn error_message(mut self, code: impl Into<String>, msg: impl Into<String>) -> Self {
        self.error_messages.insert(code.into(), msg.into());
        self
    }

    /// Sets whether this field is disabled.
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Returns a copy of this field under a different name.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    fn message(&self, code: &str, default: impl FnOnce() -> String) -> String {
        self.error_messages.get(code).cloned().unwrap_or_else(default)
    }

    /// The value an empty, optional submission cleans to.
    fn empty_value(&self) -> Value {
        match self.field_type {
            FormFieldType::Char { .. } | FormFieldType::Email | FormFieldType::Choice { .. } => {
                Value::String(String::new())
            }
            FormFieldType::Boolean => Value::Bool(false),
            FormFieldType::ModelMultipleChoice { .. } => Value::List(Vec::new()),
            _ => Value::Null,
        }
    }
}

fn invalid_pk_message(raw: &str) -> String {
    format!("\u{201c}{raw}\u{201d} is not a valid value.")
}

/// Cleans (validates and coerces) a raw form input string into a typed `Value`.
///
/// 1. Required check (if `required` and value is empty/None)
/// 2. Type coercion (string -> i64, date, etc.)
/// 3. Type-specific constraint validation (min/max, choices)
///
/// Errors accumulate within a field. Multi-valued fields given a single
/// string treat it as a comma-separated list.
pub fn clean_field_value(field: &FormFieldDef, raw: Option<&str>) -> Result<Value, Vec<String>> {
    if field.field_type.is_multi_valued() {
        let values: Vec<String> = raw
            .filter(|s| !s.is_empty())
            .map(|s| s.split(',').map(|p| p.trim().to_string()).collect())
            .unwrap_or_default();
        return clean_field_values(field, &values);
    }

    let raw_str = raw.unwrap_or("");
    let is_empty = match &field.field_type {
        FormFieldType::Char { strip: true, .. } => raw_str.trim().is_empty(),
        _ => raw_str.is_empty(),
    };

    if is_empty {
        if field.required {
            return Err(vec![
                field.message("required", || "This field is required.".to_string())
            ]);
        }
        return Ok(field.empty_value());
    }

    let mut errors = Vec::new();

    let value = match &field.field_type {
        FormFieldType::Char {
            min_length,
            max_length,
            strip,
        } => {
            let s = if *strip { raw_str.trim() } else { raw_str };
            let len = s.chars().count();
            if let Some(min) = min_length {
                if len < *min {
                    errors.push(format!(
                        "Ensure this value has at least {min} characters (it has {len})."
                    ));
                }
            }
            if let Some(max) = max_length {
                if len > *max {
                    errors.push(format!(
                        "Ensure this value has at most {max} characters (it has {len})."
                    ));
                }
            }
            Value::String(s.to_string())
        }

        FormFieldType::Integer {
            min_value,
            max_value,
        } => match raw_str.trim().parse::<i64>() {
            Ok(n) => {
                if let Some(min) = min_value {
                    if n < *min {
                        errors.push(format!(
                            "Ensure this value is greater than or equal to {min}."
                        ));
                    }
                }
                if let Some(max) = max_value {
                    if n > *max {
                        errors.push(format!("Ensure this value is less than or equal to {max}."));
                    }
                }
                Value::Int(n)
            }
            Err(_) => {
                errors.push(field.message("invalid", || "Enter a whole number.".to_string()));
                Value::Null
            }
        },

        FormFieldType::Float {
            min_value,
            max_value,
        } => match raw_str.trim().parse::<f64>() {
            Ok(n) => {
                if let Some(min) = min_value {
                    if n < *min {
                        errors.push(format!(
                            "Ensure this value is greater than or equal to {min}."
                        ));
                    }
                }
                if let Some(max) = max_value {
                    if n > *max {
                        errors.push(format!("Ensure this value is less than or equal to {max}."));
                    }
                }
                Value::Float(n)
            }
            Err(_) => {
                errors.push(field.message("invalid", || "Enter a number.".to_string()));
                Value::Null
            }
        },

        FormFieldType::Boolean => {
            let val = matches!(raw_str.to_lowercase().as_str(), "true" | "1" | "yes" | "on");
            if field.required && !val {
                errors.push(field.message("required", || "This field is required.".to_string()));
            }
            Value::Bool(val)
        }

        FormFieldType::Date => match chrono::NaiveDate::parse_from_str(raw_str, "%Y-%m-%d") {
            Ok(d) => Value::Date(d),
            Err(_) => {
                errors.push(field.message("invalid", || {
                    "Enter a valid date (YYYY-MM-DD).".to_string()
                }));
                Value::Null
            }
        },

        FormFieldType::Email => {
            let candidate = raw_str.trim();
            let valid = EMAIL_RE.as_ref().is_some_and(|re| re.is_match(candidate));
            if !valid {
                errors.push(field.message("invalid", || {
                    "Enter a valid email address.".to_string()
                }));
            }
            Value::String(candidate.to_string())
        }

        FormFieldType::Choice { choices } => {
            if !choices.iter().any(|(v, _)| v == raw_str) {
                errors.push(format!(
                    "Select a valid choice. {raw_str} is not one of the available choices."
                ));
            }
            Value::String(raw_str.to_string())
        }

        FormFieldType::ModelChoice { .. } => match raw_str.trim().parse::<i64>() {
            Ok(pk) => Value::Int(pk),
            Err(_) => {
                errors.push(field.message("invalid_choice", || {
                    "Select a valid choice. That choice is not one of the available choices."
                        .to_string()
                }));
                Value::Null
            }
        },

        FormFieldType::ModelMultipleChoice { .. } => Value::Null,
    };

    if errors.is_empty() {
        Ok(value)
    } else {
        Err(errors)
    }
}

/// Cleans every submitted value of a field.
///
/// Multi-valued fields clean each entry to an integer key and return a
/// [`Value::List`]; other fields clean the last submitted value.
pub fn clean_field_values(field: &FormFieldDef, raw: &[String]) -> Result<Value, Vec<String>> {
    if !field.field_type.is_multi_valued() {
        return clean_field_value(field, raw.last().map(String::as_str));
    }

    let entries: Vec<&str> = raw
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if entries.is_empty() {
        if field.required {
            return Err(vec![
                field.message("required", || "This field is required.".to_string())
            ]);
        }
        return Ok(field.empty_value());
    }

    let mut errors = Vec::new();
    let mut pks = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry.parse::<i64>() {
            Ok(pk) => {
                let pk = Value::Int(pk);
                if !pks.contains(&pk) {
                    pks.push(pk);
                }
            }
            Err(_) => errors.push(field.message("invalid_pk_value", || invalid_pk_message(entry))),
        }
    }

    if errors.is_empty() {
        Ok(Value::List(pks))
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_field(max: Option<usize>) -> FormFieldDef {
        FormFieldDef::new("name", FormFieldType::char(max))
    }

    #[test]
    fn test_required_missing() {
        let field = char_field(None);
        assert_eq!(
            clean_field_value(&field, None),
            Err(vec!["This field is required.".to_string()])
        );
        assert!(clean_field_value(&field, Some("   ")).is_err());
    }

    #[test]
    fn test_optional_empty_values() {
        let field = char_field(None).required(false);
        assert_eq!(clean_field_value(&field, None), Ok(Value::from("")));

        let field = FormFieldDef::new("price", FormFieldType::integer()).required(false);
        assert_eq!(clean_field_value(&field, Some("")), Ok(Value::Null));

        let field = FormFieldDef::new("active", FormFieldType::Boolean).required(false);
        assert_eq!(clean_field_value(&field, None), Ok(Value::Bool(false)));
    }

    #[test]
    fn test_char_strip_and_max_length() {
        let field = char_field(Some(5));
        assert_eq!(clean_field_value(&field, Some("  Propel ")), Err(vec![
            "Ensure this value has at most 5 characters (it has 6).".to_string()
        ]));
        assert_eq!(clean_field_value(&field, Some(" Giant ")), Ok(Value::from("Giant")));
    }

    #[test]
    fn test_integer() {
        let field = FormFieldDef::new("price", FormFieldType::integer());
        assert_eq!(clean_field_value(&field, Some("300")), Ok(Value::Int(300)));
        assert_eq!(
            clean_field_value(&field, Some("cheap")),
            Err(vec!["Enter a whole number.".to_string()])
        );

        let bounded = FormFieldDef::new(
            "price",
            FormFieldType::Integer {
                min_value: Some(1),
                max_value: Some(10),
            },
        );
        assert!(clean_field_value(&bounded, Some("0")).is_err());
        assert!(clean_field_value(&bounded, Some("11")).is_err());
    }

    #[test]
    fn test_custom_error_message() {
        let field = char_field(None).error_message("required", "Name your bike.");
        assert_eq!(
            clean_field_value(&field, None),
            Err(vec!["Name your bike.".to_string()])
        );
    }

    #[test]
    fn test_email() {
        let field = FormFieldDef::new("email", FormFieldType::Email);
        assert!(clean_field_value(&field, Some("sales@giant.example")).is_ok());
        assert_eq!(
            clean_field_value(&field, Some("not-an-email")),
            Err(vec!["Enter a valid email address.".to_string()])
        );
    }

    #[test]
    fn test_date() {
        let field = FormFieldDef::new("released", FormFieldType::Date);
        assert_eq!(
            clean_field_value(&field, Some("2024-05-01")),
            Ok(Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()))
        );
        assert!(clean_field_value(&field, Some("01/05/2024")).is_err());
    }

    #[test]
    fn test_choice() {
        let field = FormFieldDef::new(
            "frame_type",
            FormFieldType::Choice {
                choices: vec![("roadbike".into(), "Road".into())],
            },
        );
        assert!(clean_field_value(&field, Some("roadbike")).is_ok());
        assert!(clean_field_value(&field, Some("bmx")).is_err());
    }

    #[test]
    fn test_model_choice() {
        let field = FormFieldDef::new(
            "country",
            FormFieldType::ModelChoice {
                to: "shop.country".into(),
            },
        );
        assert_eq!(clean_field_value(&field, Some("3")), Ok(Value::Int(3)));
        assert!(clean_field_value(&field, Some("Belgium")).is_err());
    }

    #[test]
    fn test_model_multiple_choice_values() {
        let field = FormFieldDef::new(
            "countries",
            FormFieldType::ModelMultipleChoice {
                to: "shop.country".into(),
            },
        );
        let raw = vec!["1".to_string(), "2".to_string(), "1".to_string()];
        assert_eq!(
            clean_field_values(&field, &raw),
            Ok(Value::List(vec![Value::Int(1), Value::Int(2)]))
        );
        assert_eq!(
            clean_field_values(&field, &["x".to_string()]),
            Err(vec!["\u{201c}x\u{201d} is not a valid value.".to_string()])
        );
        assert!(clean_field_values(&field, &[]).is_err());
        assert!(clean_field_values(&field.clone().required(false), &[]).is_ok());
    }

    #[test]
    fn test_model_multiple_choice_from_single_string() {
        let field = FormFieldDef::new(
            "countries",
            FormFieldType::ModelMultipleChoice {
                to: "shop.country".into(),
            },
        );
        assert_eq!(
            clean_field_value(&field, Some("4, 5")),
            Ok(Value::List(vec![Value::Int(4), Value::Int(5)]))
        );
    }

    #[test]
    fn test_renamed_keeps_definition() {
        let field = char_field(Some(10)).label("Bike name");
        let renamed = field.renamed("bike__name");
        assert_eq!(renamed.name, "bike__name");
        assert_eq!(renamed.label, "Bike name");
        assert_eq!(renamed.field_type, field.field_type);
    }
}
