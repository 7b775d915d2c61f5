//! Settings loading from configuration files.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `STAPLER_DEBUG` | `debug` |
//! | `STAPLER_LOG_LEVEL` | `log_level` |
//! | `STAPLER_DATABASE_NAME` | `databases.default.name` |
//! | `STAPLER_FORMS_AUTO_PREFIX` | `forms.auto_prefix` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use stapler_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("config/stapler.toml").unwrap();
//! ```

use std::path::Path;

use crate::error::StaplerError;
use crate::settings::{DatabaseSettings, Settings};

/// Loads settings from a TOML string.
///
/// Any keys not present in the TOML keep their default values.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or cannot be deserialized.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, StaplerError> {
    // TOML -> JSON, then deep-merge over the serialized defaults.
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| StaplerError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;

    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, StaplerError> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        StaplerError::ConfigurationError(format!(
            "Failed to read TOML file '{}': {e}",
            path.as_ref().display()
        ))
    })?;
    from_toml_str(&content)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, StaplerError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or cannot be deserialized.
pub fn from_json_str(json_str: &str) -> Result<Settings, StaplerError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| StaplerError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;

    merge_over_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is malformed.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, StaplerError> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        StaplerError::ConfigurationError(format!(
            "Failed to read JSON file '{}': {e}",
            path.as_ref().display()
        ))
    })?;
    from_json_str(&content)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies environment variable overrides to a settings struct.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides(settings, |key| std::env::var(key).ok());
}

/// Applies overrides from an arbitrary key lookup.
///
/// [`apply_env_overrides`] passes `std::env::var`; tests pass a map.
pub fn apply_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("STAPLER_DEBUG") {
        settings.debug = parse_bool(&val);
    }

    if let Some(val) = lookup("STAPLER_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Some(val) = lookup("STAPLER_DATABASE_NAME") {
        settings
            .databases
            .entry("default".to_string())
            .or_insert_with(DatabaseSettings::default)
            .name = val;
    }

    if let Some(val) = lookup("STAPLER_FORMS_AUTO_PREFIX") {
        settings.forms.auto_prefix = parse_bool(&val);
    }
}

// ============================================================
// Helpers
// ============================================================

fn parse_bool(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "true" | "1" | "yes")
}

fn merge_over_defaults(value: serde_json::Value, format: &str) -> Result<Settings, StaplerError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        StaplerError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, value);
    serde_json::from_value(merged).map_err(|e| {
        StaplerError::ConfigurationError(format!(
            "Failed to deserialize settings from {format}: {e}"
        ))
    })
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_toml_str_basic() {
        let toml = r#"
            debug = false
            log_level = "stapler_forms=debug"
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert!(!settings.debug);
        assert_eq!(settings.log_level, "stapler_forms=debug");
        // Defaults preserved
        assert!(settings.forms.auto_prefix);
    }

    #[test]
    fn test_from_toml_str_forms_section() {
        let toml = r"
            [forms]
            auto_prefix = false
        ";
        let settings = from_toml_str(toml).unwrap();
        assert!(!settings.forms.auto_prefix);
    }

    #[test]
    fn test_from_toml_str_database_partial_merge() {
        let toml = r#"
            [databases.default]
            name = ":memory:"
        "#;

        let settings = from_toml_str(toml).unwrap();
        let db = settings.default_database().unwrap();
        assert_eq!(db.name, ":memory:");
        // engine comes from the defaults
        assert_eq!(db.engine, "stapler.db.backends.sqlite3");
    }

    #[test]
    fn test_from_toml_str_empty() {
        let settings = from_toml_str("").unwrap();
        assert!(settings.debug);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_from_toml_str_malformed() {
        let result = from_toml_str("debug = [unclosed");
        assert!(matches!(result, Err(StaplerError::ConfigurationError(_))));
    }

    #[test]
    fn test_from_toml_str_wrong_type() {
        let result = from_toml_str("debug = \"sometimes\"");
        assert!(matches!(result, Err(StaplerError::ConfigurationError(_))));
    }

    #[test]
    fn test_from_json_str() {
        let settings =
            from_json_str(r#"{"debug": false, "forms": {"auto_prefix": false}}"#).unwrap();
        assert!(!settings.debug);
        assert!(!settings.forms.auto_prefix);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_from_json_str_malformed() {
        assert!(from_json_str("{not json").is_err());
    }

    #[test]
    fn test_from_json_file() {
        let path =
            std::env::temp_dir().join(format!("stapler-settings-{}.json", std::process::id()));
        let json = r#"{"log_level": "warn", "databases": {"default": {"name": ":memory:"}}}"#;
        std::fs::write(&path, json).unwrap();
        let settings = from_json_file(&path);
        std::fs::remove_file(&path).unwrap();

        let settings = settings.unwrap();
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.default_database().unwrap().name, ":memory:");
        assert!(settings.forms.auto_prefix);
    }

    #[test]
    fn test_from_json_file_missing() {
        let result = from_json_file("/nonexistent/stapler.json");
        assert!(matches!(result, Err(StaplerError::ConfigurationError(_))));
    }

    #[test]
    fn test_from_toml_file_missing() {
        let result = from_toml_file("/nonexistent/stapler.toml");
        assert!(matches!(result, Err(StaplerError::ConfigurationError(_))));
    }

    #[test]
    fn test_apply_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("STAPLER_DEBUG", "0"),
            ("STAPLER_LOG_LEVEL", "warn"),
            ("STAPLER_DATABASE_NAME", "/tmp/bikes.sqlite3"),
            ("STAPLER_FORMS_AUTO_PREFIX", "no"),
        ]);
        let mut settings = Settings::default();
        apply_overrides(&mut settings, |k| vars.get(k).map(|v| (*v).to_string()));

        assert!(!settings.debug);
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.default_database().unwrap().name, "/tmp/bikes.sqlite3");
        assert!(!settings.forms.auto_prefix);
    }

    #[test]
    fn test_apply_overrides_absent_keys_keep_values() {
        let mut settings = Settings::default();
        apply_overrides(&mut settings, |_| None);
        assert!(settings.debug);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_merge_json_nested() {
        let base = serde_json::json!({"a": {"b": 1, "c": 2}, "d": 3});
        let over = serde_json::json!({"a": {"b": 10}});
        let merged = merge_json(base, over);
        assert_eq!(merged, serde_json::json!({"a": {"b": 10, "c": 2}, "d": 3}));
    }
}
