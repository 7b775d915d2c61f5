//! Result rows and typed column access.

use stapler_core::{StaplerError, StaplerResult};

use crate::value::Value;

/// A single result row: column names paired with values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a new row from column names and values.
    ///
    /// Both vectors are expected to have the same length; surplus entries on
    /// either side are unreachable through [`get`](Row::get).
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(
            columns.len(),
            values.len(),
            "Row column count must match value count"
        );
        Self { columns, values }
    }

    /// Returns the column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Gets a typed value by column name.
    ///
    /// # Errors
    ///
    /// Returns an error if the column does not exist or the value cannot be
    /// converted to the requested type.
    pub fn get<T: FromValue>(&self, column: &str) -> StaplerResult<T> {
        let value = self.get_raw(column).ok_or_else(|| {
            StaplerError::DatabaseError(format!("Column '{column}' not found in row"))
        })?;
        T::from_value(value)
    }

    /// Gets a typed value by column index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of bounds or the value cannot be
    /// converted to the requested type.
    pub fn get_by_index<T: FromValue>(&self, idx: usize) -> StaplerResult<T> {
        let value = self.values.get(idx).ok_or_else(|| {
            StaplerError::DatabaseError(format!(
                "Column index {idx} out of bounds (row has {} columns)",
                self.values.len()
            ))
        })?;
        T::from_value(value)
    }

    /// Returns the raw value of a column, if present.
    pub fn get_raw(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx))
    }
}

/// Trait for converting a [`Value`] to a concrete Rust type.
pub trait FromValue: Sized {
    /// Attempts to convert a value reference to this type.
    ///
    /// # Errors
    ///
    /// Returns [`StaplerError::DatabaseError`] on a type mismatch.
    fn from_value(value: &Value) -> StaplerResult<Self>;
}

fn mismatch(expected: &str, value: &Value) -> StaplerError {
    StaplerError::DatabaseError(format!("Expected {expected}, got {value:?}"))
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> StaplerResult<Self> {
        match value {
            Value::Int(i) => Ok(*i),
            _ => Err(mismatch("Int", value)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> StaplerResult<Self> {
        match value {
            Value::Int(i) => i32::try_from(*i).map_err(|e| {
                StaplerError::DatabaseError(format!("Int value out of i32 range: {e}"))
            }),
            _ => Err(mismatch("Int", value)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> StaplerResult<Self> {
        value.as_float().ok_or_else(|| mismatch("Float", value))
    }
}

// SQLite has no boolean storage class; 0/1 integers come back from queries.
impl FromValue for bool {
    fn from_value(value: &Value) -> StaplerResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            _ => Err(mismatch("Bool", value)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> StaplerResult<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            _ => Err(mismatch("String", value)),
        }
    }
}

impl FromValue for chrono::NaiveDate {
    fn from_value(value: &Value) -> StaplerResult<Self> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::String(s) => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| StaplerError::DatabaseError(format!("Invalid date '{s}': {e}"))),
            _ => Err(mismatch("Date", value)),
        }
    }
}

impl FromValue for uuid::Uuid {
    fn from_value(value: &Value) -> StaplerResult<Self> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::String(s) => uuid::Uuid::parse_str(s)
                .map_err(|e| StaplerError::DatabaseError(format!("Invalid uuid '{s}': {e}"))),
            _ => Err(mismatch("Uuid", value)),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> StaplerResult<Self> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> StaplerResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bike_row() -> Row {
        Row::new(
            vec!["id".into(), "name".into(), "price".into(), "discontinued".into()],
            vec![
                Value::Int(1),
                Value::from("Propel"),
                Value::Null,
                Value::Int(0),
            ],
        )
    }

    #[test]
    fn test_get_by_name() {
        let row = bike_row();
        assert_eq!(row.get::<i64>("id").unwrap(), 1);
        assert_eq!(row.get::<String>("name").unwrap(), "Propel");
        assert_eq!(row.get::<Option<i64>>("price").unwrap(), None);
        assert!(!row.get::<bool>("discontinued").unwrap());
    }

    #[test]
    fn test_get_missing_column() {
        let row = bike_row();
        assert!(matches!(
            row.get::<i64>("colour"),
            Err(StaplerError::DatabaseError(_))
        ));
    }

    #[test]
    fn test_get_type_mismatch() {
        let row = bike_row();
        assert!(row.get::<i64>("name").is_err());
    }

    #[test]
    fn test_get_by_index() {
        let row = bike_row();
        assert_eq!(row.get_by_index::<String>(1).unwrap(), "Propel");
        assert!(row.get_by_index::<i64>(10).is_err());
    }

    #[test]
    fn test_date_from_text() {
        let v = Value::from("2024-03-01");
        let d = chrono::NaiveDate::from_value(&v).unwrap();
        assert_eq!(d, chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }
}
