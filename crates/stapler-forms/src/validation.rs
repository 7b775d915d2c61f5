//! Field-level validation pass.
//!
//! Runs every field through [`clean_field_values`] and splits the outcome
//! into `cleaned_data` and `errors`. Errors accumulate across fields rather
//! than short-circuiting, so a bound form reports all of its problems at once.

use std::collections::HashMap;

use stapler_db::value::Value;

use crate::fields::{clean_field_values, FormFieldDef};

/// Performs field-level validation for all fields.
///
/// For each field definition:
/// 1. Disabled fields copy their initial value and skip validation
/// 2. Every submitted value for the field is passed to [`clean_field_values`]
/// 3. The result lands in `cleaned_data` on success or `errors` on failure
pub fn clean_fields(
    field_defs: &[FormFieldDef],
    raw_data: &HashMap<String, Vec<String>>,
    cleaned_data: &mut HashMap<String, Value>,
    errors: &mut HashMap<String, Vec<String>>,
) {
    for field in field_defs {
        if field.disabled {
            if let Some(initial) = &field.initial {
                cleaned_data.insert(field.name.clone(), initial.clone());
            }
            continue;
        }

        let raw = raw_data.get(&field.name).map_or(&[][..], Vec::as_slice);

        match clean_field_values(field, raw) {
            Ok(value) => {
                cleaned_data.insert(field.name.clone(), value);
            }
            Err(field_errors) => {
                errors
                    .entry(field.name.clone())
                    .or_default()
                    .extend(field_errors);
            }
        }
    }
}
