//! Form trait and `BaseForm` implementation.
//!
//! The [`Form`] trait is the core abstraction for every form type: plain
//! field forms, model forms and composite forms. Validation is async so that
//! form-level checks may hit the database.
//!
//! [`BaseForm`] is a concrete implementation built from a list of field
//! definitions. Model forms wrap one.

use std::collections::HashMap;

use async_trait::async_trait;

use stapler_core::QueryDict;
use stapler_db::value::Value;

use crate::fields::FormFieldDef;
use crate::validation;

/// The error key for errors that belong to the form rather than a field.
pub const NON_FIELD_ERRORS: &str = "__all__";

/// The core form trait. All form types implement this.
///
/// Implementations must be `Send + Sync` so forms can be held across await
/// points in multi-threaded runtimes.
#[async_trait]
pub trait Form: Send + Sync {
    /// Returns the form's field definitions.
    fn fields(&self) -> &[FormFieldDef];

    /// Returns the initial (default) values for fields.
    fn initial(&self) -> &HashMap<String, Value>;

    /// Returns the form prefix (for namespacing multiple forms on one page).
    fn prefix(&self) -> Option<&str>;

    /// Binds raw form data to this form.
    ///
    /// Binding again replaces the previous data and clears any validation
    /// state.
    fn bind(&mut self, data: &QueryDict);

    /// Returns `true` if this form has been bound to data.
    fn is_bound(&self) -> bool;

    /// Validates the form asynchronously. Returns `true` if valid.
    ///
    /// An unbound form is never valid. After calling this, `errors()` and
    /// `cleaned_data()` are populated.
    async fn is_valid(&mut self) -> bool;

    /// Returns per-field validation errors.
    ///
    /// Keys are field names, values are lists of error messages. Form-level
    /// errors are stored under [`NON_FIELD_ERRORS`].
    fn errors(&self) -> &HashMap<String, Vec<String>>;

    /// Returns the cleaned (validated and coerced) data.
    fn cleaned_data(&self) -> &HashMap<String, Value>;

    /// Cross-field validation hook. The default implementation does nothing.
    async fn clean(&self) -> Result<(), HashMap<String, Vec<String>>> {
        Ok(())
    }
}

/// A general-purpose form implementation.
///
/// `BaseForm` holds a list of field definitions and manages binding,
/// validation, and cleaned data.
#[derive(Debug, Clone)]
pub struct BaseForm {
    field_defs: Vec<FormFieldDef>,
    initial_data: HashMap<String, Value>,
    prefix: Option<String>,
    bound: bool,
    raw_data: HashMap<String, Vec<String>>,
    errors: HashMap<String, Vec<String>>,
    cleaned_data: HashMap<String, Value>,
}

impl BaseForm {
    /// Creates a new `BaseForm` with the given field definitions.
    pub fn new(fields: Vec<FormFieldDef>) -> Self {
        Self {
            field_defs: fields,
            initial_data: HashMap::new(),
            prefix: None,
            bound: false,
            raw_data: HashMap::new(),
            errors: HashMap::new(),
            cleaned_data: HashMap::new(),
        }
    }

    /// Sets initial (default) values for fields.
    pub fn with_initial(mut self, initial: HashMap<String, Value>) -> Self {
        self.initial_data = initial;
        self
    }

    /// Sets the form prefix. Bound data is then read from `prefix-field` keys.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Mutable access to the initial values.
    pub fn initial_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.initial_data
    }

    /// Returns the last raw value submitted for a field.
    pub fn raw_value(&self, name: &str) -> Option<&str> {
        self.raw_data
            .get(name)
            .and_then(|values| values.last())
            .map(String::as_str)
    }

    /// Returns `true` if the bound data carried a key for this field.
    pub fn was_submitted(&self, name: &str) -> bool {
        self.raw_data.contains_key(name)
    }

    /// Returns the non-field (form-level) errors.
    pub fn non_field_errors(&self) -> &[String] {
        self.errors
            .get(NON_FIELD_ERRORS)
            .map_or(&[], Vec::as_slice)
    }

    fn html_name(&self, field: &str) -> String {
        match &self.prefix {
            Some(p) => format!("{p}-{field}"),
            None => field.to_string(),
        }
    }
}

#[async_trait]
impl Form for BaseForm {
    fn fields(&self) -> &[FormFieldDef] {
        &self.field_defs
    }

    fn initial(&self) -> &HashMap<String, Value> {
        &self.initial_data
    }

    fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    fn bind(&mut self, data: &QueryDict) {
        self.bound = true;
        self.errors.clear();
        self.cleaned_data.clear();

        let raw = self
            .field_defs
            .iter()
            .filter_map(|field| {
                data.get_list(&self.html_name(&field.name))
                    .map(|values| (field.name.clone(), values.clone()))
            })
            .collect();
        self.raw_data = raw;
    }

    fn is_bound(&self) -> bool {
        self.bound
    }

    async fn is_valid(&mut self) -> bool {
        if !self.bound {
            return false;
        }

        self.errors.clear();
        self.cleaned_data.clear();

        validation::clean_fields(
            &self.field_defs,
            &self.raw_data,
            &mut self.cleaned_data,
            &mut self.errors,
        );

        if let Err(form_errors) = self.clean().await {
            for (key, msgs) in form_errors {
                self.errors.entry(key).or_default().extend(msgs);
            }
        }

        self.errors.is_empty()
    }

    fn errors(&self) -> &HashMap<String, Vec<String>> {
        &self.errors
    }

    fn cleaned_data(&self) -> &HashMap<String, Value> {
        &self.cleaned_data
    }
}
