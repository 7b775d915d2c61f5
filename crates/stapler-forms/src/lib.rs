//! # stapler-forms
//!
//! Form handling for stapler-rs.
//!
//! - [`fields`] - Form field definitions and type-level cleaning
//! - [`validation`] - The field-level validation pass
//! - [`form`] - The async [`Form`](form::Form) trait and [`BaseForm`](form::BaseForm)
//! - [`model_form`] - Forms generated from model metadata that save model instances
//! - [`composite`] - Several model forms merged under prefixes, validated and
//!   saved as one

#![allow(clippy::doc_markdown)]
#![allow(clippy::result_large_err)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_const_for_fn)]

pub mod composite;
pub mod fields;
pub mod form;
pub mod model_form;
pub mod validation;

pub use composite::{
    CompositeForm, CompositeFormBuilder, CompositeFormSpec, CompositeFormSpecBuilder, SaveResult,
    SavedRecord, SubFormSpec, PREFIX_SEPARATOR,
};
pub use fields::{FormFieldDef, FormFieldType};
pub use form::{BaseForm, Form, NON_FIELD_ERRORS};
pub use model_form::{generate_form_fields, ModelForm, ModelFormConfig, ModelFormFields, SubForm};
