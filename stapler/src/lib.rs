//! # stapler
//!
//! Composite model forms for Rust: several model-bound forms merged into one,
//! each under its own field prefix, validated together and saved best-effort.
//!
//! This is the meta-crate that re-exports all sub-crates. Depend on `stapler`
//! for everything, or on individual crates for finer-grained control.

/// Core types: errors, settings, logging, and form data containers.
pub use stapler_core as core;

/// Model metadata, values, SQL compilation, and instance persistence.
#[cfg(feature = "db")]
pub use stapler_db as db;

/// Database backends and schema DDL.
pub use stapler_db_backends as db_backends;

/// Forms, `ModelForms`, and composite forms.
#[cfg(feature = "forms")]
pub use stapler_forms as forms;

/// Testing utilities.
#[cfg(feature = "testing")]
pub use stapler_test as test;

// Third-party crates the public API is written against.
pub use async_trait::async_trait;
pub use chrono;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;
pub use tracing_subscriber;

/// Commonly used items, for glob import.
pub mod prelude {
    pub use stapler_core::{QueryDict, Settings, StaplerError, StaplerResult, ValidationError};

    #[cfg(feature = "db")]
    pub use stapler_db::{DbExecutor, FieldDef, FieldType, Model, ModelMeta, Value};

    #[cfg(feature = "forms")]
    pub use stapler_forms::{
        CompositeForm, CompositeFormSpec, Form, FormFieldDef, FormFieldType, ModelForm,
        ModelFormConfig, SaveResult, SubForm, SubFormSpec,
    };
}
