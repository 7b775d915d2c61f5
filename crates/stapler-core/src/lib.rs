//! # stapler-core
//!
//! Core types, settings, and error types for stapler-rs.
//! This crate has no framework dependencies and provides the foundation for all other crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`utils`] - Form data containers (`MultiValueDict`, `QueryDict`)
//! - [`settings`] - Framework settings and global configuration
//! - [`settings_loader`] - Loading settings from TOML, JSON, and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;
pub mod utils;

// Re-export the most commonly used types at the crate root.
pub use error::{StaplerError, StaplerResult, ValidationError};
pub use settings::{Settings, SETTINGS};
pub use utils::{MultiValueDict, QueryDict};
