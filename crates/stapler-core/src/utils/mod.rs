//! Utility types for stapler-rs.
//!
//! This module provides:
//! - [`MultiValueDict`]: A dictionary that can hold multiple values per key.
//! - [`QueryDict`]: Submitted form data, immutable by default.

mod multi_value_dict;
mod query_dict;

pub use multi_value_dict::MultiValueDict;
pub use query_dict::QueryDict;
