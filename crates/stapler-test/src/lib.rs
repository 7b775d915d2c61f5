//! # stapler-test
//!
//! Testing utilities for stapler-rs: a fresh in-memory database per test
//! ([`TestDatabase`]) that builds its tables from model metadata, and
//! query-count assertions.

#![allow(clippy::result_large_err)]

pub mod assert_queries;
pub mod test_database;

pub use assert_queries::{assert_max_queries, assert_num_queries};
pub use test_database::TestDatabase;
