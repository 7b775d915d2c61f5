//! # stapler-db-backends
//!
//! Database backends for stapler-rs. The SQLite backend (feature `sqlite`,
//! on by default) runs `rusqlite` on the blocking thread pool and implements
//! [`DbExecutor`](stapler_db::DbExecutor). [`schema`] generates the DDL for
//! model tables and their many-to-many join tables.

#![allow(clippy::result_large_err)]
#![allow(clippy::doc_markdown)]

pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;
