//! Test database utilities for stapler-rs.
//!
//! Provides [`TestDatabase`], an in-memory SQLite database wrapper for use in
//! tests. It implements [`DbExecutor`] so it can be used with all ORM
//! operations and forms, and adds helper methods for setting up tables from
//! model metadata and counting executed queries.
//!
//! ## Example
//!
//! ```rust,no_run
//! use stapler_test::TestDatabase;
//!
//! async fn example() {
//!     let db = TestDatabase::new();
//!     db.execute_raw("CREATE TABLE shop_country (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
//!         .await
//!         .unwrap();
//! }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use stapler_core::StaplerResult;
use stapler_db::model::ModelMeta;
use stapler_db::{DatabaseBackendType, DbExecutor, Row, Value};
use stapler_db_backends::schema;
use stapler_db_backends::sqlite::SqliteBackend;

/// An in-memory SQLite database for testing.
///
/// Wraps a [`SqliteBackend`] with an `Arc` for sharing and adds a query
/// counter for use with [`assert_num_queries`](crate::assert_num_queries).
/// Clones share the same database and counter.
#[derive(Clone, Debug)]
pub struct TestDatabase {
    backend: Arc<SqliteBackend>,
    query_count: Arc<AtomicUsize>,
}

impl TestDatabase {
    /// Creates a new in-memory SQLite test database.
    ///
    /// # Panics
    ///
    /// Panics if the in-memory database cannot be created.
    pub fn new() -> Self {
        let backend = SqliteBackend::memory().expect("Failed to create in-memory SQLite database");
        Self {
            backend: Arc::new(backend),
            query_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a model's table and its many-to-many join tables.
    ///
    /// Join tables reference the related table, so the related model's table
    /// should be set up first.
    ///
    /// # Errors
    ///
    /// Returns an error if the SQL execution fails.
    pub async fn setup_table(&self, meta: &ModelMeta) -> StaplerResult<()> {
        self.execute_raw(&schema::create_table_sql(meta)).await?;
        for sql in schema::create_many_to_many_sql(meta)? {
            self.execute_raw(&sql).await?;
        }
        Ok(())
    }

    /// Sets up several models in order.
    ///
    /// # Errors
    ///
    /// Returns the first failure.
    pub async fn setup_tables(&self, metas: &[&ModelMeta]) -> StaplerResult<()> {
        for meta in metas {
            self.setup_table(meta).await?;
        }
        Ok(())
    }

    /// Counts the rows of a table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist.
    pub async fn row_count(&self, table: &str) -> StaplerResult<i64> {
        let row = self
            .backend
            .query_one(&format!("SELECT COUNT(*) AS \"count\" FROM \"{table}\""), &[])
            .await?;
        row.get("count")
    }

    /// Executes a raw SQL string with no parameters.
    ///
    /// Increments the query counter.
    ///
    /// # Errors
    ///
    /// Returns an error if the SQL execution fails.
    pub async fn execute_raw(&self, sql: &str) -> StaplerResult<u64> {
        self.query_count.fetch_add(1, Ordering::Relaxed);
        self.backend.execute_sql(sql, &[]).await
    }

    /// Returns the current query count.
    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::Relaxed)
    }

    /// Resets the query counter to zero.
    pub fn reset_query_count(&self) {
        self.query_count.store(0, Ordering::Relaxed);
    }

    /// Returns a reference to the inner `SqliteBackend`.
    pub fn backend(&self) -> &SqliteBackend {
        &self.backend
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DbExecutor for TestDatabase {
    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::SQLite
    }

    async fn execute_sql(&self, sql: &str, params: &[Value]) -> StaplerResult<u64> {
        self.query_count.fetch_add(1, Ordering::Relaxed);
        self.backend.execute_sql(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> StaplerResult<Vec<Row>> {
        self.query_count.fetch_add(1, Ordering::Relaxed);
        self.backend.query(sql, params).await
    }

    async fn query_one(&self, sql: &str, params: &[Value]) -> StaplerResult<Row> {
        self.query_count.fetch_add(1, Ordering::Relaxed);
        self.backend.query_one(sql, params).await
    }

    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> StaplerResult<Value> {
        self.query_count.fetch_add(1, Ordering::Relaxed);
        self.backend.insert_returning_id(sql, params).await
    }
}
