//! Query counting assertions for database tests.
//!
//! Useful for checking that an operation writes nothing (an unsaved
//! composite save, an invalid sub-form) or stays within a query budget.
//!
//! ## Example
//!
//! ```rust,no_run
//! use stapler_test::{assert_num_queries, TestDatabase};
//!
//! async fn example() {
//!     let db = TestDatabase::new();
//!     assert_num_queries(&db, 0, || async {}).await;
//! }
//! ```

use std::future::Future;

use crate::test_database::TestDatabase;

/// Asserts that exactly `expected_count` SQL queries are executed during the
/// async closure. The counter is reset first.
///
/// # Panics
///
/// Panics if the number of queries does not match `expected_count`.
pub async fn assert_num_queries<F, Fut>(db: &TestDatabase, expected_count: usize, f: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    db.reset_query_count();
    f().await;
    let actual = db.query_count();
    assert_eq!(
        actual, expected_count,
        "Expected {expected_count} SQL queries, but {actual} were executed"
    );
}

/// Asserts that at most `max_count` SQL queries are executed during the async
/// closure. The counter is reset first.
///
/// # Panics
///
/// Panics if more than `max_count` queries are executed.
pub async fn assert_max_queries<F, Fut>(db: &TestDatabase, max_count: usize, f: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    db.reset_query_count();
    f().await;
    let actual = db.query_count();
    assert!(
        actual <= max_count,
        "Expected at most {max_count} SQL queries, but {actual} were executed"
    );
}
