//! Database executor trait and model CRUD operations.
//!
//! [`DbExecutor`] is the minimal async interface the ORM needs from a
//! backend. The free functions in this module implement save/create/delete/
//! refresh for model instances, simple retrieval, and many-to-many writes on
//! top of it.
//!
//! The `DbExecutor` trait is implemented by backend types (e.g.,
//! `SqliteBackend`) in the `stapler-db-backends` crate.

use stapler_core::{StaplerError, StaplerResult};

use crate::compiler::{Condition, DatabaseBackendType, OrderBy, Query, SqlCompiler};
use crate::model::{Model, ModelMeta};
use crate::row::Row;
use crate::value::Value;

/// Minimal async database executor trait.
///
/// This is the bridge between the ORM layer (`stapler-db`) and the concrete
/// database backends (`stapler-db-backends`). Model CRUD functions and forms
/// accept `&dyn DbExecutor`, which backends implement.
#[async_trait::async_trait]
pub trait DbExecutor: Send + Sync {
    /// Returns the backend type for SQL compilation.
    fn backend_type(&self) -> DatabaseBackendType;

    /// Runs a SQL statement that does not return rows.
    /// Returns the number of rows affected.
    async fn execute_sql(&self, sql: &str, params: &[Value]) -> StaplerResult<u64>;

    /// Runs a SQL query and returns all result rows.
    async fn query(&self, sql: &str, params: &[Value]) -> StaplerResult<Vec<Row>>;

    /// Runs a SQL query and returns exactly one row.
    /// Returns `DoesNotExist` if no rows, `MultipleObjectsReturned` if more than one.
    async fn query_one(&self, sql: &str, params: &[Value]) -> StaplerResult<Row> {
        let mut rows = self.query(sql, params).await?;
        match rows.len() {
            0 => Err(StaplerError::DoesNotExist("Query returned no rows".to_string())),
            1 => Ok(rows.remove(0)),
            n => Err(StaplerError::MultipleObjectsReturned(format!(
                "Query returned {n} rows, expected 1"
            ))),
        }
    }

    /// Executes an INSERT and returns the last inserted row ID.
    ///
    /// The default queries `last_insert_rowid()`; backends override it when
    /// they have a better way.
    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> StaplerResult<Value> {
        self.execute_sql(sql, params).await?;
        let row = self.query("SELECT last_insert_rowid() AS id", &[]).await?;
        if let Some(r) = row.into_iter().next() {
            r.get::<Value>("id")
        } else {
            Err(StaplerError::DatabaseError(
                "Failed to retrieve last inserted ID".to_string(),
            ))
        }
    }
}

fn saved_pk<M: Model>(model: &M) -> Option<Value> {
    model.pk().filter(|pk| !pk.is_null())
}

// ── Model CRUD free functions ──────────────────────────────────────────

/// Saves a model instance to the database.
///
/// If the primary key is set, performs an UPDATE of all non-pk columns; if no
/// row matched, the instance is inserted with its primary key. If the primary
/// key is unset, performs an INSERT and assigns the generated key.
///
/// Returns `true` when a row was created.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub async fn save_model<M: Model>(model: &mut M, db: &dyn DbExecutor) -> StaplerResult<bool> {
    let compiler = SqlCompiler::new(db.backend_type());

    let Some(pk_value) = saved_pk(model) else {
        create_model(model, db).await?;
        return Ok(true);
    };

    let fields = model.non_pk_field_values();
    let conditions = [Condition::Exact(M::pk_field_name().to_string(), pk_value)];

    if !fields.is_empty() {
        let (sql, params) = compiler.compile_update(M::table_name(), &fields, &conditions);
        if db.execute_sql(&sql, &params).await? > 0 {
            return Ok(false);
        }
    } else {
        let query = Query::new(M::table_name()).filter(conditions[0].clone());
        let (sql, params) = compiler.compile_count(&query);
        if db.query_one(&sql, &params).await?.get::<i64>("count")? > 0 {
            return Ok(false);
        }
    }

    let all_fields = model.field_values();
    let (sql, params) = compiler.compile_insert(M::table_name(), &all_fields);
    db.execute_sql(&sql, &params).await?;
    Ok(true)
}

/// Creates a new model instance in the database via INSERT.
///
/// Always inserts the non-pk columns and sets the PK from the returned value.
///
/// # Errors
///
/// Returns an error if the INSERT fails.
pub async fn create_model<M: Model>(model: &mut M, db: &dyn DbExecutor) -> StaplerResult<()> {
    let compiler = SqlCompiler::new(db.backend_type());
    let fields = model.non_pk_field_values();
    let (sql, params) = compiler.compile_insert(M::table_name(), &fields);
    let pk = db.insert_returning_id(&sql, &params).await?;
    model.set_pk(pk);
    Ok(())
}

/// Deletes a model instance from the database.
///
/// # Errors
///
/// Returns an error if the PK is not set or the DELETE fails.
pub async fn delete_model<M: Model>(model: &M, db: &dyn DbExecutor) -> StaplerResult<u64> {
    let pk_value = saved_pk(model).ok_or_else(|| {
        StaplerError::DatabaseError("Cannot delete a model without a primary key".to_string())
    })?;
    let compiler = SqlCompiler::new(db.backend_type());
    let (sql, params) = compiler.compile_delete(
        M::table_name(),
        &[Condition::Exact(M::pk_field_name().to_string(), pk_value)],
    );
    db.execute_sql(&sql, &params).await
}

/// Refreshes a model instance from the database.
///
/// # Errors
///
/// Returns an error if the PK is not set or the record does not exist.
pub async fn refresh_model<M: Model>(model: &mut M, db: &dyn DbExecutor) -> StaplerResult<()> {
    let pk_value = saved_pk(model).ok_or_else(|| {
        StaplerError::DatabaseError("Cannot refresh a model without a primary key".to_string())
    })?;
    *model = get_by_pk::<M>(db, pk_value).await?;
    Ok(())
}

/// Fetches one instance by primary key.
///
/// # Errors
///
/// Returns [`StaplerError::DoesNotExist`] if no row has that key.
pub async fn get_by_pk<M: Model>(db: &dyn DbExecutor, pk: impl Into<Value>) -> StaplerResult<M> {
    let compiler = SqlCompiler::new(db.backend_type());
    let query = Query::new(M::table_name())
        .filter(Condition::Exact(M::pk_field_name().to_string(), pk.into()))
        .limit(1);
    let (sql, params) = compiler.compile_select(&query);
    let row = db.query_one(&sql, &params).await.map_err(|e| match e {
        StaplerError::DoesNotExist(_) => StaplerError::DoesNotExist(format!(
            "{} matching query does not exist.",
            M::meta().verbose_name
        )),
        other => other,
    })?;
    M::from_row(&row)
}

/// Fetches every instance, ordered by primary key.
///
/// # Errors
///
/// Returns an error if the query fails or a row cannot be converted.
pub async fn all<M: Model>(db: &dyn DbExecutor) -> StaplerResult<Vec<M>> {
    let compiler = SqlCompiler::new(db.backend_type());
    let query = Query::new(M::table_name()).order_by(OrderBy::asc(M::pk_field_name()));
    let (sql, params) = compiler.compile_select(&query);
    db.query(&sql, &params)
        .await?
        .iter()
        .map(M::from_row)
        .collect()
}

/// Fetches the instance with the lowest primary key, if any.
///
/// # Errors
///
/// Returns an error if the query fails or the row cannot be converted.
pub async fn first<M: Model>(db: &dyn DbExecutor) -> StaplerResult<Option<M>> {
    let compiler = SqlCompiler::new(db.backend_type());
    let query = Query::new(M::table_name())
        .order_by(OrderBy::asc(M::pk_field_name()))
        .limit(1);
    let (sql, params) = compiler.compile_select(&query);
    db.query(&sql, &params)
        .await?
        .first()
        .map(M::from_row)
        .transpose()
}

/// Counts the rows of a model's table.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn count<M: Model>(db: &dyn DbExecutor) -> StaplerResult<i64> {
    let compiler = SqlCompiler::new(db.backend_type());
    let (sql, params) = compiler.compile_count(&Query::new(M::table_name()));
    db.query_one(&sql, &params).await?.get::<i64>("count")
}

// ── Many-to-many ───────────────────────────────────────────────────────

/// Replaces the related set of a many-to-many field.
///
/// Existing join rows of `pk` are removed and one row per distinct target is
/// inserted, in the given order.
///
/// # Errors
///
/// Returns [`StaplerError::DatabaseError`] if `pk` is null (the record has not
/// been saved yet) or `field` is not a many-to-many field; otherwise any
/// error from the backend, such as a foreign key violation for an unknown
/// target.
pub async fn set_many_to_many(
    db: &dyn DbExecutor,
    meta: &ModelMeta,
    field: &str,
    pk: &Value,
    targets: &[Value],
) -> StaplerResult<()> {
    if pk.is_null() {
        return Err(StaplerError::DatabaseError(format!(
            "\"{}\" needs a primary key before the many-to-many relation '{field}' can be used.",
            meta.label()
        )));
    }
    let join = meta.many_to_many_table(field)?;
    let compiler = SqlCompiler::new(db.backend_type());

    let (sql, params) = compiler.compile_delete(
        &join.table,
        &[Condition::Exact(join.source_column.clone(), pk.clone())],
    );
    db.execute_sql(&sql, &params).await?;

    let mut seen: Vec<&Value> = Vec::with_capacity(targets.len());
    for target in targets {
        if target.is_null() || seen.contains(&target) {
            continue;
        }
        seen.push(target);
        let (sql, params) = compiler.compile_insert(
            &join.table,
            &[
                (join.source_column.as_str(), pk.clone()),
                (join.target_column.as_str(), target.clone()),
            ],
        );
        db.execute_sql(&sql, &params).await?;
    }

    tracing::debug!(
        table = %join.table,
        pk = %pk,
        count = seen.len(),
        "many-to-many relation replaced"
    );
    Ok(())
}

/// Lists the related primary keys of a many-to-many field, ascending.
///
/// # Errors
///
/// Returns an error if `field` is not a many-to-many field or the query fails.
pub async fn many_to_many_ids(
    db: &dyn DbExecutor,
    meta: &ModelMeta,
    field: &str,
    pk: &Value,
) -> StaplerResult<Vec<Value>> {
    let join = meta.many_to_many_table(field)?;
    let compiler = SqlCompiler::new(db.backend_type());
    let query = Query::new(join.table)
        .columns([join.target_column.clone()])
        .filter(Condition::Exact(join.source_column, pk.clone()))
        .order_by(OrderBy::asc(join.target_column.clone()));
    let (sql, params) = compiler.compile_select(&query);
    db.query(&sql, &params)
        .await?
        .iter()
        .map(|row| row.get::<Value>(&join.target_column))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // DbExecutor must stay object-safe.
    fn _assert_object_safe(_: &dyn DbExecutor) {}

    /// Records statements and answers queries with canned rows.
    #[derive(Default)]
    struct Recorder {
        statements: Mutex<Vec<(String, Vec<Value>)>>,
        affected: u64,
        rows: Vec<Row>,
    }

    impl Recorder {
        fn statements(&self) -> Vec<(String, Vec<Value>)> {
            self.statements.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl DbExecutor for Recorder {
        fn backend_type(&self) -> DatabaseBackendType {
            DatabaseBackendType::SQLite
        }

        async fn execute_sql(&self, sql: &str, params: &[Value]) -> StaplerResult<u64> {
            self.statements
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
            Ok(self.affected)
        }

        async fn query(&self, sql: &str, params: &[Value]) -> StaplerResult<Vec<Row>> {
            self.statements
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
            Ok(self.rows.clone())
        }

        async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> StaplerResult<Value> {
            self.execute_sql(sql, params).await?;
            Ok(Value::Int(42))
        }
    }

    fn bike_meta() -> ModelMeta {
        use crate::fields::{FieldDef, FieldType};
        ModelMeta::new(
            "shop",
            "bike",
            vec![
                FieldDef::new("id", FieldType::BigAutoField).primary_key(),
                FieldDef::new(
                    "countries",
                    FieldType::ManyToManyField {
                        to: "shop.country".into(),
                        related_name: None,
                    },
                ),
            ],
        )
    }

    #[tokio::test]
    async fn test_set_many_to_many_requires_pk() {
        let db = Recorder::default();
        let result =
            set_many_to_many(&db, &bike_meta(), "countries", &Value::Null, &[Value::Int(1)]).await;
        assert!(matches!(result, Err(StaplerError::DatabaseError(_))));
        assert!(db.statements().is_empty());
    }

    #[tokio::test]
    async fn test_set_many_to_many_replaces_and_dedupes() {
        let db = Recorder::default();
        set_many_to_many(
            &db,
            &bike_meta(),
            "countries",
            &Value::Int(7),
            &[Value::Int(1), Value::Int(2), Value::Int(1)],
        )
        .await
        .unwrap();

        let statements = db.statements();
        assert_eq!(statements.len(), 3);
        assert_eq!(
            statements[0].0,
            "DELETE FROM \"shop_bike_countries\" WHERE \"bike_id\" = ?"
        );
        assert_eq!(
            statements[1].0,
            "INSERT INTO \"shop_bike_countries\" (\"bike_id\", \"country_id\") VALUES (?, ?)"
        );
        assert_eq!(statements[2].1, vec![Value::Int(7), Value::Int(2)]);
    }

    #[tokio::test]
    async fn test_many_to_many_ids_reads_target_column() {
        let db = Recorder {
            rows: vec![
                Row::new(vec!["country_id".into()], vec![Value::Int(1)]),
                Row::new(vec!["country_id".into()], vec![Value::Int(3)]),
            ],
            ..Recorder::default()
        };
        let ids = many_to_many_ids(&db, &bike_meta(), "countries", &Value::Int(7))
            .await
            .unwrap();
        assert_eq!(ids, vec![Value::Int(1), Value::Int(3)]);
        assert_eq!(
            db.statements()[0].0,
            "SELECT \"country_id\" FROM \"shop_bike_countries\" WHERE \"bike_id\" = ? \
             ORDER BY \"country_id\" ASC"
        );
    }

    #[tokio::test]
    async fn test_query_one_default_reports_missing_and_multiple() {
        let empty = Recorder::default();
        assert!(matches!(
            empty.query_one("SELECT 1", &[]).await,
            Err(StaplerError::DoesNotExist(_))
        ));

        let row = Row::new(vec!["id".into()], vec![Value::Int(1)]);
        let many = Recorder {
            rows: vec![row.clone(), row],
            ..Recorder::default()
        };
        assert!(matches!(
            many.query_one("SELECT 1", &[]).await,
            Err(StaplerError::MultipleObjectsReturned(_))
        ));
    }
}
