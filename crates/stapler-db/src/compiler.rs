//! SQL compilation.
//!
//! [`SqlCompiler`] turns [`Query`] descriptions and column/value lists into
//! parameterized SQL for a given [`DatabaseBackendType`]. Identifiers are
//! always double-quoted; values are always bound, never inlined.

use crate::value::Value;

/// The SQL dialect, which decides the placeholder style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseBackendType {
    /// PostgreSQL (uses `$1, $2, ...` placeholders).
    PostgreSQL,
    /// SQLite (uses `?` placeholders).
    SQLite,
}

/// A column ordering direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// The column to order by.
    pub column: String,
    /// Whether to sort in descending order.
    pub descending: bool,
}

impl OrderBy {
    /// Creates an ascending order.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    /// Creates a descending order.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// A single WHERE condition. Conditions in a [`Query`] are AND-ed.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `column = value`, or `column IS NULL` for [`Value::Null`].
    Exact(String, Value),
    /// `column IN (values...)`. An empty list matches nothing.
    In(String, Vec<Value>),
}

impl Condition {
    /// Shorthand for [`Condition::Exact`].
    pub fn exact(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Exact(column.into(), value.into())
    }
}

/// A SELECT description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// The table to select from.
    pub table: String,
    /// Selected columns; empty selects `*`.
    pub columns: Vec<String>,
    /// AND-ed conditions.
    pub conditions: Vec<Condition>,
    /// ORDER BY terms.
    pub order_by: Vec<OrderBy>,
    /// Optional LIMIT.
    pub limit: Option<usize>,
}

impl Query {
    /// Selects all columns of `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Restricts the selected columns.
    #[must_use]
    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a condition.
    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Adds an ORDER BY term.
    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// Sets the LIMIT.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Compiles statements for one backend dialect.
#[derive(Debug, Clone, Copy)]
pub struct SqlCompiler {
    backend: DatabaseBackendType,
}

impl SqlCompiler {
    /// Creates a compiler for the given backend.
    pub const fn new(backend: DatabaseBackendType) -> Self {
        Self { backend }
    }

    fn placeholder(&self, index: usize) -> String {
        match self.backend {
            DatabaseBackendType::PostgreSQL => format!("${index}"),
            DatabaseBackendType::SQLite => "?".to_string(),
        }
    }

    fn push_param(&self, value: &Value, params: &mut Vec<Value>) -> String {
        params.push(value.clone());
        self.placeholder(params.len())
    }

    /// Compiles an INSERT statement.
    pub fn compile_insert(&self, table: &str, fields: &[(&str, Value)]) -> (String, Vec<Value>) {
        if fields.is_empty() {
            return (format!("INSERT INTO \"{table}\" DEFAULT VALUES"), Vec::new());
        }

        let mut params = Vec::new();
        let columns: Vec<String> = fields.iter().map(|(name, _)| format!("\"{name}\"")).collect();
        let placeholders: Vec<String> = fields
            .iter()
            .map(|(_, val)| self.push_param(val, &mut params))
            .collect();

        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders.join(", ")
        );

        (sql, params)
    }

    /// Compiles an UPDATE statement.
    pub fn compile_update(
        &self,
        table: &str,
        fields: &[(&str, Value)],
        conditions: &[Condition],
    ) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let set_parts: Vec<String> = fields
            .iter()
            .map(|(name, val)| {
                let ph = self.push_param(val, &mut params);
                format!("\"{name}\" = {ph}")
            })
            .collect();

        let mut sql = format!("UPDATE \"{}\" SET {}", table, set_parts.join(", "));
        self.compile_where(conditions, &mut sql, &mut params);
        (sql, params)
    }

    /// Compiles a DELETE statement.
    pub fn compile_delete(&self, table: &str, conditions: &[Condition]) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM \"{table}\"");
        self.compile_where(conditions, &mut sql, &mut params);
        (sql, params)
    }

    /// Compiles a SELECT statement.
    pub fn compile_select(&self, query: &Query) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let columns = if query.columns.is_empty() {
            "*".to_string()
        } else {
            query
                .columns
                .iter()
                .map(|c| format!("\"{c}\""))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("SELECT {columns} FROM \"{}\"", query.table);
        self.compile_where(&query.conditions, &mut sql, &mut params);

        if !query.order_by.is_empty() {
            let terms: Vec<String> = query
                .order_by
                .iter()
                .map(|o| {
                    let dir = if o.descending { "DESC" } else { "ASC" };
                    format!("\"{}\" {dir}", o.column)
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        (sql, params)
    }

    /// Compiles a `SELECT COUNT(*)` over the query's table and conditions.
    ///
    /// The count column is aliased `count`.
    pub fn compile_count(&self, query: &Query) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = format!("SELECT COUNT(*) AS \"count\" FROM \"{}\"", query.table);
        self.compile_where(&query.conditions, &mut sql, &mut params);
        (sql, params)
    }

    fn compile_where(&self, conditions: &[Condition], sql: &mut String, params: &mut Vec<Value>) {
        if conditions.is_empty() {
            return;
        }
        let parts: Vec<String> = conditions
            .iter()
            .map(|cond| match cond {
                Condition::Exact(column, Value::Null) => format!("\"{column}\" IS NULL"),
                Condition::Exact(column, value) => {
                    let ph = self.push_param(value, params);
                    format!("\"{column}\" = {ph}")
                }
                Condition::In(_, values) if values.is_empty() => "0 = 1".to_string(),
                Condition::In(column, values) => {
                    let phs: Vec<String> =
                        values.iter().map(|v| self.push_param(v, params)).collect();
                    format!("\"{column}\" IN ({})", phs.join(", "))
                }
            })
            .collect();
        sql.push_str(" WHERE ");
        sql.push_str(&parts.join(" AND "));
    }
}
