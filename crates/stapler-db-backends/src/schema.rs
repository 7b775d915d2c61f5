//! SQLite DDL for model tables.
//!
//! Foreign keys and join-table columns reference the `"id"` column of the
//! related table.

use stapler_core::StaplerResult;
use stapler_db::fields::{table_for_reference, FieldType};
use stapler_db::model::ModelMeta;

/// Generates `CREATE TABLE IF NOT EXISTS` for a model's concrete fields.
pub fn create_table_sql(meta: &ModelMeta) -> String {
    let table_name = &meta.db_table;
    let mut col_defs: Vec<String> = Vec::new();
    let mut constraints: Vec<String> = Vec::new();

    for field in meta.concrete_fields() {
        let Some(type_str) = field.field_type.sqlite_column_type() else {
            continue;
        };

        let mut parts = vec![format!("\"{}\" {type_str}", field.column)];

        if field.primary_key {
            parts.push("PRIMARY KEY".to_string());
            if field.field_type.is_auto() {
                parts.push("AUTOINCREMENT".to_string());
            }
        } else if !field.null {
            parts.push("NOT NULL".to_string());
        }

        if field.unique && !field.primary_key {
            parts.push("UNIQUE".to_string());
        }

        if let FieldType::ForeignKey { to, on_delete } = &field.field_type {
            constraints.push(format!(
                "FOREIGN KEY (\"{}\") REFERENCES \"{}\" (\"id\") ON DELETE {}",
                field.column,
                table_for_reference(to),
                on_delete.as_sql()
            ));
        }

        col_defs.push(parts.join(" "));
    }

    col_defs.extend(constraints);
    let body = col_defs.join(", ");
    format!("CREATE TABLE IF NOT EXISTS \"{table_name}\" ({body})")
}

/// Generates one `CREATE TABLE IF NOT EXISTS` per many-to-many field.
///
/// # Errors
///
/// Propagates join-table resolution errors from [`ModelMeta::many_to_many_table`].
pub fn create_many_to_many_sql(meta: &ModelMeta) -> StaplerResult<Vec<String>> {
    meta.many_to_many()
        .map(|field| {
            let join = meta.many_to_many_table(field.name)?;
            Ok(format!(
                "CREATE TABLE IF NOT EXISTS \"{table}\" (\
                 \"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
                 \"{src}\" INTEGER NOT NULL, \
                 \"{dst}\" INTEGER NOT NULL, \
                 FOREIGN KEY (\"{src}\") REFERENCES \"{src_table}\" (\"id\") ON DELETE CASCADE, \
                 FOREIGN KEY (\"{dst}\") REFERENCES \"{dst_table}\" (\"id\") ON DELETE CASCADE, \
                 UNIQUE (\"{src}\", \"{dst}\"))",
                table = join.table,
                src = join.source_column,
                dst = join.target_column,
                src_table = join.source_table,
                dst_table = join.target_table,
            ))
        })
        .collect()
}
