//! Model trait and metadata for the ORM.
//!
//! The [`Model`] trait is the core abstraction that all ORM models implement.
//! It provides access to metadata, field values, and construction from database
//! rows. [`ModelMeta`] captures the model's options: table name, verbose name
//! and the field list.

use stapler_core::{StaplerError, StaplerResult};

use crate::fields::{model_name_for_reference, table_for_reference, FieldDef, FieldType};
use crate::row::Row;
use crate::value::Value;

/// The core trait for all ORM models.
///
/// # Examples
///
/// ```
/// use std::sync::LazyLock;
///
/// use stapler_core::{StaplerError, StaplerResult};
/// use stapler_db::fields::{FieldDef, FieldType};
/// use stapler_db::model::{Model, ModelMeta};
/// use stapler_db::row::Row;
/// use stapler_db::value::Value;
///
/// #[derive(Default)]
/// struct Country {
///     id: Option<i64>,
///     name: String,
/// }
///
/// impl Model for Country {
///     fn meta() -> &'static ModelMeta {
///         static META: LazyLock<ModelMeta> = LazyLock::new(|| {
///             ModelMeta::new("shop", "country", vec![
///                 FieldDef::new("id", FieldType::BigAutoField).primary_key(),
///                 FieldDef::new("name", FieldType::CharField).max_length(100),
///             ])
///         });
///         &META
///     }
///
///     fn pk(&self) -> Option<Value> { self.id.map(Value::Int) }
///     fn set_pk(&mut self, value: Value) { self.id = value.as_int(); }
///
///     fn field_values(&self) -> Vec<(&'static str, Value)> {
///         vec![("id", self.id.into()), ("name", self.name.clone().into())]
///     }
///
///     fn set_field_value(&mut self, name: &str, value: Value) -> StaplerResult<()> {
///         match name {
///             "name" => self.name = value.as_str().unwrap_or_default().to_string(),
///             other => return Err(StaplerError::DatabaseError(format!("no field {other}"))),
///         }
///         Ok(())
///     }
///
///     fn from_row(row: &Row) -> StaplerResult<Self> {
///         Ok(Self { id: row.get("id")?, name: row.get("name")? })
///     }
/// }
///
/// assert_eq!(Country::table_name(), "shop_country");
/// ```
pub trait Model: Send + Sync + 'static {
    /// Returns the static metadata for this model type.
    fn meta() -> &'static ModelMeta;

    /// Returns the database table name.
    fn table_name() -> &'static str {
        Self::meta().db_table.as_str()
    }

    /// Returns the application label this model belongs to.
    fn app_label() -> &'static str {
        Self::meta().app_label
    }

    /// Returns the primary key value, or `None` if unsaved.
    fn pk(&self) -> Option<Value>;

    /// Sets the primary key value on this instance (used after INSERT).
    fn set_pk(&mut self, value: Value);

    /// Returns the column name of the primary key (e.g., "id").
    fn pk_field_name() -> &'static str {
        Self::meta().pk_field().map_or("id", |f| f.name)
    }

    /// Returns all column-value pairs for this instance.
    ///
    /// Many-to-many fields are not columns and are never included.
    fn field_values(&self) -> Vec<(&'static str, Value)>;

    /// Returns column-value pairs excluding the primary key.
    /// Used for INSERT operations where the PK is auto-generated.
    fn non_pk_field_values(&self) -> Vec<(&'static str, Value)> {
        let pk_name = Self::pk_field_name();
        self.field_values()
            .into_iter()
            .filter(|(name, _)| *name != pk_name)
            .collect()
    }

    /// Returns the current value of a concrete field, looked up by field name.
    fn field_value(&self, name: &str) -> Option<Value> {
        let column = Self::meta().get_field(name)?.column.as_str();
        self.field_values()
            .into_iter()
            .find_map(|(col, value)| (col == column).then_some(value))
    }

    /// Assigns a concrete field from a cleaned form value.
    ///
    /// Foreign keys receive the related primary key.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a settable field or the value has
    /// the wrong shape.
    fn set_field_value(&mut self, name: &str, value: Value) -> StaplerResult<()>;

    /// Constructs a model instance from a database row.
    ///
    /// # Errors
    ///
    /// Returns an error if a column is missing or has an unexpected type.
    fn from_row(row: &Row) -> StaplerResult<Self>
    where
        Self: Sized;
}

/// Metadata about a model: table name, names and fields.
#[derive(Debug, Clone)]
pub struct ModelMeta {
    /// The application label (e.g., "shop").
    pub app_label: &'static str,
    /// The model name in lowercase (e.g., "bike").
    pub model_name: &'static str,
    /// The database table name.
    pub db_table: String,
    /// Human-readable singular name.
    pub verbose_name: String,
    /// Field definitions for this model, in declaration order.
    pub fields: Vec<FieldDef>,
}

impl ModelMeta {
    /// Creates metadata with the default table name `<app_label>_<model_name>`.
    pub fn new(app_label: &'static str, model_name: &'static str, fields: Vec<FieldDef>) -> Self {
        Self {
            app_label,
            model_name,
            db_table: format!("{app_label}_{model_name}"),
            verbose_name: model_name.replace('_', " "),
            fields,
        }
    }

    /// Overrides the database table name.
    #[must_use]
    pub fn db_table(mut self, table: impl Into<String>) -> Self {
        self.db_table = table.into();
        self
    }

    /// Overrides the verbose name.
    #[must_use]
    pub fn verbose_name(mut self, name: impl Into<String>) -> Self {
        self.verbose_name = name.into();
        self
    }

    /// The `"app_label.model_name"` label of this model.
    pub fn label(&self) -> String {
        format!("{}.{}", self.app_label, self.model_name)
    }

    /// Fields stored as columns of this model's table.
    pub fn concrete_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.is_many_to_many())
    }

    /// Many-to-many fields, stored in join tables.
    pub fn many_to_many(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.is_many_to_many())
    }

    /// Looks up a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The primary key field, if declared.
    pub fn pk_field(&self) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.primary_key)
    }

    /// Resolves the join table of a many-to-many field.
    ///
    /// # Errors
    ///
    /// Returns [`StaplerError::DatabaseError`] if `field` is not a
    /// many-to-many field of this model.
    pub fn many_to_many_table(&self, field: &str) -> StaplerResult<ManyToManyTable> {
        let def = self.get_field(field).ok_or_else(|| {
            StaplerError::DatabaseError(format!("{} has no field named '{field}'", self.label()))
        })?;
        let FieldType::ManyToManyField { to, .. } = &def.field_type else {
            return Err(StaplerError::DatabaseError(format!(
                "{}.{field} is not a many-to-many field",
                self.label()
            )));
        };

        let target_model = model_name_for_reference(to);
        let (source_column, target_column) = if target_model == self.model_name {
            (
                format!("from_{target_model}_id"),
                format!("to_{target_model}_id"),
            )
        } else {
            (
                format!("{}_id", self.model_name),
                format!("{target_model}_id"),
            )
        };

        Ok(ManyToManyTable {
            table: format!("{}_{field}", self.db_table),
            source_table: self.db_table.clone(),
            source_column,
            target_table: table_for_reference(to),
            target_column,
        })
    }
}

/// The join table behind a many-to-many field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManyToManyTable {
    /// Join table name, `<db_table>_<field>`.
    pub table: String,
    /// Table of the model declaring the field.
    pub source_table: String,
    /// Column referencing the declaring model.
    pub source_column: String,
    /// Table of the related model.
    pub target_table: String,
    /// Column referencing the related model.
    pub target_column: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::OnDelete;

    fn bike_meta() -> ModelMeta {
        ModelMeta::new(
            "shop",
            "bike",
            vec![
                FieldDef::new("id", FieldType::BigAutoField).primary_key(),
                FieldDef::new("name", FieldType::CharField).max_length(100),
                FieldDef::new(
                    "manufacturer",
                    FieldType::ForeignKey {
                        to: "shop.manufacturer".into(),
                        on_delete: OnDelete::Cascade,
                    },
                )
                .nullable(),
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

    #[test]
    fn test_meta_defaults() {
        let meta = bike_meta();
        assert_eq!(meta.db_table, "shop_bike");
        assert_eq!(meta.label(), "shop.bike");
        assert_eq!(meta.pk_field().map(|f| f.name), Some("id"));
    }

    #[test]
    fn test_concrete_and_m2m_split() {
        let meta = bike_meta();
        let concrete: Vec<_> = meta.concrete_fields().map(|f| f.name).collect();
        assert_eq!(concrete, vec!["id", "name", "manufacturer"]);
        let m2m: Vec<_> = meta.many_to_many().map(|f| f.name).collect();
        assert_eq!(m2m, vec!["countries"]);
    }

    #[test]
    fn test_many_to_many_table() {
        let meta = bike_meta();
        let t = meta.many_to_many_table("countries").unwrap();
        assert_eq!(t.table, "shop_bike_countries");
        assert_eq!(t.source_column, "bike_id");
        assert_eq!(t.target_table, "shop_country");
        assert_eq!(t.target_column, "country_id");
    }

    #[test]
    fn test_many_to_many_table_self_referential() {
        let meta = ModelMeta::new(
            "shop",
            "bike",
            vec![FieldDef::new(
                "successors",
                FieldType::ManyToManyField {
                    to: "shop.bike".into(),
                    related_name: None,
                },
            )],
        );
        let t = meta.many_to_many_table("successors").unwrap();
        assert_eq!(t.source_column, "from_bike_id");
        assert_eq!(t.target_column, "to_bike_id");
    }

    #[test]
    fn test_many_to_many_table_rejects_concrete_field() {
        let meta = bike_meta();
        assert!(meta.many_to_many_table("name").is_err());
        assert!(meta.many_to_many_table("missing").is_err());
    }
}
