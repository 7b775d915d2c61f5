//! Field definitions and types for the ORM.
//!
//! [`FieldDef`] and [`FieldType`] describe model fields and their database
//! column mappings. Forms are generated from the same definitions.

use crate::value::Value;

/// The kind of a model field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FieldType {
    /// Auto-incrementing 32-bit integer primary key.
    AutoField,
    /// Auto-incrementing 64-bit integer primary key.
    BigAutoField,
    /// Variable-length string with a max length.
    CharField,
    /// Unlimited-length text.
    TextField,
    /// 32-bit signed integer.
    IntegerField,
    /// 64-bit signed integer.
    BigIntegerField,
    /// 64-bit floating-point number.
    FloatField,
    /// Boolean (true/false).
    BooleanField,
    /// Date without time.
    DateField,
    /// Date and time.
    DateTimeField,
    /// Email address (CharField with email validation).
    EmailField,
    /// Many-to-one relationship.
    ForeignKey {
        /// The target model, as `"app_label.model_name"`.
        to: String,
        /// Behavior when the referenced object is deleted.
        on_delete: OnDelete,
    },
    /// Many-to-many relationship (via intermediate table).
    ManyToManyField {
        /// The target model, as `"app_label.model_name"`.
        to: String,
        /// The name used for the reverse relation.
        related_name: Option<String>,
    },
}

/// Behavior when a referenced object is deleted (ON DELETE action).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OnDelete {
    /// Delete all related objects (CASCADE).
    Cascade,
    /// Prevent deletion if related objects exist (PROTECT).
    Protect,
    /// Set the foreign key to NULL.
    SetNull,
    /// Take no action (may cause integrity errors).
    DoNothing,
}

impl OnDelete {
    /// The SQL `ON DELETE` action.
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::Protect => "RESTRICT",
            Self::SetNull => "SET NULL",
            Self::DoNothing => "NO ACTION",
        }
    }
}

/// Complete definition of a model field, including metadata and constraints.
///
/// Constructed manually when implementing the [`Model`](crate::model::Model)
/// trait, usually inside the model's static `ModelMeta`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// The attribute name of this field.
    pub name: &'static str,
    /// The database column name. Foreign keys default to `<name>_id`.
    pub column: String,
    /// The type of this field.
    pub field_type: FieldType,
    /// Whether this field is the primary key.
    pub primary_key: bool,
    /// Whether NULL is allowed in the database.
    pub null: bool,
    /// Whether the field may be left blank in forms.
    pub blank: bool,
    /// Default value for new instances.
    pub default: Option<Value>,
    /// Whether a UNIQUE constraint is applied.
    pub unique: bool,
    /// Maximum character length (for CharField and similar).
    pub max_length: Option<usize>,
    /// Human-readable help text.
    pub help_text: String,
    /// Human-readable name for the field.
    pub verbose_name: String,
    /// Whether the field is editable in forms.
    pub editable: bool,
}

impl FieldDef {
    /// Creates a new `FieldDef` with sensible defaults.
    ///
    /// Only the field name and type are required. All other attributes take
    /// their default values (non-null, editable, etc.).
    pub fn new(name: &'static str, field_type: FieldType) -> Self {
        let column = if matches!(field_type, FieldType::ForeignKey { .. }) {
            format!("{name}_id")
        } else {
            name.to_string()
        };
        Self {
            name,
            column,
            field_type,
            primary_key: false,
            null: false,
            blank: false,
            default: None,
            unique: false,
            max_length: None,
            help_text: String::new(),
            verbose_name: name.replace('_', " "),
            editable: true,
        }
    }

    /// Sets the database column name.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Marks this field as the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.editable = false;
        self
    }

    /// Allows NULL values in the database.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.null = true;
        self
    }

    /// Allows the field to be left blank in forms.
    #[must_use]
    pub const fn blank(mut self) -> Self {
        self.blank = true;
        self
    }

    /// Sets the maximum character length.
    #[must_use]
    pub const fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Marks this field as having a UNIQUE constraint.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets the default value for this field.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the verbose (human-readable) name.
    #[must_use]
    pub fn verbose_name(mut self, name: impl Into<String>) -> Self {
        self.verbose_name = name.into();
        self
    }

    /// Sets the help text.
    #[must_use]
    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = text.into();
        self
    }

    /// Excludes this field from generated forms.
    #[must_use]
    pub const fn not_editable(mut self) -> Self {
        self.editable = false;
        self
    }

    /// The attribute name holding this field's raw value.
    ///
    /// `<name>_id` for foreign keys, the field name otherwise.
    pub fn attname(&self) -> String {
        match self.field_type {
            FieldType::ForeignKey { .. } => format!("{}_id", self.name),
            _ => self.name.to_string(),
        }
    }

    /// Returns `true` if this field represents a relational field.
    pub const fn is_relation(&self) -> bool {
        matches!(
            self.field_type,
            FieldType::ForeignKey { .. } | FieldType::ManyToManyField { .. }
        )
    }

    /// Returns `true` for many-to-many fields, which have no column.
    pub const fn is_many_to_many(&self) -> bool {
        matches!(self.field_type, FieldType::ManyToManyField { .. })
    }

    /// The related model reference (`"app_label.model_name"`) for relations.
    pub fn related_model(&self) -> Option<&str> {
        match &self.field_type {
            FieldType::ForeignKey { to, .. } | FieldType::ManyToManyField { to, .. } => Some(to),
            _ => None,
        }
    }
}

impl FieldType {
    /// Returns the SQL column type on SQLite.
    ///
    /// Many-to-many fields have no column and yield `None`.
    pub const fn sqlite_column_type(&self) -> Option<&'static str> {
        match self {
            Self::AutoField
            | Self::BigAutoField
            | Self::IntegerField
            | Self::BigIntegerField
            | Self::BooleanField
            | Self::ForeignKey { .. } => Some("INTEGER"),
            Self::CharField | Self::TextField | Self::EmailField => Some("TEXT"),
            Self::FloatField => Some("REAL"),
            Self::DateField | Self::DateTimeField => Some("TEXT"),
            Self::ManyToManyField { .. } => None,
        }
    }

    /// Returns `true` for auto-incrementing key types.
    pub const fn is_auto(&self) -> bool {
        matches!(self, Self::AutoField | Self::BigAutoField)
    }
}

/// Converts an `"app_label.model_name"` reference into its default table name.
///
/// ```
/// use stapler_db::fields::table_for_reference;
///
/// assert_eq!(table_for_reference("shop.Country"), "shop_country");
/// ```
pub fn table_for_reference(reference: &str) -> String {
    reference.replace('.', "_").to_lowercase()
}

/// The model name part of an `"app_label.model_name"` reference, lowercased.
pub fn model_name_for_reference(reference: &str) -> String {
    reference
        .rsplit('.')
        .next()
        .unwrap_or(reference)
        .to_lowercase()
}
