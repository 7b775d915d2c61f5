//! Model-backed forms that auto-generate fields from ORM model metadata.
//!
//! [`ModelFormConfig`] specifies how to generate form fields from a model's
//! [`ModelMeta`]. The [`generate_form_fields`] function creates
//! [`FormFieldDef`] instances from the model's
//! [`FieldDef`](stapler_db::fields::FieldDef) entries, and [`ModelForm`]
//! binds, validates and saves one model instance.
//!
//! [`SubForm`] is the object-safe face of a `ModelForm` that composite forms
//! hold, one per model.

use std::any::Any;
use std::collections::HashMap;

use async_trait::async_trait;

use stapler_core::{QueryDict, StaplerError, StaplerResult, ValidationError};
use stapler_db::executor::{save_model, set_many_to_many, DbExecutor};
use stapler_db::fields::{FieldDef, FieldType};
use stapler_db::model::{Model, ModelMeta};
use stapler_db::value::Value;

use crate::composite::SavedRecord;
use crate::fields::{FormFieldDef, FormFieldType};
use crate::form::{BaseForm, Form};

/// Configuration for generating a model-backed form.
///
/// Specifies which model fields to include/exclude and allows overriding
/// labels and help texts for the generated form fields.
#[derive(Debug, Clone)]
pub struct ModelFormConfig {
    /// The model metadata to generate fields from.
    pub model_meta: &'static ModelMeta,
    /// Which model fields to include in the form.
    pub fields: ModelFormFields,
    /// Label overrides keyed by field name.
    pub labels: HashMap<String, String>,
    /// Help text overrides keyed by field name.
    pub help_texts: HashMap<String, String>,
}

/// Specifies which model fields to include in a `ModelForm`.
#[derive(Debug, Clone)]
pub enum ModelFormFields {
    /// Include all editable fields.
    All,
    /// Include only the specified fields, in the given order.
    Include(Vec<String>),
    /// Include all fields except the specified ones.
    Exclude(Vec<String>),
}

impl ModelFormConfig {
    /// Creates a new `ModelFormConfig` with all fields included.
    pub fn new(model_meta: &'static ModelMeta) -> Self {
        Self {
            model_meta,
            fields: ModelFormFields::All,
            labels: HashMap::new(),
            help_texts: HashMap::new(),
        }
    }

    /// Sets which fields to include.
    pub fn with_fields(mut self, fields: ModelFormFields) -> Self {
        self.fields = fields;
        self
    }

    /// Shorthand for `with_fields(ModelFormFields::Include(..))`.
    pub fn only<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_fields(ModelFormFields::Include(
            fields.into_iter().map(Into::into).collect(),
        ))
    }

    /// Adds a label override for a specific field.
    pub fn with_label(mut self, field_name: impl Into<String>, label: impl Into<String>) -> Self {
        self.labels.insert(field_name.into(), label.into());
        self
    }

    /// Adds a help text override for a specific field.
    pub fn with_help_text(
        mut self,
        field_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.help_texts.insert(field_name.into(), text.into());
        self
    }

    /// Checks that every named field exists on the model.
    ///
    /// # Errors
    ///
    /// Returns [`StaplerError::ImproperlyConfigured`] listing the unknown
    /// field names.
    pub fn validate(&self) -> StaplerResult<()> {
        let named = match &self.fields {
            ModelFormFields::All => return Ok(()),
            ModelFormFields::Include(names) | ModelFormFields::Exclude(names) => names,
        };
        let unknown: Vec<&str> = named
            .iter()
            .filter(|name| self.model_meta.get_field(name).is_none())
            .map(String::as_str)
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(StaplerError::ImproperlyConfigured(format!(
                "Unknown field(s) ({}) specified for {}",
                unknown.join(", "),
                self.model_meta.label()
            )))
        }
    }
}

/// Generates form field definitions from a model form configuration.
///
/// Fields that are not editable or are primary keys are skipped. Foreign
/// keys become [`FormFieldType::ModelChoice`] and many-to-many fields
/// become [`FormFieldType::ModelMultipleChoice`].
pub fn generate_form_fields(config: &ModelFormConfig) -> Vec<FormFieldDef> {
    let meta = config.model_meta;
    let candidates: Vec<&FieldDef> = match &config.fields {
        ModelFormFields::All => meta.fields.iter().collect(),
        ModelFormFields::Include(include) => include
            .iter()
            .filter_map(|name| meta.get_field(name))
            .collect(),
        ModelFormFields::Exclude(exclude) => meta
            .fields
            .iter()
            .filter(|f| !exclude.iter().any(|name| name == f.name))
            .collect(),
    };

    candidates
        .into_iter()
        .filter(|f| f.editable && !f.primary_key)
        .map(|model_field| {
            let mut form_field =
                FormFieldDef::new(model_field.name, model_field_to_form_field_type(model_field));

            form_field.required =
                !model_field.null && !model_field.blank && model_field.default.is_none();

            form_field.label = config
                .labels
                .get(model_field.name)
                .cloned()
                .unwrap_or_else(|| model_field.verbose_name.clone());
            form_field.help_text = config
                .help_texts
                .get(model_field.name)
                .cloned()
                .unwrap_or_else(|| model_field.help_text.clone());
            form_field.initial.clone_from(&model_field.default);

            form_field
        })
        .collect()
}

/// Converts an ORM field type to a form field type.
fn model_field_to_form_field_type(field_def: &FieldDef) -> FormFieldType {
    match &field_def.field_type {
        FieldType::CharField | FieldType::TextField => FormFieldType::char(field_def.max_length),
        FieldType::IntegerField
        | FieldType::BigIntegerField
        | FieldType::AutoField
        | FieldType::BigAutoField => FormFieldType::integer(),
        FieldType::FloatField => FormFieldType::Float {
            min_value: None,
            max_value: None,
        },
        FieldType::BooleanField => FormFieldType::Boolean,
        FieldType::DateField | FieldType::DateTimeField => FormFieldType::Date,
        FieldType::EmailField => FormFieldType::Email,
        FieldType::ForeignKey { to, .. } => FormFieldType::ModelChoice { to: to.clone() },
        FieldType::ManyToManyField { to, .. } => {
            FormFieldType::ModelMultipleChoice { to: to.clone() }
        }
    }
}

/// A form bound to one model type.
///
/// The initial values are the field defaults, overlaid with the values of
/// the instance (when one is given), overlaid with any explicit initial.
/// `save` builds the instance from the cleaned data.
pub struct ModelForm<M> {
    config: ModelFormConfig,
    form: BaseForm,
    instance: Option<M>,
    pending_m2m: Vec<(&'static str, Vec<Value>)>,
    created: bool,
    validated: Option<bool>,
}

impl<M: Model + Default + Clone> ModelForm<M> {
    /// Creates a form for `config`, editing `instance` when one is given.
    pub fn new(config: ModelFormConfig, instance: Option<M>) -> Self {
        let fields = generate_form_fields(&config);
        let mut initial: HashMap<String, Value> = fields
            .iter()
            .filter_map(|f| f.initial.clone().map(|v| (f.name.clone(), v)))
            .collect();

        if let Some(instance) = &instance {
            for field in &fields {
                if let Some(value) = instance.field_value(&field.name) {
                    initial.insert(field.name.clone(), value);
                }
            }
        }

        Self {
            config,
            form: BaseForm::new(fields).with_initial(initial),
            instance,
            pending_m2m: Vec::new(),
            created: false,
            validated: None,
        }
    }

    /// Overlays explicit initial values.
    pub fn with_initial(mut self, initial: HashMap<String, Value>) -> Self {
        self.form.initial_mut().extend(initial);
        self
    }

    /// The form's configuration.
    pub fn config(&self) -> &ModelFormConfig {
        &self.config
    }

    /// The instance being edited, or the last saved one.
    pub fn instance(&self) -> Option<&M> {
        self.instance.as_ref()
    }

    /// Replaces the instance. Initial values are left as they are.
    pub fn set_instance(&mut self, instance: M) {
        self.instance = Some(instance);
    }

    /// Returns `true` if the last committed save created a row.
    pub fn was_created(&self) -> bool {
        self.created
    }

    /// Validates (if not yet done) and saves the instance.
    ///
    /// With `commit`, the instance is written with [`save_model`] and its
    /// many-to-many values are attached once it has a primary key. Without
    /// it, nothing is written and the many-to-many values stay pending for
    /// [`save_m2m`](Self::save_m2m).
    ///
    /// # Errors
    ///
    /// Returns [`StaplerError::ValidationError`] if the form does not
    /// validate, or the database error of a failed write.
    pub async fn save(&mut self, db: &dyn DbExecutor, commit: bool) -> StaplerResult<M> {
        if self.validated.is_none() {
            self.is_valid().await;
        }
        let meta = self.config.model_meta;
        if self.validated != Some(true) {
            let err = if self.form.errors().is_empty() {
                ValidationError::new(
                    format!(
                        "The {} could not be saved because the form is not bound.",
                        meta.verbose_name
                    ),
                    "unbound",
                )
            } else {
                ValidationError::from_form_errors(self.form.errors())
            };
            return Err(StaplerError::ValidationError(err));
        }

        let mut instance = match &self.instance {
            Some(instance) => instance.clone(),
            None => {
                let mut instance = M::default();
                for field in meta.concrete_fields() {
                    if let Some(default) = &field.default {
                        instance.set_field_value(field.name, default.clone())?;
                    }
                }
                instance
            }
        };
        let mut pending = Vec::new();
        for field in self.form.fields() {
            let Some(value) = self.form.cleaned_data().get(&field.name) else {
                continue;
            };
            let Some(model_field) = meta.get_field(&field.name) else {
                continue;
            };
            // omitted fields with a model default keep the instance value
            if model_field.default.is_some() && !self.form.was_submitted(&field.name) {
                continue;
            }
            if model_field.is_many_to_many() {
                let targets = value.as_list().map(<[Value]>::to_vec).unwrap_or_default();
                pending.push((model_field.name, targets));
            } else {
                instance.set_field_value(model_field.name, value.clone())?;
            }
        }
        self.pending_m2m = pending;

        if commit {
            self.created = save_model(&mut instance, db).await?;
            self.instance = Some(instance.clone());
            self.save_m2m(db).await?;
        } else {
            self.created = false;
            self.instance = Some(instance.clone());
        }
        Ok(instance)
    }

    /// Writes the pending many-to-many values of the saved instance.
    ///
    /// # Errors
    ///
    /// Returns [`StaplerError::DatabaseError`] if values are pending but the
    /// instance has no primary key yet.
    pub async fn save_m2m(&mut self, db: &dyn DbExecutor) -> StaplerResult<()> {
        if self.pending_m2m.is_empty() {
            return Ok(());
        }
        let pk = self
            .instance
            .as_ref()
            .and_then(|instance| instance.pk())
            .unwrap_or(Value::Null);
        for (field, targets) in &self.pending_m2m {
            set_many_to_many(db, self.config.model_meta, field, &pk, targets).await?;
        }
        self.pending_m2m.clear();
        Ok(())
    }
}

#[async_trait]
impl<M: Model + Default + Clone> Form for ModelForm<M> {
    fn fields(&self) -> &[FormFieldDef] {
        self.form.fields()
    }

    fn initial(&self) -> &HashMap<String, Value> {
        self.form.initial()
    }

    fn prefix(&self) -> Option<&str> {
        self.form.prefix()
    }

    fn bind(&mut self, data: &QueryDict) {
        self.validated = None;
        self.form.bind(data);
    }

    fn is_bound(&self) -> bool {
        self.form.is_bound()
    }

    async fn is_valid(&mut self) -> bool {
        let valid = self.form.is_valid().await;
        self.validated = Some(valid);
        valid
    }

    fn errors(&self) -> &HashMap<String, Vec<String>> {
        self.form.errors()
    }

    fn cleaned_data(&self) -> &HashMap<String, Value> {
        self.form.cleaned_data()
    }
}

/// A type-erased model form, as held by a composite form.
#[async_trait]
pub trait SubForm: Form {
    /// Metadata of the model this form saves.
    fn model_meta(&self) -> &'static ModelMeta;

    /// The current instance, type-erased.
    fn instance_any(&self) -> Option<&(dyn Any + Send + Sync)>;

    /// The primary key of the current instance, once it has one.
    fn instance_pk(&self) -> Option<Value>;

    /// Replaces the instance.
    ///
    /// # Errors
    ///
    /// Returns [`StaplerError::ImproperlyConfigured`] if the value is not an
    /// instance of this form's model.
    fn set_instance_any(&mut self, instance: Box<dyn Any + Send + Sync>) -> StaplerResult<()>;

    /// Saves the instance and describes the outcome.
    ///
    /// # Errors
    ///
    /// As [`ModelForm::save`].
    async fn save_record(
        &mut self,
        db: &dyn DbExecutor,
        commit: bool,
    ) -> StaplerResult<SavedRecord>;

    /// Writes pending many-to-many values.
    ///
    /// # Errors
    ///
    /// As [`ModelForm::save_m2m`].
    async fn save_related(&mut self, db: &dyn DbExecutor) -> StaplerResult<()>;

    /// Returns `true` if a non-committed save left many-to-many values behind.
    fn has_pending_m2m(&self) -> bool;
}

#[async_trait]
impl<M: Model + Default + Clone> SubForm for ModelForm<M> {
    fn model_meta(&self) -> &'static ModelMeta {
        self.config.model_meta
    }

    fn instance_any(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.instance
            .as_ref()
            .map(|instance| instance as &(dyn Any + Send + Sync))
    }

    fn instance_pk(&self) -> Option<Value> {
        self.instance
            .as_ref()
            .and_then(|instance| instance.pk())
            .filter(|pk| !pk.is_null())
    }

    fn set_instance_any(&mut self, instance: Box<dyn Any + Send + Sync>) -> StaplerResult<()> {
        let instance = instance.downcast::<M>().map_err(|_| {
            StaplerError::ImproperlyConfigured(format!(
                "Instance is not a {}",
                self.config.model_meta.label()
            ))
        })?;
        self.set_instance(*instance);
        Ok(())
    }

    async fn save_record(
        &mut self,
        db: &dyn DbExecutor,
        commit: bool,
    ) -> StaplerResult<SavedRecord> {
        let instance = self.save(db, commit).await?;
        Ok(SavedRecord::new(instance, commit && self.created))
    }

    async fn save_related(&mut self, db: &dyn DbExecutor) -> StaplerResult<()> {
        self.save_m2m(db).await
    }

    fn has_pending_m2m(&self) -> bool {
        !self.pending_m2m.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::LazyLock;

    use stapler_db::executor::{count, get_by_pk, many_to_many_ids};
    use stapler_db::row::Row;
    use stapler_test::TestDatabase;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Country {
        id: Option<i64>,
        name: String,
    }

    impl Model for Country {
        fn meta() -> &'static ModelMeta {
            static META: LazyLock<ModelMeta> = LazyLock::new(|| {
                ModelMeta::new(
                    "shop",
                    "country",
                    vec![
                        FieldDef::new("id", FieldType::BigAutoField).primary_key(),
                        FieldDef::new("name", FieldType::CharField).max_length(100),
                    ],
                )
            });
            &META
        }

        fn pk(&self) -> Option<Value> {
            self.id.map(Value::Int)
        }

        fn set_pk(&mut self, value: Value) {
            self.id = value.as_int();
        }

        fn field_values(&self) -> Vec<(&'static str, Value)> {
            vec![("id", self.id.into()), ("name", self.name.clone().into())]
        }

        fn set_field_value(&mut self, name: &str, value: Value) -> StaplerResult<()> {
            match name {
                "name" => self.name = value.as_str().unwrap_or_default().to_string(),
                other => {
                    return Err(StaplerError::DatabaseError(format!("no field {other}")));
                }
            }
            Ok(())
        }

        fn from_row(row: &Row) -> StaplerResult<Self> {
            Ok(Self {
                id: row.get("id")?,
                name: row.get("name")?,
            })
        }
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Bike {
        id: Option<i64>,
        name: String,
        frame_type: String,
        price: i64,
    }

    impl Model for Bike {
        fn meta() -> &'static ModelMeta {
            static META: LazyLock<ModelMeta> = LazyLock::new(|| {
                ModelMeta::new(
                    "shop",
                    "bike",
                    vec![
                        FieldDef::new("id", FieldType::BigAutoField).primary_key(),
                        FieldDef::new("name", FieldType::CharField)
                            .max_length(100)
                            .verbose_name("Bike name"),
                        FieldDef::new("frame_type", FieldType::CharField)
                            .max_length(20)
                            .default("roadbike"),
                        FieldDef::new("price", FieldType::IntegerField),
                        FieldDef::new(
                            "available_countries",
                            FieldType::ManyToManyField {
                                to: "shop.country".into(),
                                related_name: None,
                            },
                        ),
                    ],
                )
            });
            &META
        }

        fn pk(&self) -> Option<Value> {
            self.id.map(Value::Int)
        }

        fn set_pk(&mut self, value: Value) {
            self.id = value.as_int();
        }

        fn field_values(&self) -> Vec<(&'static str, Value)> {
            vec![
                ("id", self.id.into()),
                ("name", self.name.clone().into()),
                ("frame_type", self.frame_type.clone().into()),
                ("price", self.price.into()),
            ]
        }

        fn set_field_value(&mut self, name: &str, value: Value) -> StaplerResult<()> {
            match name {
                "name" => self.name = value.as_str().unwrap_or_default().to_string(),
                "frame_type" => self.frame_type = value.as_str().unwrap_or_default().to_string(),
                "price" => self.price = value.as_int().unwrap_or_default(),
                other => {
                    return Err(StaplerError::DatabaseError(format!("no field {other}")));
                }
            }
            Ok(())
        }

        fn from_row(row: &Row) -> StaplerResult<Self> {
            Ok(Self {
                id: row.get("id")?,
                name: row.get("name")?,
                frame_type: row.get("frame_type")?,
                price: row.get("price")?,
            })
        }
    }

    async fn setup() -> TestDatabase {
        let db = TestDatabase::new();
        db.setup_tables(&[Country::meta(), Bike::meta()]).await.unwrap();
        db
    }

    fn bike_config() -> ModelFormConfig {
        ModelFormConfig::new(Bike::meta()).only(["name", "price"])
    }

    #[test]
    fn test_generate_all_fields() {
        let fields = generate_form_fields(&ModelFormConfig::new(Bike::meta()));
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["name", "frame_type", "price", "available_countries"]);

        assert!(fields[0].required);
        assert_eq!(fields[0].label, "Bike name");
        assert!(!fields[1].required);
        assert_eq!(fields[1].initial, Some(Value::from("roadbike")));
        assert!(matches!(
            fields[3].field_type,
            FormFieldType::ModelMultipleChoice { ref to } if to == "shop.country"
        ));
    }

    #[test]
    fn test_generate_include_order() {
        let config = ModelFormConfig::new(Bike::meta()).only(["price", "name"]);
        let names: Vec<String> = generate_form_fields(&config)
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, ["price", "name"]);
    }

    #[test]
    fn test_generate_exclude_and_overrides() {
        let config = ModelFormConfig::new(Bike::meta())
            .with_fields(ModelFormFields::Exclude(vec!["available_countries".into()]))
            .with_label("price", "Price (EUR)")
            .with_help_text("price", "Whole euros");
        let fields = generate_form_fields(&config);
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[2].label, "Price (EUR)");
        assert_eq!(fields[2].help_text, "Whole euros");
    }

    #[test]
    fn test_validate_rejects_unknown_fields() {
        let config = ModelFormConfig::new(Bike::meta()).only(["name", "wheels"]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Unknown field(s) (wheels) specified for shop.bike"));
        assert!(bike_config().validate().is_ok());
    }

    #[test]
    fn test_initial_from_instance() {
        let bike = Bike {
            id: Some(1),
            name: "Propel".into(),
            frame_type: "roadbike".into(),
            price: 200,
        };
        let form = ModelForm::new(bike_config(), Some(bike));
        assert_eq!(form.initial()["name"], Value::from("Propel"));
        assert_eq!(form.initial()["price"], Value::Int(200));
        assert!(!form.is_bound());
    }

    #[tokio::test]
    async fn test_save_creates_and_updates() {
        let db = setup().await;

        let mut form = ModelForm::<Bike>::new(bike_config(), None);
        form.bind(&QueryDict::parse("name=Propel&price=300"));
        let bike = form.save(&db, true).await.unwrap();
        assert!(form.was_created());
        assert_eq!(bike.frame_type, "roadbike");
        let id = bike.id.unwrap();

        let mut form = ModelForm::new(bike_config(), Some(bike));
        form.bind(&QueryDict::parse("name=Propel Advanced&price=350"));
        let updated = form.save(&db, true).await.unwrap();
        assert!(!form.was_created());
        assert_eq!(updated.id, Some(id));

        let stored: Bike = get_by_pk(&db, id).await.unwrap();
        assert_eq!(stored.name, "Propel Advanced");
        assert_eq!(stored.price, 350);
        assert_eq!(count::<Bike>(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_save_invalid_returns_validation_error() {
        let db = setup().await;
        let mut form = ModelForm::<Bike>::new(bike_config(), None);
        form.bind(&QueryDict::parse("name=Propel"));
        let err = form.save(&db, true).await.unwrap_err();
        assert!(matches!(err, StaplerError::ValidationError(_)));
        assert!(err.to_string().contains("price: This field is required."));
        assert_eq!(db.row_count("shop_bike").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_unbound_is_validation_error() {
        let db = setup().await;
        let mut form = ModelForm::<Bike>::new(bike_config(), None);
        let err = form.save(&db, true).await.unwrap_err();
        assert!(err.to_string().contains("not bound"));
    }

    #[tokio::test]
    async fn test_save_attaches_many_to_many_after_insert() {
        let db = setup().await;
        for name in ["Belgium", "Italy"] {
            let mut country = Country {
                id: None,
                name: name.into(),
            };
            save_model(&mut country, &db).await.unwrap();
        }

        let config = ModelFormConfig::new(Bike::meta());
        let mut form = ModelForm::<Bike>::new(config, None);
        form.bind(&QueryDict::parse(
            "name=Propel&price=300&available_countries=2&available_countries=1",
        ));
        let bike = form.save(&db, true).await.unwrap();
        assert_eq!(bike.frame_type, "roadbike");

        let ids = many_to_many_ids(&db, Bike::meta(), "available_countries", &bike.pk().unwrap())
            .await
            .unwrap();
        assert_eq!(ids, vec![Value::Int(1), Value::Int(2)]);
        assert!(!form.has_pending_m2m());
    }

    #[tokio::test]
    async fn test_save_without_commit_keeps_m2m_pending() {
        let db = setup().await;
        let mut country = Country {
            id: None,
            name: "Belgium".into(),
        };
        save_model(&mut country, &db).await.unwrap();

        let mut form = ModelForm::<Bike>::new(ModelFormConfig::new(Bike::meta()), None);
        form.bind(&QueryDict::parse("name=Propel&price=300&available_countries=1"));
        let mut bike = form.save(&db, false).await.unwrap();
        assert_eq!(bike.id, None);
        assert!(form.has_pending_m2m());
        assert_eq!(db.row_count("shop_bike").await.unwrap(), 0);

        // without a pk the relation cannot be written
        assert!(form.save_m2m(&db).await.is_err());

        save_model(&mut bike, &db).await.unwrap();
        form.set_instance(bike.clone());
        form.save_m2m(&db).await.unwrap();
        assert_eq!(db.row_count("shop_bike_available_countries").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_set_instance_any_rejects_other_model() {
        let mut form = ModelForm::<Bike>::new(bike_config(), None);
        let err = form
            .set_instance_any(Box::new(Country::default()))
            .unwrap_err();
        assert!(matches!(err, StaplerError::ImproperlyConfigured(_)));

        form.set_instance_any(Box::new(Bike::default())).unwrap();
        assert!(form.instance_any().is_some());
    }

    #[tokio::test]
    async fn test_save_record_reports_outcome() {
        let db = setup().await;
        let mut form = ModelForm::<Bike>::new(bike_config(), None);
        form.bind(&QueryDict::parse("name=Propel&price=300"));
        let record = form.save_record(&db, true).await.unwrap();
        assert_eq!(record.model_name, "bike");
        assert!(record.created);
        assert_eq!(record.pk, Some(Value::Int(1)));
        assert_eq!(record.downcast_ref::<Bike>().unwrap().price, 300);
    }
}
