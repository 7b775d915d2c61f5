//! Composite forms: several model forms merged into one.
//!
//! A [`CompositeFormSpec`] declares which model forms take part (each a
//! [`SubFormSpec`]), the extra fields declared on the composite itself, and
//! whether field names are prefixed with the sub-form name. A
//! [`CompositeForm`] is one use of a spec: it slices the submitted data per
//! sub-form, validates all of them, and saves the valid ones.
//!
//! ```text
//! bike__name=Propel&bike__price=300&manufacturer__name=Giant
//!   -> bike form:         name=Propel&price=300
//!   -> manufacturer form: name=Giant
//! ```
//!
//! Saving is best-effort per sub-form. A sub-form that does not validate is
//! skipped and reported as `None` in the [`SaveResult`] instead of failing
//! the whole save; only database errors abort it.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;

use stapler_core::logging::form_span;
use stapler_core::{QueryDict, StaplerError, StaplerResult, SETTINGS};
use stapler_db::executor::DbExecutor;
use stapler_db::model::{Model, ModelMeta};
use stapler_db::value::Value;

use crate::fields::FormFieldDef;
use crate::form::{Form, NON_FIELD_ERRORS};
use crate::model_form::{generate_form_fields, ModelForm, ModelFormConfig, SubForm};
use crate::validation;

/// Joins a sub-form name and a field name into a public field name.
pub const PREFIX_SEPARATOR: &str = "__";

type Instance = Box<dyn Any + Send + Sync>;

type SubFormFactory = Arc<
    dyn Fn(Option<Instance>, HashMap<String, Value>) -> StaplerResult<Box<dyn SubForm>>
        + Send
        + Sync,
>;

/// One model form taking part in a composite form.
#[derive(Clone)]
pub struct SubFormSpec {
    name: String,
    instance_attr: Option<String>,
    model_meta: &'static ModelMeta,
    config_meta: &'static ModelMeta,
    model_type: TypeId,
    fields: Vec<FormFieldDef>,
    config: ModelFormConfig,
    factory: SubFormFactory,
}

impl SubFormSpec {
    /// A sub-form saving instances of `M`, with fields generated from `config`.
    ///
    /// The sub-form is named after the model (`bike` for `shop.bike`) and its
    /// instance is exposed as `<name>_instance`.
    pub fn model<M: Model + Default + Clone>(config: ModelFormConfig) -> Self {
        let model_meta = M::meta();
        let fields = generate_form_fields(&config);
        let form_config = config.clone();
        let factory: SubFormFactory = Arc::new(
            move |instance: Option<Instance>,
                  initial: HashMap<String, Value>|
                  -> StaplerResult<Box<dyn SubForm>> {
                let instance = match instance {
                    Some(boxed) => Some(*boxed.downcast::<M>().map_err(|_| {
                        StaplerError::ImproperlyConfigured(format!(
                            "Instance is not a {}",
                            M::meta().label()
                        ))
                    })?),
                    None => None,
                };
                let form = ModelForm::<M>::new(form_config.clone(), instance).with_initial(initial);
                Ok(Box::new(form))
            },
        );

        Self {
            name: model_meta.model_name.to_string(),
            instance_attr: None,
            model_meta,
            config_meta: config.model_meta,
            model_type: TypeId::of::<M>(),
            fields,
            config,
            factory,
        }
    }

    /// Renames the sub-form. The name is also its field prefix.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the attribute name the instance is exposed under.
    pub fn instance_attr(mut self, attr: impl Into<String>) -> Self {
        self.instance_attr = Some(attr.into());
        self
    }

    /// The sub-form name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The attribute name of the sub-form's instance.
    pub fn attr(&self) -> String {
        self.instance_attr
            .clone()
            .unwrap_or_else(|| format!("{}_instance", self.name))
    }

    /// Metadata of the model this sub-form saves.
    pub fn model_meta(&self) -> &'static ModelMeta {
        self.model_meta
    }

    /// The sub-form's own field definitions, unprefixed.
    pub fn fields(&self) -> &[FormFieldDef] {
        &self.fields
    }
}

impl fmt::Debug for SubFormSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubFormSpec")
            .field("name", &self.name)
            .field("instance_attr", &self.attr())
            .field("model", &self.model_meta.label())
            .field("fields", &self.fields.len())
            .finish_non_exhaustive()
    }
}

/// The declaration of a composite form.
///
/// Built once with [`CompositeFormSpec::builder`] and shared by every
/// [`CompositeForm`] created from it.
#[derive(Debug, Clone)]
pub struct CompositeFormSpec {
    name: String,
    sub_forms: Vec<SubFormSpec>,
    declared: Vec<FormFieldDef>,
    auto_prefix: bool,
    required: HashSet<String>,
    fields: Vec<FormFieldDef>,
}

impl CompositeFormSpec {
    /// Starts declaring a composite form.
    pub fn builder(name: impl Into<String>) -> CompositeFormSpecBuilder {
        CompositeFormSpecBuilder {
            name: name.into(),
            sub_forms: Vec::new(),
            declared: Vec::new(),
            auto_prefix: None,
            required: None,
        }
    }

    /// The form name, used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if field names carry their sub-form prefix.
    pub fn auto_prefix(&self) -> bool {
        self.auto_prefix
    }

    /// The sub-forms in declaration order.
    pub fn sub_forms(&self) -> &[SubFormSpec] {
        &self.sub_forms
    }

    /// Fields declared on the composite itself.
    pub fn declared_fields(&self) -> &[FormFieldDef] {
        &self.declared
    }

    /// Returns `true` if the named sub-form must validate for the composite
    /// to be valid.
    pub fn is_required(&self, name: &str) -> bool {
        self.required.contains(name)
    }

    /// The merged public field names, in order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// The public name of a sub-form field.
    pub fn public_name(&self, sub_form: &SubFormSpec, field: &str) -> String {
        public_name(self.auto_prefix, &sub_form.name, field)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.sub_forms.iter().position(|s| s.name == name)
    }

    fn is_declared(&self, public_name: &str) -> bool {
        self.declared.iter().any(|f| f.name == public_name)
    }

    fn slice_data(&self, sub_form: &SubFormSpec, data: &QueryDict) -> QueryDict {
        if !self.auto_prefix {
            return data.clone();
        }
        let prefix = format!("{}{PREFIX_SEPARATOR}", sub_form.name);
        data.remap_keys(|key| key.strip_prefix(prefix.as_str()).map(String::from))
    }
}

fn public_name(auto_prefix: bool, sub_form: &str, field: &str) -> String {
    if auto_prefix {
        format!("{sub_form}{PREFIX_SEPARATOR}{field}")
    } else {
        field.to_string()
    }
}

fn improperly_configured(form: &str, msg: impl fmt::Display) -> StaplerError {
    StaplerError::ImproperlyConfigured(format!("{form}: {msg}"))
}

/// Builder for [`CompositeFormSpec`].
#[derive(Debug)]
pub struct CompositeFormSpecBuilder {
    name: String,
    sub_forms: Vec<SubFormSpec>,
    declared: Vec<FormFieldDef>,
    auto_prefix: Option<bool>,
    required: Option<Vec<String>>,
}

impl CompositeFormSpecBuilder {
    /// Adds a sub-form. Sub-forms keep their declaration order.
    pub fn sub_form(mut self, sub_form: SubFormSpec) -> Self {
        self.sub_forms.push(sub_form);
        self
    }

    /// Declares a field on the composite, named by its public name.
    ///
    /// A declared field replaces any sub-form field with the same public
    /// name, and is validated against the full submitted data.
    pub fn declared_field(mut self, field: FormFieldDef) -> Self {
        self.declared.push(field);
        self
    }

    /// Sets whether field names are prefixed with `<sub-form>__`.
    ///
    /// Defaults to `forms.auto_prefix` of the global settings, or `true`
    /// when none are configured.
    pub fn auto_prefix(mut self, auto_prefix: bool) -> Self {
        self.auto_prefix = Some(auto_prefix);
        self
    }

    /// Names the sub-forms that must validate. Without this call all of
    /// them must.
    pub fn required<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Checks the declaration and merges the fields.
    ///
    /// # Errors
    ///
    /// Returns [`StaplerError::ImproperlyConfigured`] if there are no
    /// sub-forms, a sub-form name is empty or contains
    /// [`PREFIX_SEPARATOR`], names or instance attributes repeat, a required
    /// name is unknown, declared fields repeat, or field names collide.
    pub fn build(self) -> StaplerResult<CompositeFormSpec> {
        let form = self.name.as_str();
        if self.sub_forms.is_empty() {
            return Err(improperly_configured(form, "no sub-forms declared"));
        }

        let mut names = HashSet::new();
        let mut attrs = HashSet::new();
        for sub in &self.sub_forms {
            if sub.name.is_empty() || sub.name.contains(PREFIX_SEPARATOR) {
                return Err(improperly_configured(
                    form,
                    format_args!(
                        "sub-form name '{}' must be non-empty and must not contain '{PREFIX_SEPARATOR}'",
                        sub.name
                    ),
                ));
            }
            if !std::ptr::eq(sub.model_meta, sub.config_meta) {
                return Err(improperly_configured(
                    form,
                    format_args!(
                        "sub-form '{}' saves {} but its fields come from {}",
                        sub.name,
                        sub.model_meta.label(),
                        sub.config_meta.label()
                    ),
                ));
            }
            sub.config.validate().map_err(|e| match e {
                StaplerError::ImproperlyConfigured(msg) => improperly_configured(form, msg),
                other => other,
            })?;
            if !names.insert(sub.name.clone()) {
                return Err(improperly_configured(
                    form,
                    format_args!("sub-form '{}' is declared twice", sub.name),
                ));
            }
            let attr = sub.attr();
            if !attrs.insert(attr.clone()) {
                return Err(improperly_configured(
                    form,
                    format_args!("instance attribute '{attr}' is used twice"),
                ));
            }
        }

        let required: HashSet<String> = match self.required {
            Some(required) => {
                if let Some(unknown) = required.iter().find(|r| !names.contains(*r)) {
                    return Err(improperly_configured(
                        form,
                        format_args!("required sub-form '{unknown}' is not declared"),
                    ));
                }
                required.into_iter().collect()
            }
            None => names,
        };

        let mut declared_names = HashSet::new();
        for field in &self.declared {
            if !declared_names.insert(field.name.as_str()) {
                return Err(improperly_configured(
                    form,
                    format_args!("field '{}' is declared twice", field.name),
                ));
            }
        }

        let auto_prefix = self
            .auto_prefix
            .unwrap_or_else(|| SETTINGS.try_get().map_or(true, |s| s.forms.auto_prefix));

        let mut fields: Vec<FormFieldDef> = Vec::new();
        // sub-form slot of each merged field, before declared fields apply
        let mut origins: Vec<usize> = Vec::new();
        let mut collisions: Vec<(String, usize, usize)> = Vec::new();

        for (slot, sub) in self.sub_forms.iter().enumerate() {
            for field in &sub.fields {
                let public = public_name(auto_prefix, &sub.name, &field.name);
                if let Some(pos) = fields.iter().position(|f| f.name == public) {
                    if auto_prefix {
                        return Err(improperly_configured(
                            form,
                            format_args!("field '{public}' appears more than once"),
                        ));
                    }
                    collisions.push((public, origins[pos], slot));
                    continue;
                }
                fields.push(field.renamed(public));
                origins.push(slot);
            }
        }

        for field in &self.declared {
            if let Some(pos) = fields.iter().position(|f| f.name == field.name) {
                fields[pos] = field.clone();
            } else {
                fields.push(field.clone());
            }
        }

        if let Some((name, first, second)) = collisions
            .into_iter()
            .find(|(name, _, _)| !declared_names.contains(name.as_str()))
        {
            return Err(improperly_configured(
                form,
                format_args!(
                    "field '{name}' is defined by both '{}' and '{}'; declare '{name}' on the \
                     composite form or enable auto_prefix",
                    self.sub_forms[first].name, self.sub_forms[second].name
                ),
            ));
        }

        tracing::debug!(
            form = %self.name,
            sub_forms = self.sub_forms.len(),
            fields = fields.len(),
            auto_prefix,
            "composite form declared"
        );

        Ok(CompositeFormSpec {
            name: self.name,
            sub_forms: self.sub_forms,
            declared: self.declared,
            auto_prefix,
            required,
            fields,
        })
    }
}

/// The saved instance of one sub-form.
pub struct SavedRecord {
    /// The model name of the instance.
    pub model_name: &'static str,
    /// The primary key, absent for records that were not written.
    pub pk: Option<Value>,
    /// Whether the save created a new row.
    pub created: bool,
    instance: Instance,
}

impl SavedRecord {
    /// Wraps a saved instance.
    pub fn new<M: Model>(instance: M, created: bool) -> Self {
        Self {
            model_name: M::meta().model_name,
            pk: instance.pk().filter(|pk| !pk.is_null()),
            created,
            instance: Box::new(instance),
        }
    }

    /// The instance, if it is an `M`.
    pub fn downcast_ref<M: Model>(&self) -> Option<&M> {
        self.instance.downcast_ref::<M>()
    }

    /// A JSON description of the record.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "model": self.model_name,
            "pk": self.pk.as_ref().map_or(serde_json::Value::Null, Value::to_json),
            "created": self.created,
        })
    }
}

impl fmt::Debug for SavedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SavedRecord")
            .field("model_name", &self.model_name)
            .field("pk", &self.pk)
            .field("created", &self.created)
            .finish_non_exhaustive()
    }
}

/// The outcome of saving a composite form, keyed by instance attribute.
///
/// Entries keep the sub-form declaration order. A `None` entry marks a
/// sub-form that did not validate and was not saved.
#[derive(Debug, Default)]
pub struct SaveResult {
    records: Vec<(String, Option<SavedRecord>)>,
}

impl SaveResult {
    /// The record saved under `attr`, if any.
    pub fn record(&self, attr: &str) -> Option<&SavedRecord> {
        self.records
            .iter()
            .find(|(name, _)| name == attr)
            .and_then(|(_, record)| record.as_ref())
    }

    /// The instance saved under `attr`, if it is an `M`.
    pub fn get<M: Model>(&self, attr: &str) -> Option<&M> {
        self.record(attr)?.downcast_ref::<M>()
    }

    /// Returns `true` if `attr` holds a record with a primary key.
    pub fn is_saved(&self, attr: &str) -> bool {
        self.record(attr).is_some_and(|r| r.pk.is_some())
    }

    /// The number of records with a primary key.
    pub fn saved_count(&self) -> usize {
        self.records
            .iter()
            .filter(|(_, r)| r.as_ref().is_some_and(|r| r.pk.is_some()))
            .count()
    }

    /// Iterates `(instance_attr, record)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&SavedRecord>)> {
        self.records
            .iter()
            .map(|(attr, record)| (attr.as_str(), record.as_ref()))
    }

    /// The number of entries, saved or not.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// A JSON object mapping each instance attribute to its record or `null`.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .records
            .iter()
            .map(|(attr, record)| {
                let value = record
                    .as_ref()
                    .map_or(serde_json::Value::Null, SavedRecord::to_json);
                (attr.clone(), value)
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

struct Slot {
    form: Box<dyn SubForm>,
    valid: Option<bool>,
}

struct PendingInstance {
    type_id: TypeId,
    label: String,
    value: Instance,
}

impl PendingInstance {
    fn new<M: Model>(instance: M) -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            label: M::meta().label(),
            value: Box::new(instance),
        }
    }
}

/// Builder for [`CompositeForm`].
pub struct CompositeFormBuilder<'a> {
    spec: &'a CompositeFormSpec,
    data: Option<QueryDict>,
    positional: Vec<PendingInstance>,
    named: Vec<(String, PendingInstance)>,
    initial: HashMap<String, Value>,
}

impl<'a> CompositeFormBuilder<'a> {
    /// Binds submitted data. Any data, even empty, makes the form bound.
    pub fn data(mut self, data: QueryDict) -> Self {
        self.data = Some(data);
        self
    }

    /// Hands the next sub-form (in declaration order) an instance to edit.
    pub fn instance<M: Model>(mut self, instance: M) -> Self {
        self.positional.push(PendingInstance::new(instance));
        self
    }

    /// Hands the named sub-form an instance to edit.
    pub fn instance_for<M: Model>(mut self, name: impl Into<String>, instance: M) -> Self {
        self.named.push((name.into(), PendingInstance::new(instance)));
        self
    }

    /// Sets initial values, keyed by public field name.
    pub fn initial(mut self, initial: HashMap<String, Value>) -> Self {
        self.initial.extend(initial);
        self
    }

    /// Creates the sub-forms and merges their fields and initial values.
    ///
    /// # Errors
    ///
    /// Returns [`StaplerError::ImproperlyConfigured`] if more instances than
    /// sub-forms are given, an instance names an unknown sub-form or one
    /// that already has an instance, or an instance is of the wrong model.
    pub fn build(self) -> StaplerResult<CompositeForm<'a>> {
        let spec = self.spec;
        let form = spec.name.as_str();
        let count = spec.sub_forms.len();

        if self.positional.len() > count {
            return Err(improperly_configured(
                form,
                format_args!(
                    "{} instances given for {count} sub-forms",
                    self.positional.len()
                ),
            ));
        }

        let mut assigned: Vec<Option<PendingInstance>> = (0..count).map(|_| None).collect();
        for (slot, instance) in self.positional.into_iter().enumerate() {
            assigned[slot] = Some(instance);
        }
        for (name, instance) in self.named {
            let slot = spec.position(&name).ok_or_else(|| {
                improperly_configured(form, format_args!("no sub-form named '{name}'"))
            })?;
            if assigned[slot].is_some() {
                return Err(improperly_configured(
                    form,
                    format_args!("sub-form '{name}' was given two instances"),
                ));
            }
            assigned[slot] = Some(instance);
        }

        let mut slots = Vec::with_capacity(count);
        for (sub, instance) in spec.sub_forms.iter().zip(assigned) {
            if let Some(instance) = &instance {
                if instance.type_id != sub.model_type {
                    return Err(improperly_configured(
                        form,
                        format_args!(
                            "sub-form '{}' edits {} instances, got {}",
                            sub.name,
                            sub.model_meta.label(),
                            instance.label
                        ),
                    ));
                }
            }

            let initial: HashMap<String, Value> = sub
                .fields
                .iter()
                .filter_map(|field| {
                    self.initial
                        .get(&spec.public_name(sub, &field.name))
                        .map(|value| (field.name.clone(), value.clone()))
                })
                .collect();

            let mut sub_form = (sub.factory)(instance.map(|i| i.value), initial)?;
            if let Some(data) = &self.data {
                sub_form.bind(&spec.slice_data(sub, data));
            }
            slots.push(Slot {
                form: sub_form,
                valid: None,
            });
        }

        let mut initial = HashMap::new();
        for (slot, sub) in slots.iter().zip(&spec.sub_forms) {
            for field in &sub.fields {
                if let Some(value) = slot.form.initial().get(&field.name) {
                    initial.insert(spec.public_name(sub, &field.name), value.clone());
                }
            }
        }
        for field in &spec.declared {
            if let Some(value) = &field.initial {
                initial.insert(field.name.clone(), value.clone());
            }
        }
        initial.extend(self.initial);

        tracing::debug!(
            form = %spec.name,
            bound = self.data.is_some(),
            "composite form created"
        );

        Ok(CompositeForm {
            spec,
            slots,
            initial,
            data: self.data,
            errors: HashMap::new(),
            cleaned_data: HashMap::new(),
            validated: None,
        })
    }
}

/// A composite form in use: bound (or not) to data, with one live model form
/// per sub-form.
pub struct CompositeForm<'a> {
    spec: &'a CompositeFormSpec,
    slots: Vec<Slot>,
    initial: HashMap<String, Value>,
    data: Option<QueryDict>,
    errors: HashMap<String, Vec<String>>,
    cleaned_data: HashMap<String, Value>,
    validated: Option<bool>,
}

impl<'a> CompositeForm<'a> {
    /// Starts a form from `spec`.
    pub fn builder(spec: &'a CompositeFormSpec) -> CompositeFormBuilder<'a> {
        CompositeFormBuilder {
            spec,
            data: None,
            positional: Vec::new(),
            named: Vec::new(),
            initial: HashMap::new(),
        }
    }

    /// The declaration this form was built from.
    pub fn spec(&self) -> &'a CompositeFormSpec {
        self.spec
    }

    /// The bound data, if any.
    pub fn data(&self) -> Option<&QueryDict> {
        self.data.as_ref()
    }

    /// Looks up a merged field by public name.
    pub fn field(&self, name: &str) -> Option<&FormFieldDef> {
        self.spec.fields.iter().find(|f| f.name == name)
    }

    /// The live form of the named sub-form.
    pub fn sub_form(&self, name: &str) -> Option<&dyn SubForm> {
        let slot = self.spec.position(name)?;
        Some(self.slots[slot].form.as_ref())
    }

    /// The validation outcome of the named sub-form, once validated.
    pub fn is_sub_form_valid(&self, name: &str) -> Option<bool> {
        let slot = self.spec.position(name)?;
        self.slots[slot].valid
    }

    /// The instance exposed under `attr`, if it is an `M`.
    pub fn instance<M: Model>(&self, attr: &str) -> Option<&M> {
        let slot = self.slot_for_attr(attr)?;
        self.slots[slot].form.instance_any()?.downcast_ref::<M>()
    }

    /// Replaces the instance exposed under `attr`.
    ///
    /// # Errors
    ///
    /// Returns [`StaplerError::ImproperlyConfigured`] if no sub-form exposes
    /// `attr` or `M` is not its model.
    pub fn replace_instance<M: Model>(&mut self, attr: &str, instance: M) -> StaplerResult<()> {
        let slot = self.slot_for_attr(attr).ok_or_else(|| {
            improperly_configured(
                &self.spec.name,
                format_args!("no sub-form exposes '{attr}'"),
            )
        })?;
        self.slots[slot].form.set_instance_any(Box::new(instance))
    }

    fn slot_for_attr(&self, attr: &str) -> Option<usize> {
        self.spec.sub_forms.iter().position(|s| s.attr() == attr)
    }

    /// Validates (if not yet done) and saves every valid sub-form.
    ///
    /// # Errors
    ///
    /// Returns the first database error. Sub-forms that do not validate are
    /// not errors; they show up as `None` in the result.
    pub async fn save(&mut self, db: &dyn DbExecutor) -> StaplerResult<SaveResult> {
        self.save_with(db, true).await
    }

    /// As [`save`](Self::save); with `commit` false nothing is written and
    /// the returned records carry unsaved instances.
    ///
    /// # Errors
    ///
    /// Returns the first database error.
    pub async fn save_with(
        &mut self,
        db: &dyn DbExecutor,
        commit: bool,
    ) -> StaplerResult<SaveResult> {
        let span = form_span(&self.spec.name);
        self.save_slots(db, commit).instrument(span).await
    }

    async fn save_slots(&mut self, db: &dyn DbExecutor, commit: bool) -> StaplerResult<SaveResult> {
        if self.validated.is_none() {
            self.is_valid().await;
        }

        let spec = self.spec;
        let mut records = Vec::with_capacity(self.slots.len());
        for (slot, sub) in self.slots.iter_mut().zip(&spec.sub_forms) {
            let attr = sub.attr();
            if slot.valid != Some(true) {
                if spec.is_required(&sub.name) {
                    tracing::warn!(sub_form = %sub.name, "required sub-form is invalid, not saved");
                } else {
                    tracing::debug!(sub_form = %sub.name, "sub-form is invalid, not saved");
                }
                records.push((attr, None));
                continue;
            }

            let record = slot.form.save_record(db, commit).await?;
            tracing::info!(
                sub_form = %sub.name,
                model = record.model_name,
                pk = ?record.pk,
                created = record.created,
                commit,
                "sub-form saved"
            );
            records.push((attr, Some(record)));
        }

        Ok(SaveResult { records })
    }

    /// Writes the pending many-to-many values of valid sub-forms whose
    /// instance has a primary key. Used after `save_with(db, false)` once
    /// the instances have been saved.
    ///
    /// # Errors
    ///
    /// Returns the first database error.
    pub async fn save_m2m(&mut self, db: &dyn DbExecutor) -> StaplerResult<()> {
        for (slot, sub) in self.slots.iter_mut().zip(&self.spec.sub_forms) {
            if slot.valid != Some(true) || !slot.form.has_pending_m2m() {
                continue;
            }
            if slot.form.instance_pk().is_none() {
                tracing::debug!(sub_form = %sub.name, "instance has no primary key yet, m2m skipped");
                continue;
            }
            slot.form.save_related(db).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<'a> Form for CompositeForm<'a> {
    /// The merged fields in order, each named by its public name.
    fn fields(&self) -> &[FormFieldDef] {
        &self.spec.fields
    }

    fn initial(&self) -> &HashMap<String, Value> {
        &self.initial
    }

    fn prefix(&self) -> Option<&str> {
        None
    }

    fn bind(&mut self, data: &QueryDict) {
        let spec = self.spec;
        for (slot, sub) in self.slots.iter_mut().zip(&spec.sub_forms) {
            slot.form.bind(&spec.slice_data(sub, data));
            slot.valid = None;
        }
        self.data = Some(data.clone());
        self.errors.clear();
        self.cleaned_data.clear();
        self.validated = None;
    }

    fn is_bound(&self) -> bool {
        self.data.is_some()
    }

    async fn is_valid(&mut self) -> bool {
        let Some(data) = &self.data else {
            return false;
        };
        let spec = self.spec;
        self.errors.clear();
        self.cleaned_data.clear();
        let mut shadowed: HashMap<String, Vec<String>> = HashMap::new();

        for (slot, sub) in self.slots.iter_mut().zip(&spec.sub_forms) {
            let valid = slot.form.is_valid().await;
            slot.valid = Some(valid);
            tracing::debug!(form = %spec.name, sub_form = %sub.name, valid, "sub-form validated");

            for (field, messages) in slot.form.errors() {
                let public = if field == NON_FIELD_ERRORS {
                    NON_FIELD_ERRORS.to_string()
                } else {
                    spec.public_name(sub, field)
                };
                let target = if spec.is_declared(&public) {
                    &mut shadowed
                } else {
                    &mut self.errors
                };
                target
                    .entry(public)
                    .or_default()
                    .extend(messages.iter().cloned());
            }
            for (field, value) in slot.form.cleaned_data() {
                let public = spec.public_name(sub, field);
                if !spec.is_declared(&public) {
                    self.cleaned_data.insert(public, value.clone());
                }
            }
        }

        let raw: HashMap<String, Vec<String>> = spec
            .declared
            .iter()
            .filter_map(|f| data.get_list(&f.name).map(|v| (f.name.clone(), v.clone())))
            .collect();
        let mut declared_errors = HashMap::new();
        validation::clean_fields(
            &spec.declared,
            &raw,
            &mut self.cleaned_data,
            &mut declared_errors,
        );
        let declared_valid = declared_errors.is_empty();
        // a sub-form's own copy of a shadowed field still decides its
        // validity; its errors show unless the declared field failed too
        for (public, messages) in shadowed {
            if !declared_errors.contains_key(&public) {
                self.errors.entry(public).or_default().extend(messages);
            }
        }
        self.errors.extend(declared_errors);

        let clean_valid = match self.clean().await {
            Ok(()) => true,
            Err(form_errors) => {
                for (key, messages) in form_errors {
                    self.errors.entry(key).or_default().extend(messages);
                }
                false
            }
        };

        let sub_forms_valid = self
            .slots
            .iter()
            .zip(&spec.sub_forms)
            .all(|(slot, sub)| !spec.is_required(&sub.name) || slot.valid == Some(true));

        let valid = declared_valid && clean_valid && sub_forms_valid;
        self.validated = Some(valid);
        tracing::debug!(form = %spec.name, valid, "composite form validated");
        valid
    }

    fn errors(&self) -> &HashMap<String, Vec<String>> {
        &self.errors
    }

    fn cleaned_data(&self) -> &HashMap<String, Value> {
        &self.cleaned_data
    }
}

impl fmt::Debug for CompositeForm<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeForm")
            .field("name", &self.spec.name)
            .field("bound", &self.data.is_some())
            .field("validated", &self.validated)
            .finish_non_exhaustive()
    }
}
