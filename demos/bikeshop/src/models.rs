//! The bike shop schema: countries, manufacturers, and bikes sold in
//! several countries.

use std::sync::LazyLock;

use stapler::core::{StaplerError, StaplerResult};
use stapler::db::{FieldDef, FieldType, Model, ModelMeta, OnDelete, Row, Value};

fn no_field(model: &str, name: &str) -> StaplerError {
    StaplerError::DatabaseError(format!("{model} has no settable field '{name}'"))
}

#[derive(Debug, Clone, Default)]
pub struct Country {
    pub id: Option<i64>,
    pub name: String,
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
            .verbose_name("country")
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
            other => return Err(no_field("country", other)),
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

#[derive(Debug, Clone, Default)]
pub struct Manufacturer {
    pub id: Option<i64>,
    pub name: String,
    pub revenue: String,
    pub country_id: Option<i64>,
}

impl Model for Manufacturer {
    fn meta() -> &'static ModelMeta {
        static META: LazyLock<ModelMeta> = LazyLock::new(|| {
            ModelMeta::new(
                "shop",
                "manufacturer",
                vec![
                    FieldDef::new("id", FieldType::BigAutoField).primary_key(),
                    FieldDef::new("name", FieldType::CharField).max_length(100),
                    FieldDef::new("revenue", FieldType::CharField).max_length(100),
                    FieldDef::new(
                        "country",
                        FieldType::ForeignKey {
                            to: "shop.country".into(),
                            on_delete: OnDelete::SetNull,
                        },
                    )
                    .nullable()
                    .blank(),
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
            ("revenue", self.revenue.clone().into()),
            ("country_id", self.country_id.into()),
        ]
    }

    fn set_field_value(&mut self, name: &str, value: Value) -> StaplerResult<()> {
        match name {
            "name" => self.name = value.as_str().unwrap_or_default().to_string(),
            "revenue" => self.revenue = value.as_str().unwrap_or_default().to_string(),
            "country" => self.country_id = value.as_int(),
            other => return Err(no_field("manufacturer", other)),
        }
        Ok(())
    }

    fn from_row(row: &Row) -> StaplerResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            revenue: row.get("revenue")?,
            country_id: row.get("country_id")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Bike {
    pub id: Option<i64>,
    pub name: String,
    pub frame_type: String,
    pub price: i64,
}

impl Model for Bike {
    fn meta() -> &'static ModelMeta {
        static META: LazyLock<ModelMeta> = LazyLock::new(|| {
            ModelMeta::new(
                "shop",
                "bike",
                vec![
                    FieldDef::new("id", FieldType::BigAutoField).primary_key(),
                    FieldDef::new("name", FieldType::CharField).max_length(100),
                    FieldDef::new("frame_type", FieldType::CharField)
                        .max_length(100)
                        .default("roadbike"),
                    FieldDef::new("price", FieldType::IntegerField),
                    FieldDef::new(
                        "available_countries",
                        FieldType::ManyToManyField {
                            to: "shop.country".into(),
                            related_name: Some("available_bikes".into()),
                        },
                    )
                    .blank(),
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
            other => return Err(no_field("bike", other)),
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
