//! Integration tests for model persistence on a real SQLite database.
//!
//! Covers insert and update through `save_model`, foreign key enforcement,
//! and many-to-many join tables created from model metadata.

use std::sync::LazyLock;

use stapler_core::{StaplerError, StaplerResult};
use stapler_db::executor::{
    count, delete_model, get_by_pk, many_to_many_ids, refresh_model, save_model,
    set_many_to_many, DbExecutor,
};
use stapler_db::fields::{FieldDef, FieldType, OnDelete};
use stapler_db::model::{Model, ModelMeta};
use stapler_db::row::Row;
use stapler_db::value::Value;
use stapler_db_backends::schema::{create_many_to_many_sql, create_table_sql};
use stapler_db_backends::SqliteBackend;

// ── Test model definitions ────────────────────────────────────────────

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
            other => return Err(StaplerError::DatabaseError(format!("no field {other}"))),
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
    origin_id: Option<i64>,
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
                    FieldDef::new(
                        "origin",
                        FieldType::ForeignKey {
                            to: "shop.country".into(),
                            on_delete: OnDelete::SetNull,
                        },
                    )
                    .nullable(),
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
            ("origin_id", self.origin_id.into()),
        ]
    }

    fn set_field_value(&mut self, name: &str, value: Value) -> StaplerResult<()> {
        match name {
            "name" => self.name = value.as_str().unwrap_or_default().to_string(),
            "origin" => self.origin_id = value.as_int(),
            other => return Err(StaplerError::DatabaseError(format!("no field {other}"))),
        }
        Ok(())
    }

    fn from_row(row: &Row) -> StaplerResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            origin_id: row.get("origin_id")?,
        })
    }
}

async fn setup() -> SqliteBackend {
    let db = SqliteBackend::memory().unwrap();
    for meta in [Country::meta(), Bike::meta()] {
        db.execute_batch(&create_table_sql(meta)).await.unwrap();
        for sql in create_many_to_many_sql(meta).unwrap() {
            db.execute_batch(&sql).await.unwrap();
        }
    }
    db
}

async fn country(db: &SqliteBackend, name: &str) -> Country {
    let mut c = Country {
        id: None,
        name: name.to_string(),
    };
    assert!(save_model(&mut c, db).await.unwrap());
    c
}

// ── CRUD ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_save_inserts_then_updates() {
    let db = setup().await;
    let mut bike = Bike {
        name: "Propel".into(),
        ..Bike::default()
    };

    assert!(save_model(&mut bike, &db).await.unwrap());
    assert!(bike.id.is_some());

    bike.name = "Propel Advanced".into();
    assert!(!save_model(&mut bike, &db).await.unwrap());

    let loaded: Bike = get_by_pk(&db, bike.id.unwrap()).await.unwrap();
    assert_eq!(loaded.name, "Propel Advanced");
    assert_eq!(count::<Bike>(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_save_with_unknown_pk_inserts_with_that_pk() {
    let db = setup().await;
    let mut c = Country {
        id: Some(42),
        name: "Taiwan".into(),
    };
    assert!(save_model(&mut c, &db).await.unwrap());

    let loaded: Country = get_by_pk(&db, 42).await.unwrap();
    assert_eq!(loaded, c);
}

#[tokio::test]
async fn test_get_missing_is_does_not_exist() {
    let db = setup().await;
    let err = get_by_pk::<Country>(&db, 7).await.unwrap_err();
    assert!(matches!(err, StaplerError::DoesNotExist(_)));
}

#[tokio::test]
async fn test_refresh_and_delete() {
    let db = setup().await;
    let mut c = country(&db, "Netherlands").await;

    db.execute_sql(
        "UPDATE \"shop_country\" SET \"name\" = ? WHERE \"id\" = ?",
        &[Value::from("Holland"), Value::Int(c.id.unwrap())],
    )
    .await
    .unwrap();
    refresh_model(&mut c, &db).await.unwrap();
    assert_eq!(c.name, "Holland");

    assert_eq!(delete_model(&c, &db).await.unwrap(), 1);
    assert_eq!(count::<Country>(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unknown_foreign_key_is_integrity_error() {
    let db = setup().await;
    let mut bike = Bike {
        name: "Propel".into(),
        origin_id: Some(999),
        ..Bike::default()
    };
    let err = save_model(&mut bike, &db).await.unwrap_err();
    assert!(matches!(err, StaplerError::IntegrityError(_)));
    assert_eq!(count::<Bike>(&db).await.unwrap(), 0);
}

// ── Many-to-many ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_many_to_many_replace() {
    let db = setup().await;
    let nl = country(&db, "Netherlands").await;
    let tw = country(&db, "Taiwan").await;
    let mut bike = Bike {
        name: "Propel".into(),
        ..Bike::default()
    };
    save_model(&mut bike, &db).await.unwrap();
    let pk = bike.pk().unwrap();
    let nl_pk = nl.pk().unwrap();
    let tw_pk = tw.pk().unwrap();

    set_many_to_many(
        &db,
        Bike::meta(),
        "available_countries",
        &pk,
        &[tw_pk.clone(), nl_pk.clone(), tw_pk.clone()],
    )
    .await
    .unwrap();
    let ids = many_to_many_ids(&db, Bike::meta(), "available_countries", &pk)
        .await
        .unwrap();
    assert_eq!(ids, vec![nl_pk.clone(), tw_pk]);

    set_many_to_many(&db, Bike::meta(), "available_countries", &pk, &[nl_pk.clone()])
        .await
        .unwrap();
    let ids = many_to_many_ids(&db, Bike::meta(), "available_countries", &pk)
        .await
        .unwrap();
    assert_eq!(ids, vec![nl_pk]);
}

#[tokio::test]
async fn test_many_to_many_unknown_target_is_integrity_error() {
    let db = setup().await;
    let mut bike = Bike {
        name: "Propel".into(),
        ..Bike::default()
    };
    save_model(&mut bike, &db).await.unwrap();

    let err = set_many_to_many(
        &db,
        Bike::meta(),
        "available_countries",
        &bike.pk().unwrap(),
        &[Value::Int(999)],
    )
    .await
    .unwrap_err();
    assert!(matches!(err, StaplerError::IntegrityError(_)));
}
