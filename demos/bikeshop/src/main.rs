//! `bikeshop`: validates one submitted composite form and saves the bike and
//! manufacturer it describes.
//!
//! ```text
//! bikeshop --data 'bike__name=Propel&bike__price=3000&manufacturer__name=Giant&manufacturer__revenue=1B'
//! ```
//!
//! The valid sub-forms are saved and the result is printed as JSON. An
//! invalid manufacturer does not stop the bike from being saved.

mod models;

use std::path::PathBuf;

use anyhow::Context;
use stapler::core::logging::setup_logging;
use stapler::core::{settings_loader, QueryDict, Settings, SETTINGS};
use stapler::db::{count, create_model, Model};
use stapler::db_backends::schema::{create_many_to_many_sql, create_table_sql};
use stapler::db_backends::SqliteBackend;
use stapler::forms::{CompositeForm, CompositeFormSpec, Form, ModelFormConfig, SubFormSpec};

use crate::models::{Bike, Country, Manufacturer};

fn build_cli() -> clap::Command {
    clap::Command::new("bikeshop")
        .about("Create a bike and its manufacturer from one submitted form")
        .arg(
            clap::Arg::new("settings")
                .long("settings")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("TOML or .json settings file; STAPLER_* environment variables override it"),
        )
        .arg(
            clap::Arg::new("database")
                .long("database")
                .value_name("PATH")
                .help("SQLite file, or :memory: (default: the configured default database)"),
        )
        .arg(
            clap::Arg::new("data")
                .long("data")
                .value_name("QUERY")
                .required(true)
                .help("URL-encoded form data, e.g. bike__name=Propel&bike__price=3000"),
        )
        .arg(
            clap::Arg::new("dry-run")
                .long("dry-run")
                .action(clap::ArgAction::SetTrue)
                .help("Validate and build the instances without writing them"),
        )
}

fn load_settings(path: Option<&PathBuf>) -> anyhow::Result<Settings> {
    let Some(path) = path else {
        return Ok(settings_loader::from_env());
    };
    let loaded = if path.extension().is_some_and(|ext| ext == "json") {
        settings_loader::from_json_file(path).map(|mut settings| {
            settings_loader::apply_env_overrides(&mut settings);
            settings
        })
    } else {
        settings_loader::from_toml_file_with_env(path)
    };
    loaded.with_context(|| format!("loading settings from {}", path.display()))
}

fn bike_manufacturer_spec() -> anyhow::Result<CompositeFormSpec> {
    let bike = SubFormSpec::model::<Bike>(ModelFormConfig::new(Bike::meta()).only([
        "name",
        "frame_type",
        "price",
        "available_countries",
    ]));
    let manufacturer = SubFormSpec::model::<Manufacturer>(
        ModelFormConfig::new(Manufacturer::meta()).only(["name", "revenue", "country"]),
    );

    CompositeFormSpec::builder("BikeManufacturerForm")
        .sub_form(bike)
        .sub_form(manufacturer)
        .required(["bike"])
        .build()
        .context("building the bike/manufacturer form")
}

async fn prepare_database(db: &SqliteBackend) -> anyhow::Result<()> {
    for meta in [Country::meta(), Manufacturer::meta(), Bike::meta()] {
        db.execute_batch(&create_table_sql(meta)).await?;
        for sql in create_many_to_many_sql(meta)? {
            db.execute_batch(&sql).await?;
        }
    }

    if count::<Country>(db).await? == 0 {
        for name in ["Netherlands", "Taiwan"] {
            let mut country = Country {
                id: None,
                name: name.to_string(),
            };
            create_model(&mut country, db).await?;
            tracing::info!(pk = ?country.id, name, "seeded country");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = build_cli().get_matches();

    let settings = load_settings(matches.get_one::<PathBuf>("settings"))?;
    setup_logging(&settings);

    let database = matches
        .get_one::<String>("database")
        .cloned()
        .or_else(|| settings.default_database().map(|db| db.name.clone()))
        .context("no --database given and no default database configured")?;
    SETTINGS.configure(settings);

    let db = SqliteBackend::open(&database)?;
    prepare_database(&db).await?;

    let spec = bike_manufacturer_spec()?;
    let data = QueryDict::parse(matches.get_one::<String>("data").map_or("", String::as_str));

    let mut form = CompositeForm::builder(&spec).data(data).build()?;
    if !form.is_valid().await {
        let mut errors: Vec<_> = form.errors().iter().collect();
        errors.sort();
        for (field, messages) in errors {
            tracing::warn!(field = %field, ?messages, "field did not validate");
        }
    }

    let commit = !matches.get_flag("dry-run");
    let result = form.save_with(&db, commit).await?;
    tracing::info!(
        saved = result.saved_count(),
        of = result.len(),
        commit,
        "composite form processed"
    );

    println!("{}", serde_json::to_string_pretty(&result.to_json())?);
    Ok(())
}
