use crate::cli::{ImportArgs, MigrateArgs};
use chrono::{SecondsFormat, Utc};
use childcare_registry::config::AppConfig;
use childcare_registry::error::AppError;
use childcare_registry::store::MemoryStore;
use childcare_registry::telemetry;
use childcare_registry::workflows::import::LegacyImporter;
use childcare_registry::workflows::migration::SchemaMigration;
use serde_json::Value;

pub(crate) fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let store = MemoryStore::new();
    let importer = LegacyImporter::new(&store, config.import.clone());
    let summary = importer.run_path(&args.file, args.dry)?;

    println!("rows read:        {}", summary.rows);
    println!("unique parents:   {}", summary.unique_parents);
    println!("unique children:  {}", summary.unique_children);
    if summary.dry_run {
        println!("dry run, nothing written");
        for (id, doc) in summary
            .parent_samples
            .iter()
            .chain(summary.child_samples.iter())
        {
            println!("  {id}: {}", Value::Object(doc.clone()));
        }
    } else {
        println!("written parents:  {}", summary.written_parents);
        println!("written children: {}", summary.written_children);
    }
    Ok(())
}

pub(crate) fn run_migrate(args: MigrateArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let store = MemoryStore::new();
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let report = SchemaMigration::new(&store, args.dry).run(&now)?;

    if args.dry {
        println!("dry run, nothing written");
    }
    println!("reference upgrades:   {}", report.reference_upgrades);
    println!("embedded processed:   {}", report.embedded_processed);
    println!("children created:     {}", report.children_created);
    println!("children merged:      {}", report.children_merged);
    println!("parents missing uid:  {}", report.parents_missing_uid);
    Ok(())
}
