//! Leadnorm CLI - normalize lead exports to canonical records
//!
//! # Main Commands
//!
//! ```bash
//! leadnorm serve                     # Start HTTP server (port 3000)
//! leadnorm normalize leads.csv       # CSV/JSON to canonical JSON
//! leadnorm mappings list             # Manage stored mapping sets
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! leadnorm parse leads.csv           # Just parse CSV to JSON
//! leadnorm validate records.json     # Check required fields
//! leadnorm transforms                # Show available transforms
//! ```

use clap::{Parser, Subcommand};
use leadnorm::{
    csv_to_records, decode_content, detect_encoding, format_delimiter, normalize_parsed,
    normalize_records, parse_csv_file_auto, records_from_json, server::AppState,
    transforms_description,
    validate_value, MappingSet, MappingStore, NormalizationReport, PipelineOptions, Settings,
    SharedMappings,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "leadnorm")]
#[command(about = "Normalize CRM lead exports to canonical records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output raw JSON records
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Normalize a CSV file or a JSON array of records
    Normalize {
        /// Input file (.csv or .json)
        input: PathBuf,

        /// Mapping-set JSON file
        #[arg(short, long, conflicts_with = "mapping_id")]
        mapping: Option<PathBuf>,

        /// Stored mapping set id
        #[arg(long)]
        mapping_id: Option<String>,

        /// Add lat/lng aliases
        #[arg(long)]
        geo: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip required-field validation
        #[arg(long)]
        no_validate: bool,

        /// Don't pick a compatible stored mapping set automatically
        #[arg(long)]
        no_store: bool,
    },

    /// Check canonical records for required fields
    Validate {
        /// Input JSON file (record or array of records)
        input: PathBuf,

        /// Mapping-set JSON file (default: built-in lead mappings)
        #[arg(short, long)]
        mapping: Option<PathBuf>,
    },

    /// Show available transforms
    Transforms,

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: LEADNORM_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage stored mapping sets
    Mappings {
        #[command(subcommand)]
        action: MappingAction,
    },
}

#[derive(Subcommand)]
enum MappingAction {
    /// List all stored mapping sets
    List,

    /// Show a stored mapping set
    Show {
        /// Mapping set ID
        id: String,
    },

    /// Import a mapping-set JSON file
    Import {
        /// Mapping-set JSON file
        file: PathBuf,
        /// Name for the stored set
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Delete a stored mapping set
    Delete {
        /// Mapping set ID
        id: String,
    },

    /// Print the built-in lead mappings
    Default,
}

#[tokio::main]
async fn main() {
    // Loads .env (if present)
    let settings = Settings::from_env();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse {
            input,
            delimiter,
            output,
        } => cmd_parse(&input, delimiter, output.as_deref()),

        Commands::Normalize {
            input,
            mapping,
            mapping_id,
            geo,
            output,
            no_validate,
            no_store,
        } => {
            let source = match (mapping, mapping_id) {
                (Some(path), _) => MappingSource::File(path),
                (None, Some(id)) => MappingSource::Stored(id),
                (None, None) if no_store => MappingSource::Settings,
                (None, None) => MappingSource::Auto,
            };
            cmd_normalize(&settings, &input, source, geo, no_validate, output.as_deref())
        }

        Commands::Validate { input, mapping } => cmd_validate(&input, mapping.as_deref()),

        Commands::Transforms => cmd_transforms(),

        Commands::Serve { port } => cmd_serve(&settings, port).await,

        Commands::Mappings { action } => cmd_mappings(&settings, action),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Where `normalize` gets its mapping set from
enum MappingSource {
    File(PathBuf),
    Stored(String),
    /// `LEADNORM_MAPPING` or the built-in set
    Settings,
    /// Best compatible stored set for CSV headers, else `Settings`
    Auto,
}

fn cmd_parse(
    input: &Path,
    delimiter: Option<char>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let records = match delimiter {
        Some(d) => {
            let bytes = fs::read(input)?;
            let content = decode_content(&bytes, &detect_encoding(&bytes))?;
            eprintln!("   Delimiter: '{}'", format_delimiter(d));
            csv_to_records(&content, d)?
        }
        None => {
            let result = parse_csv_file_auto(input)?;
            eprintln!("   Encoding: {}", result.encoding);
            eprintln!("   Delimiter: '{}' (auto-detected)", format_delimiter(result.delimiter));
            eprintln!("   Columns: {}", result.headers.join(", "));
            result.records
        }
    };
    eprintln!("✅ Parsed {} records", records.len());

    let json = serde_json::to_string_pretty(&records)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_normalize(
    settings: &Settings,
    input: &Path,
    source: MappingSource,
    geo: bool,
    no_validate: bool,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let is_json = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let mut store = MappingStore::with_dir(&settings.mappings_dir);
    let (mut options, mut used_id) = resolve_options(settings, &source, &store)?;
    options = options.geo(geo).skip_validation(no_validate);

    let report: NormalizationReport = if is_json {
        let content = fs::read_to_string(input)?;
        let value: Value = serde_json::from_str(&content)?;
        let records = records_from_json(&value)?;
        normalize_records(&records, &options)?
    } else {
        let parsed = parse_csv_file_auto(input)?;

        if matches!(source, MappingSource::Auto) {
            if let Some((stored, score)) = store.find_compatible(&parsed.headers).first() {
                eprintln!(
                    "   Using stored mapping set: {} ({}, {:.0}% of fields matched)",
                    stored.name,
                    stored.id,
                    score * 100.0
                );
                options.mapping = Arc::new(stored.mapping_set.clone());
                used_id = Some(stored.id.clone());
            }
        }

        normalize_parsed(parsed, &options)?
    };

    if let Some(id) = used_id {
        store.record_use(&id)?;
    }

    if !no_validate && report.invalid_count > 0 {
        for sample in report.invalid_samples.iter().take(5) {
            eprintln!("   Record {}: missing {}", sample.index, sample.missing.join(", "));
        }
    }

    let json = serde_json::to_string_pretty(&report.records)?;
    write_output(&json, output)?;

    eprintln!("\n✨ Done!");
    Ok(())
}

/// Pipeline options for an explicit mapping source. Flags win over
/// `LEADNORM_MAPPING`, which is only read when no flag names a set.
fn resolve_options(
    settings: &Settings,
    source: &MappingSource,
    store: &MappingStore,
) -> Result<(PipelineOptions, Option<String>), Box<dyn std::error::Error>> {
    let (mapping, used_id) = match source {
        MappingSource::File(path) => {
            let content = fs::read_to_string(path)?;
            (MappingSet::from_json(&content)?, None)
        }
        MappingSource::Stored(id) => (store.get(id)?.mapping_set.clone(), Some(id.clone())),
        MappingSource::Settings | MappingSource::Auto => {
            return Ok((PipelineOptions::from_settings(settings)?, None));
        }
    };

    let mut options = PipelineOptions::with_mapping(Arc::new(mapping));
    options.max_reported_errors = settings.max_reported_errors;
    Ok((options, used_id))
}

fn cmd_validate(input: &Path, mapping: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Validating: {}", input.display());

    let mapping_set = match mapping {
        Some(path) => MappingSet::from_json(&fs::read_to_string(path)?)?,
        None => MappingSet::default_leads(),
    };

    let content = fs::read_to_string(input)?;
    let value: Value = serde_json::from_str(&content)?;
    let records = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut valid = 0;
    let mut invalid = 0;

    for (i, record) in records.iter().enumerate() {
        let result = validate_value(record, &mapping_set);
        if result.valid {
            valid += 1;
            continue;
        }
        invalid += 1;
        if invalid <= 5 {
            eprintln!("\n❌ Record {} invalid:", i);
            eprintln!("   - missing: {}", result.missing.join(", "));
        }
    }

    eprintln!("\n📊 Results: {} valid, {} invalid", valid, invalid);

    if invalid > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_transforms() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", transforms_description());
    Ok(())
}

async fn cmd_serve(settings: &Settings, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let options = PipelineOptions::from_settings(settings)?;
    let mappings = Arc::new(SharedMappings::new(options.mapping.as_ref().clone()));

    let mut state = AppState::new(mappings);
    state.max_reported_errors = settings.max_reported_errors;

    leadnorm::server::start_server(port.unwrap_or(settings.port), state).await?;
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

fn cmd_mappings(settings: &Settings, action: MappingAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = MappingStore::with_dir(&settings.mappings_dir);

    match action {
        MappingAction::List => {
            let stored = store.list();
            if stored.is_empty() {
                eprintln!("📋 No mapping sets stored yet in {}.", store.dir().display());
                eprintln!("   Use 'leadnorm mappings import <file>' to add one.");
                return Ok(());
            }

            eprintln!("📋 Stored mapping sets ({}):\n", stored.len());
            for m in stored {
                println!("  📄 {} ({})", m.name, m.id);
                println!("     Fields: {}", m.mapping_set.target_fields().join(", "));
                println!("     Uses: {}", m.use_count);
                if let Some(ref last) = m.last_used {
                    println!("     Last used: {}", last);
                }
                println!();
            }
        }

        MappingAction::Import { file, name } => {
            eprintln!("📥 Importing mapping set from: {}", file.display());
            let id = store.import(&file, name.as_deref())?;
            eprintln!("✅ Mapping set saved with ID: {}", id);
        }

        MappingAction::Show { id } => {
            let m = store.get(&id)?;
            println!("📄 Mapping set: {} ({})\n", m.name, m.id);
            println!("Created: {}", m.created_at);
            println!("Uses: {}", m.use_count);
            if !m.source_columns.is_empty() {
                println!("Source columns: {}", m.source_columns.join(", "));
            }
            println!("\nMappings:");
            println!("{}", m.mapping_set.to_json()?);
        }

        MappingAction::Delete { id } => {
            store.delete(&id)?;
            eprintln!("🗑️  Mapping set deleted: {}", id);
        }

        MappingAction::Default => {
            println!("{}", MappingSet::default_leads().to_json()?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadnorm::FieldMapping;
    use tempfile::tempdir;

    fn broken_env_settings(dir: &Path) -> Settings {
        Settings {
            mappings_dir: dir.join("store"),
            mapping_file: Some(dir.join("missing.json")),
            max_reported_errors: 3,
            ..Settings::default()
        }
    }

    #[test]
    fn test_mapping_flag_overrides_env_mapping() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("form.json");
        fs::write(
            &file,
            r#"{"name":"form","mappings":[{"targetField":"nome","legacyAliases":["your-name"]}]}"#,
        )
        .unwrap();

        let settings = broken_env_settings(dir.path());
        let store = MappingStore::with_dir(&settings.mappings_dir);

        let (options, used_id) =
            resolve_options(&settings, &MappingSource::File(file), &store).unwrap();
        assert_eq!(options.mapping.name(), "form");
        assert_eq!(options.max_reported_errors, 3);
        assert!(used_id.is_none());
    }

    #[test]
    fn test_mapping_id_overrides_env_mapping() {
        let dir = tempdir().unwrap();
        let settings = broken_env_settings(dir.path());
        let mut store = MappingStore::with_dir(&settings.mappings_dir);
        let set = MappingSet::new("bitrix", vec![FieldMapping::new("nome")]).unwrap();
        let id = store.save(set, "bitrix", vec![]).unwrap();

        let (options, used_id) =
            resolve_options(&settings, &MappingSource::Stored(id.clone()), &store).unwrap();
        assert_eq!(options.mapping.name(), "bitrix");
        assert_eq!(used_id, Some(id));
    }

    #[test]
    fn test_env_mapping_read_without_flags() {
        let dir = tempdir().unwrap();
        let settings = broken_env_settings(dir.path());
        let store = MappingStore::with_dir(&settings.mappings_dir);

        assert!(resolve_options(&settings, &MappingSource::Settings, &store).is_err());
    }
}
