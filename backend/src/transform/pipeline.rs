//! High-level pipeline API for lead imports.
//!
//! Combines the steps a caller usually wants: CSV parsing, normalization,
//! optional geo aliasing, and validation, with a report of what happened.
//!
//! # Example
//!
//! ```rust,ignore
//! use leadnorm::{normalize_csv, PipelineOptions};
//! use std::path::Path;
//!
//! let report = normalize_csv(Path::new("leads.csv"), &PipelineOptions::default())?;
//! println!("{} valid, {} invalid", report.valid_count, report.invalid_count);
//! ```

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use super::geo::GeoNormalizer;
use super::mapping::MappingSet;
use super::normalizer::Normalizer;
use crate::api::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::config::{Settings, DEFAULT_MAX_REPORTED_ERRORS};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{CanonicalRecord, RawRecord, ValidationResult};
use crate::parser::{parse_bytes_auto, parse_csv_file_auto, ParseResult};
use crate::validation::validate_record;

/// Options for the normalization pipeline
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Mapping set to resolve against
    pub mapping: Arc<MappingSet>,

    /// Add `lat`/`lng` aliases
    pub geo: bool,

    /// Skip the required-field check
    pub skip_validation: bool,

    /// How many invalid records to keep in `invalid_samples`
    pub max_reported_errors: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::with_mapping(Arc::new(MappingSet::default_leads()))
    }
}

impl PipelineOptions {
    pub fn with_mapping(mapping: Arc<MappingSet>) -> Self {
        Self {
            mapping,
            geo: false,
            skip_validation: false,
            max_reported_errors: DEFAULT_MAX_REPORTED_ERRORS,
        }
    }

    /// Options from settings: the configured mapping file, or the built-in
    /// lead mappings.
    pub fn from_settings(settings: &Settings) -> PipelineResult<Self> {
        let mapping = match &settings.mapping_file {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    PipelineError::InvalidInput(format!(
                        "cannot read mapping file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                MappingSet::from_json(&content)?
            }
            None => MappingSet::default_leads(),
        };

        let mut options = Self::with_mapping(Arc::new(mapping));
        options.max_reported_errors = settings.max_reported_errors;
        Ok(options)
    }

    pub fn geo(mut self, geo: bool) -> Self {
        self.geo = geo;
        self
    }

    pub fn skip_validation(mut self, skip: bool) -> Self {
        self.skip_validation = skip;
        self
    }
}

/// CSV file information
#[derive(Debug, Clone, Serialize)]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

/// A record that failed validation
#[derive(Debug, Clone, Serialize)]
pub struct InvalidRecord {
    pub index: usize,
    pub missing: Vec<String>,
}

/// Result of a normalization run
#[derive(Debug, Clone, Serialize)]
pub struct NormalizationReport {
    /// Canonical records, in input order
    pub records: Vec<CanonicalRecord>,

    /// One result per record; empty when validation was skipped
    pub validation: Vec<ValidationResult>,

    pub valid_count: usize,
    pub invalid_count: usize,

    /// First invalid records, up to `max_reported_errors`
    pub invalid_samples: Vec<InvalidRecord>,

    /// How often each required field was missing
    pub missing_by_field: BTreeMap<String, usize>,

    /// Required fields no CSV header can satisfy
    pub unmatched_required: Vec<String>,

    /// Name of the mapping set used
    pub mapping_set: String,

    /// Present when the input was a CSV
    pub csv_info: Option<CsvInfo>,
}

/// Normalize a CSV file.
pub fn normalize_csv(path: &Path, options: &PipelineOptions) -> PipelineResult<NormalizationReport> {
    log_info(format!("📖 Reading {}...", path.display()));
    let parsed = parse_csv_file_auto(path)?;
    normalize_parsed(parsed, options)
}

/// Normalize CSV bytes (uploads).
pub fn normalize_bytes(bytes: &[u8], options: &PipelineOptions) -> PipelineResult<NormalizationReport> {
    log_info(format!("📖 Reading {} bytes...", bytes.len()));
    let parsed = parse_bytes_auto(bytes)?;
    normalize_parsed(parsed, options)
}

/// Normalize records that did not come from a CSV (JSON payloads, forms).
pub fn normalize_records(
    records: &[RawRecord],
    options: &PipelineOptions,
) -> PipelineResult<NormalizationReport> {
    if records.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    Ok(run(records, options, None, Vec::new()))
}

/// Raw records from a JSON document: an array of objects or a single object.
pub fn records_from_json(value: &Value) -> PipelineResult<Vec<RawRecord>> {
    match value {
        Value::Object(record) => Ok(vec![record.clone()]),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_object().cloned().ok_or_else(|| {
                    PipelineError::InvalidInput(format!("item {} is not an object", i))
                })
            })
            .collect(),
        _ => Err(PipelineError::InvalidInput(
            "expected an object or an array of objects".to_string(),
        )),
    }
}

/// Normalize an already parsed CSV.
pub fn normalize_parsed(
    parsed: ParseResult,
    options: &PipelineOptions,
) -> PipelineResult<NormalizationReport> {
    log_success(format!("Detected encoding: {}", parsed.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(parsed.delimiter)));
    log_success(format!("Read {} rows", parsed.records.len()));

    if parsed.records.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    log_info(format!("📋 CSV has {} columns:", parsed.headers.len()));
    for (i, col) in parsed.headers.iter().enumerate() {
        log_info_indent(format!("[{:2}] {}", i + 1, col), 1);
    }

    let unmatched = match options.mapping.validate_headers(&parsed.headers) {
        Ok(()) => Vec::new(),
        Err(missing) => {
            log_warning(format!(
                "No column for required field(s): {}",
                missing.join(", ")
            ));
            missing
        }
    };

    let csv_info = CsvInfo {
        encoding: parsed.encoding,
        delimiter: parsed.delimiter,
        headers: parsed.headers,
        row_count: parsed.records.len(),
    };

    Ok(run(&parsed.records, options, Some(csv_info), unmatched))
}

fn run(
    raw: &[RawRecord],
    options: &PipelineOptions,
    csv_info: Option<CsvInfo>,
    unmatched_required: Vec<String>,
) -> NormalizationReport {
    let mapping = &options.mapping;
    log_info(format!(
        "⚙️  Normalizing with mapping set \"{}\" ({} fields)...",
        mapping.name(),
        mapping.len()
    ));

    let normalizer = Normalizer::new(Arc::clone(mapping));
    let records = if options.geo {
        GeoNormalizer::new(normalizer).normalize_batch(raw)
    } else {
        normalizer.normalize_batch(raw)
    };
    log_success(format!("Normalized {} records", records.len()));

    let mut report = NormalizationReport {
        valid_count: records.len(),
        invalid_count: 0,
        validation: Vec::new(),
        invalid_samples: Vec::new(),
        missing_by_field: BTreeMap::new(),
        unmatched_required,
        mapping_set: mapping.name().to_string(),
        csv_info,
        records,
    };

    if options.skip_validation {
        log_info("(validation skipped)");
        return report;
    }

    log_info("✔️  Validating required fields...");
    report.validation = report
        .records
        .iter()
        .map(|r| validate_record(r, mapping))
        .collect();

    report.valid_count = 0;
    for (index, result) in report.validation.iter().enumerate() {
        if result.valid {
            report.valid_count += 1;
            continue;
        }
        report.invalid_count += 1;
        for field in &result.missing {
            *report.missing_by_field.entry(field.clone()).or_default() += 1;
        }
        if report.invalid_samples.len() < options.max_reported_errors {
            report.invalid_samples.push(InvalidRecord {
                index,
                missing: result.missing.clone(),
            });
        }
    }

    print_validation_summary(&report);
    report
}

fn print_validation_summary(report: &NormalizationReport) {
    if report.invalid_count == 0 {
        log_success(format!("All {} records valid!", report.valid_count));
        return;
    }

    log_success(format!("Valid: {}", report.valid_count));
    log_error(format!("Invalid: {}", report.invalid_count));
    for (field, count) in &report.missing_by_field {
        log_warning(format!("• {} missing in {} record(s)", field, count));
    }
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_options() {
        let opts = PipelineOptions::default();
        assert_eq!(opts.mapping.name(), "leads");
        assert!(!opts.geo);
        assert!(!opts.skip_validation);
        assert_eq!(opts.max_reported_errors, DEFAULT_MAX_REPORTED_ERRORS);
    }

    #[test]
    fn test_normalize_bytes() {
        let csv = "Nome Completo;Celular;R$/Ficha;Observação\n\
                   Ana Souza;11 99999-0000;R$ 25,00;Ligar cedo\n\
                   ;11 98888-0000;10,00;\n";

        let report = normalize_bytes(csv.as_bytes(), &PipelineOptions::default()).unwrap();

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0]["nome"], "Ana Souza");
        assert_eq!(report.records[0]["valor_ficha"], json!(25));
        assert_eq!(report.records[0]["observação"], "Ligar cedo");
        assert_eq!(report.valid_count, 1);
        assert_eq!(report.invalid_count, 1);
        assert_eq!(report.invalid_samples[0].index, 1);
        assert_eq!(report.invalid_samples[0].missing, vec!["nome"]);
        assert_eq!(report.missing_by_field["nome"], 1);
        assert!(report.unmatched_required.is_empty());
        assert_eq!(report.csv_info.as_ref().unwrap().delimiter, ';');
    }

    #[test]
    fn test_unmatched_required_header() {
        let report =
            normalize_bytes(b"Nome,Cidade\nAna,SP", &PipelineOptions::default()).unwrap();
        assert_eq!(report.unmatched_required, vec!["telefone"]);
        assert_eq!(report.invalid_count, 1);
    }

    #[test]
    fn test_header_only_csv_is_empty_input() {
        let result = normalize_bytes(b"Nome;Telefone\n", &PipelineOptions::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn test_skip_validation_and_geo() {
        let records = records_from_json(&json!([{ "lat": "-23.5", "Longitude": "-46.6" }])).unwrap();
        let options = PipelineOptions::default().geo(true).skip_validation(true);

        let report = normalize_records(&records, &options).unwrap();
        assert!(report.validation.is_empty());
        assert_eq!(report.valid_count, 1);
        assert_eq!(report.records[0]["latitude"], json!(-23.5));
        assert_eq!(report.records[0]["lat"], json!(-23.5));
        assert_eq!(report.records[0]["lng"], json!(-46.6));
        assert!(report.csv_info.is_none());
    }

    #[test]
    fn test_max_reported_errors() {
        let records: Vec<RawRecord> = (0..5)
            .map(|_| json!({ "Cidade": "SP" }).as_object().cloned().unwrap())
            .collect();
        let mut options = PipelineOptions::default();
        options.max_reported_errors = 2;

        let report = normalize_records(&records, &options).unwrap();
        assert_eq!(report.invalid_count, 5);
        assert_eq!(report.invalid_samples.len(), 2);
        assert_eq!(report.missing_by_field["telefone"], 5);
    }

    #[test]
    fn test_records_from_json() {
        assert_eq!(records_from_json(&json!({ "a": 1 })).unwrap().len(), 1);
        assert_eq!(records_from_json(&json!([{ "a": 1 }, { "b": 2 }])).unwrap().len(), 2);
        assert!(records_from_json(&json!([{ "a": 1 }, 3])).is_err());
        assert!(records_from_json(&json!("x")).is_err());
        assert!(matches!(normalize_records(&[], &PipelineOptions::default()), Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn test_from_settings_with_mapping_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("form.json");
        std::fs::write(
            &path,
            r#"{"name":"form","mappings":[{"targetField":"nome","legacyAliases":["your-name"],"isRequired":true}]}"#,
        )
        .unwrap();

        let settings = Settings {
            mapping_file: Some(path),
            max_reported_errors: 4,
            ..Settings::default()
        };
        let options = PipelineOptions::from_settings(&settings).unwrap();
        assert_eq!(options.mapping.name(), "form");
        assert_eq!(options.max_reported_errors, 4);

        let missing = Settings {
            mapping_file: Some(dir.path().join("nope.json")),
            ..Settings::default()
        };
        assert!(PipelineOptions::from_settings(&missing).is_err());
    }

    #[test]
    fn test_format_delimiter() {
        assert_eq!(format_delimiter('\t'), "TAB");
        assert_eq!(format_delimiter(';'), ";");
    }
}
