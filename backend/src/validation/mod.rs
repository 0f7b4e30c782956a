//! Validation of canonical records and mapping configuration.
//!
//! Two unrelated checks live here:
//!
//! - [`validate_record`]: required-field check of a normalized record. Missing
//!   data is reported in a [`ValidationResult`], never as an error.
//! - [`validate_mapping_config`]: JSON Schema (Draft 7) check of a mapping-set
//!   configuration document, run before it is deserialized.
//!
//! # Required-field semantics
//!
//! A required field counts as missing when it is absent **or falsy**: `null`,
//! `false`, `0` and `""` are all reported. A numeric field legitimately
//! holding `0` is therefore flagged; downstream forms rely on this.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use leadnorm::{validate_record, MappingSet};
//!
//! let set = MappingSet::default_leads();
//! let record = json!({ "nome": "Ana" }).as_object().cloned().unwrap();
//!
//! let result = validate_record(&record, &set);
//! assert!(!result.valid);
//! assert_eq!(result.missing, vec!["telefone"]);
//! ```

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::models::{CanonicalRecord, ValidationResult};
use crate::transform::mapping::MappingSet;
use crate::transform::transforms::is_truthy;

static MAPPING_SET_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/mapping-set.json"))
        .expect("Invalid embedded schema")
});

/// Check a canonical record against the required fields of a mapping set.
pub fn validate_record(record: &CanonicalRecord, mappings: &MappingSet) -> ValidationResult {
    let missing: Vec<String> = mappings
        .required_fields()
        .filter(|field| !record.get(*field).is_some_and(is_truthy))
        .map(str::to_string)
        .collect();

    ValidationResult::from_missing(missing)
}

/// Validate a JSON value that should be a canonical record.
///
/// Non-object values are missing every required field.
pub fn validate_value(value: &Value, mappings: &MappingSet) -> ValidationResult {
    match value.as_object() {
        Some(record) => validate_record(record, mappings),
        None => ValidationResult::from_missing(
            mappings.required_fields().map(str::to_string).collect(),
        ),
    }
}

/// Validate a JSON object against a JSON schema.
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with the error messages otherwise
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Simpler variant: just true/false.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate a mapping-set configuration document.
pub fn validate_mapping_config(data: &Value) -> Result<(), Vec<String>> {
    validate(&MAPPING_SET_SCHEMA, data)
}

/// Quick check against the mapping-set schema.
pub fn is_valid_mapping_config(data: &Value) -> bool {
    is_valid(&MAPPING_SET_SCHEMA, data)
}
