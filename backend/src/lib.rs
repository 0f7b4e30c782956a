//! # Leadnorm - lead record normalization
//!
//! Leadnorm takes lead records exported from spreadsheets, CRMs and web forms,
//! whose column names vary from source to source, and turns them into one
//! canonical record shape with typed values and a required-field check.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV/JSON  │────▶│   Parser    │────▶│ Normalizer  │────▶│  Canonical  │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ (mappings)  │     │ + validated │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use leadnorm::{MappingSet, Normalizer};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let normalizer = Normalizer::new(Arc::new(MappingSet::default_leads()));
//! let raw = json!({ "Nome Completo": "Ana", "R$/Ficha": "R$ 1.234,56" });
//! let record = normalizer.normalize(raw.as_object().unwrap());
//! assert_eq!(record["valor_ficha"], 1234.56);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`config`] - Settings from the environment
//! - [`models`] - Records, field mappings, validation results
//! - [`parser`] - CSV parsing with auto-detection
//! - [`transform`] - Transforms, mapping sets, normalizer, pipeline
//! - [`validation`] - Required-field and mapping-config validation
//! - [`store`] - Named mapping sets on disk
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Normalization
pub mod transform;

// Validation
pub mod validation;

// Storage
pub mod store;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Errors
// =============================================================================

pub use error::{CsvError, MappingError, PipelineError, ServerError, StoreError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{normalize_key, CanonicalRecord, FieldMapping, RawRecord, ValidationResult};

// =============================================================================
// Re-exports - Normalization
// =============================================================================

pub use transform::{
    apply_geo_aliases, GeoNormalizer, MappingConfig, MappingSet, Normalizer, SharedMappings,
    Transform,
};

pub use transform::transforms::{
    is_truthy, parse_boolean, parse_currency, parse_date, parse_number, transforms_description,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{is_valid_mapping_config, validate_mapping_config, validate_record, validate_value};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    csv_to_records, decode_content, detect_delimiter, detect_encoding, parse_bytes_auto,
    parse_csv, parse_csv_file_auto, ParseResult,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    format_delimiter, normalize_bytes, normalize_csv, normalize_parsed, normalize_records,
    records_from_json, CsvInfo, InvalidRecord, NormalizationReport, PipelineOptions,
};

// =============================================================================
// Re-exports - Store, Config, API
// =============================================================================

pub use config::Settings;
pub use store::{MappingStore, StoredMapping};

pub use api::types::{error_response, NormalizeResponse};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
