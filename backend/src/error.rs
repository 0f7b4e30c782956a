//! Error types for the lead normalization service.
//!
//! Errors are layered the same way the pipeline is:
//!
//! - [`MappingError`] - Invalid mapping-set configuration
//! - [`CsvError`] - CSV import errors
//! - [`StoreError`] - Mapping store errors
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP server errors
//!
//! Bad *data* is never an error here: transforms absorb parse failures and
//! missing required fields are reported through
//! [`ValidationResult`](crate::models::ValidationResult).

use thiserror::Error;

// =============================================================================
// Mapping Configuration Errors
// =============================================================================

/// Errors raised while building a mapping set.
#[derive(Debug, Error)]
pub enum MappingError {
    /// Two mappings share the same target field.
    #[error("Duplicate target field: {0}")]
    DuplicateTarget(String),

    /// A mapping names a transform that is not registered.
    #[error("Unknown transform '{transform}' on field '{field}'")]
    UnknownTransform { field: String, transform: String },

    /// A mapping has an empty target field.
    #[error("Mapping #{0} has an empty target field")]
    EmptyTarget(usize),

    /// The configuration document does not match the mapping-set schema.
    #[error("Invalid mapping configuration: {errors:?}")]
    Schema { errors: Vec<String> },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// CSV Import Errors
// =============================================================================

/// Errors during CSV import.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to decode the file content.
    #[error("Failed to decode content: {0}")]
    Encoding(String),

    /// Malformed CSV.
    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,
}

impl CsvError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or_default();
        match err.into_kind() {
            csv::ErrorKind::Io(io) => CsvError::Io(io),
            csv::ErrorKind::Utf8 { err, .. } => CsvError::Encoding(err.to_string()),
            other => CsvError::parse(line, format!("{:?}", other)),
        }
    }
}

// =============================================================================
// Mapping Store Errors
// =============================================================================

/// Errors from the on-disk mapping store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Mapping set not found.
    #[error("Mapping set not found: {0}")]
    NotFound(String),

    /// The stored or imported document is not a valid mapping set.
    #[error("Invalid mapping set: {0}")]
    Invalid(#[from] MappingError),

    /// IO error.
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::normalize_csv`]
/// and friends. It wraps the lower-level errors and adds pipeline-specific variants.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV import error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Mapping configuration error.
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Mapping store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Input JSON was not an array of objects.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No records to normalize.
    #[error("No records to normalize")]
    EmptyInput,
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
///
/// Request failures never reach this type: handlers answer them with an
/// error body.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind or serve.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for mapping-set construction.
pub type MappingResult<T> = Result<T, MappingError>;

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // CsvError -> PipelineError
        let csv_err = CsvError::EmptyFile;
        let pipeline_err: PipelineError = csv_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        // MappingError -> StoreError -> PipelineError
        let mapping_err = MappingError::DuplicateTarget("nome".into());
        let store_err: StoreError = mapping_err.into();
        let pipeline_err: PipelineError = store_err.into();
        assert!(pipeline_err.to_string().contains("nome"));
    }

    #[test]
    fn test_unknown_transform_format() {
        let err = MappingError::UnknownTransform {
            field: "valor_ficha".into(),
            transform: "parseMoney".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("valor_ficha"));
        assert!(msg.contains("parseMoney"));
    }

    #[test]
    fn test_server_bind_error() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port 3000 taken");
        let err: ServerError = io.into();
        assert!(matches!(err, ServerError::Io(_)));
        assert!(err.to_string().contains("port 3000 taken"));
    }

    #[test]
    fn test_csv_parse_error_format() {
        let err = CsvError::parse(5, "unterminated quote");
        assert_eq!(err.to_string(), "Line 5: unterminated quote");
    }
}
