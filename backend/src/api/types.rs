//! REST API types.
//!
//! Records are returned in canonical form, ready to be upserted by the
//! caller.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::models::CanonicalRecord;
use crate::transform::pipeline::{format_delimiter, NormalizationReport};

/// Response sent after an upload or a record batch is normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Status: "ready", "warning", "error"
    pub status: String,

    /// Canonical records
    pub records: Vec<CanonicalRecord>,

    pub metadata: ResponseMetadata,
}

/// Metadata about the run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub total_records: usize,

    /// Mapping set used
    pub mapping_set: String,

    /// Present for CSV uploads
    pub csv_info: Option<CsvMetadata>,

    /// Required fields no column could satisfy
    #[serde(default)]
    pub unmatched_required: Vec<String>,

    pub validation: ValidationStats,
}

/// CSV file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub columns: Vec<String>,
}

/// Validation statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStats {
    pub valid: usize,
    pub invalid: usize,
    /// Required field -> number of records missing it
    pub missing_by_field: BTreeMap<String, usize>,
    pub errors: Vec<RecordError>,
}

/// An invalid record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordError {
    pub record_index: usize,
    pub missing: Vec<String>,
}

impl From<NormalizationReport> for NormalizeResponse {
    fn from(report: NormalizationReport) -> Self {
        let status = if report.invalid_count == 0 && report.unmatched_required.is_empty() {
            "ready"
        } else {
            "warning"
        };

        NormalizeResponse {
            job_id: Uuid::new_v4().to_string(),
            status: status.to_string(),
            metadata: ResponseMetadata {
                total_records: report.records.len(),
                mapping_set: report.mapping_set,
                csv_info: report.csv_info.map(|info| CsvMetadata {
                    encoding: info.encoding,
                    delimiter: format_delimiter(info.delimiter),
                    row_count: info.row_count,
                    columns: info.headers,
                }),
                unmatched_required: report.unmatched_required,
                validation: ValidationStats {
                    valid: report.valid_count,
                    invalid: report.invalid_count,
                    missing_by_field: report.missing_by_field,
                    errors: report
                        .invalid_samples
                        .into_iter()
                        .map(|s| RecordError {
                            record_index: s.index,
                            missing: s.missing,
                        })
                        .collect(),
                },
            },
            records: report.records,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "records": [],
        "metadata": {
            "totalRecords": 0,
            "mappingSet": null
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::pipeline::{normalize_bytes, PipelineOptions};

    #[test]
    fn test_response_from_report() {
        let report = normalize_bytes(
            b"Nome\tTelefone\tIdade\nAna\t1199\t30\n\t2199\t\n",
            &PipelineOptions::default(),
        )
        .unwrap();

        let response = NormalizeResponse::from(report);
        assert_eq!(response.status, "warning");
        assert_eq!(response.records.len(), 2);
        assert_eq!(response.records[0]["idade"], 30);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["metadata"]["mappingSet"], "leads");
        assert_eq!(json["metadata"]["csvInfo"]["delimiter"], "TAB");
        assert_eq!(json["metadata"]["validation"]["invalid"], 1);
        assert_eq!(json["metadata"]["validation"]["errors"][0]["recordIndex"], 1);
        assert_eq!(json["metadata"]["validation"]["missingByField"]["nome"], 1);
    }

    #[test]
    fn test_error_response_shape() {
        let body = error_response("No file provided");
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "No file provided");
        assert!(body["records"].as_array().unwrap().is_empty());
    }
}
