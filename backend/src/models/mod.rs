//! Domain models for lead normalization.
//!
//! - [`FieldMapping`] - Declarative definition of one canonical field
//! - [`RawRecord`] - A loosely-typed source row (CSV line, CRM payload, form)
//! - [`CanonicalRecord`] - The normalized output handed downstream
//! - [`ValidationResult`] - Required-field check outcome

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A source row with arbitrary keys. Key order is the order the source
/// produced them in (CSV header order, JSON document order).
pub type RawRecord = Map<String, Value>;

/// A normalized record keyed by canonical field names, followed by any
/// pass-through keys in their lower-cased form.
pub type CanonicalRecord = Map<String, Value>;

// =============================================================================
// Field Mapping
// =============================================================================

/// Definition of a single canonical field.
///
/// Serialized in camelCase so configuration documents read the same way the
/// CRM's mapping tables do:
///
/// ```json
/// {
///   "targetField": "valor_ficha",
///   "legacyAliases": ["Valor Ficha", "R$/Ficha"],
///   "transformFunction": "parseCurrency",
///   "isRequired": false
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    /// Canonical output key.
    pub target_field: String,

    /// Alternate source names, probed in order after `target_field`.
    #[serde(default)]
    pub legacy_aliases: Vec<String>,

    /// Name of a registered transform. `None` means pass-through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_function: Option<String>,

    /// Whether validation flags this field when missing or falsy.
    #[serde(default)]
    pub is_required: bool,
}

impl FieldMapping {
    /// Create a pass-through mapping with no aliases.
    pub fn new(target_field: &str) -> Self {
        Self {
            target_field: target_field.to_string(),
            legacy_aliases: Vec::new(),
            transform_function: None,
            is_required: false,
        }
    }

    /// Append legacy aliases, keeping their order.
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.legacy_aliases
            .extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Set the transform by its configuration name.
    pub fn with_transform(mut self, name: &str) -> Self {
        self.transform_function = Some(name.to_string());
        self
    }

    /// Mark as required.
    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    /// Candidate source names in priority order: the canonical name first,
    /// then the aliases as declared.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.target_field.as_str())
            .chain(self.legacy_aliases.iter().map(String::as_str))
    }
}

// =============================================================================
// Validation Result
// =============================================================================

/// Outcome of checking a canonical record against the required fields of a
/// mapping set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// `true` iff `missing` is empty.
    pub valid: bool,
    /// Required target fields that are absent or falsy, in mapping order.
    pub missing: Vec<String>,
}

impl ValidationResult {
    /// Build a result from the list of missing fields.
    pub fn from_missing(missing: Vec<String>) -> Self {
        Self {
            valid: missing.is_empty(),
            missing,
        }
    }
}

// =============================================================================
// Key normalization
// =============================================================================

/// Comparison form of a field name: surrounding whitespace trimmed and
/// lower-cased. Internal whitespace and punctuation are kept.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_mapping_deserialize_defaults() {
        let mapping: FieldMapping =
            serde_json::from_value(json!({ "targetField": "nome" })).unwrap();

        assert_eq!(mapping, FieldMapping::new("nome"));
        assert!(!mapping.is_required);
        assert!(mapping.legacy_aliases.is_empty());
    }

    #[test]
    fn test_field_mapping_camel_case() {
        let mapping = FieldMapping::new("valor_ficha")
            .with_aliases(["Valor Ficha", "R$/Ficha"])
            .with_transform("parseCurrency")
            .required();

        let value = serde_json::to_value(&mapping).unwrap();
        assert_eq!(value["targetField"], "valor_ficha");
        assert_eq!(value["legacyAliases"][1], "R$/Ficha");
        assert_eq!(value["transformFunction"], "parseCurrency");
        assert_eq!(value["isRequired"], true);
    }

    #[test]
    fn test_candidates_order() {
        let mapping = FieldMapping::new("telefone").with_aliases(["Telefone", "Celular"]);
        let candidates: Vec<&str> = mapping.candidates().collect();
        assert_eq!(candidates, vec!["telefone", "Telefone", "Celular"]);
    }

    #[test]
    fn test_normalize_key_keeps_inner_spaces() {
        assert_eq!(normalize_key("  Valor  Ficha "), "valor  ficha");
        assert_eq!(normalize_key("R$/Ficha"), "r$/ficha");
    }

    #[test]
    fn test_validation_result_from_missing() {
        assert!(ValidationResult::from_missing(vec![]).valid);
        let result = ValidationResult::from_missing(vec!["nome".into()]);
        assert!(!result.valid);
        assert_eq!(result.missing, vec!["nome"]);
    }
}
