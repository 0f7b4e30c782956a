//! Mapping set definition
//!
//! A mapping set is the ordered, immutable list of [`FieldMapping`]s used for
//! one normalization pass, with every transform name already resolved.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::transforms::Transform;
use crate::api::logs::log_warning;
use crate::error::{MappingError, MappingResult};
use crate::models::{normalize_key, FieldMapping};
use crate::validation::validate_mapping_config;

/// Name given to sets loaded without one.
pub const DEFAULT_SET_NAME: &str = "default";

/// Configuration document for a mapping set, as stored on disk or sent over
/// the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Human-readable name
    #[serde(default = "default_name")]
    pub name: String,

    /// Free-form description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Field definitions, in resolution order
    pub mappings: Vec<FieldMapping>,
}

fn default_name() -> String {
    DEFAULT_SET_NAME.to_string()
}

/// An immutable, validated set of field mappings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "MappingConfig", try_from = "MappingConfig")]
pub struct MappingSet {
    name: String,
    description: String,
    mappings: Vec<FieldMapping>,
    /// Resolved transform per mapping, same indices as `mappings`
    transforms: Vec<Option<Transform>>,
    /// target_field -> index into `mappings`
    index: HashMap<String, usize>,
}

impl MappingSet {
    /// Build a set, rejecting duplicate targets and unknown transforms.
    pub fn new(name: &str, mappings: Vec<FieldMapping>) -> MappingResult<Self> {
        Self::build(name, String::new(), mappings, true)
    }

    /// Build a set, keeping fields with unknown transforms as pass-through.
    ///
    /// Duplicate targets are still rejected.
    pub fn new_lenient(name: &str, mappings: Vec<FieldMapping>) -> MappingResult<Self> {
        Self::build(name, String::new(), mappings, false)
    }

    /// Build a set from a configuration document (strict).
    pub fn from_config(config: MappingConfig) -> MappingResult<Self> {
        Self::build(&config.name, config.description, config.mappings, true)
    }

    /// Parse a set from a JSON string.
    pub fn from_json(json: &str) -> MappingResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Parse a set from a JSON value, checking it against the mapping-set
    /// schema first.
    pub fn from_value(value: &Value) -> MappingResult<Self> {
        validate_mapping_config(value).map_err(|errors| MappingError::Schema { errors })?;
        let config: MappingConfig = serde_json::from_value(value.clone())?;
        Self::from_config(config)
    }

    /// Serialize to a pretty JSON configuration document.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn build(
        name: &str,
        description: String,
        mappings: Vec<FieldMapping>,
        strict: bool,
    ) -> MappingResult<Self> {
        let mut index = HashMap::with_capacity(mappings.len());
        let mut transforms = Vec::with_capacity(mappings.len());

        for (i, mapping) in mappings.iter().enumerate() {
            if mapping.target_field.trim().is_empty() {
                return Err(MappingError::EmptyTarget(i));
            }
            if index.insert(mapping.target_field.clone(), i).is_some() {
                return Err(MappingError::DuplicateTarget(mapping.target_field.clone()));
            }

            let transform = match mapping.transform_function.as_deref() {
                None => None,
                Some(t) => match Transform::from_name(t) {
                    Some(resolved) => Some(resolved),
                    None if strict => {
                        return Err(MappingError::UnknownTransform {
                            field: mapping.target_field.clone(),
                            transform: t.to_string(),
                        })
                    }
                    None => {
                        log_warning(format!(
                            "Unknown transform '{}' on '{}', values pass through unchanged",
                            t, mapping.target_field
                        ));
                        None
                    }
                },
            };
            transforms.push(transform);
        }

        Ok(Self {
            name: name.to_string(),
            description,
            mappings,
            transforms,
            index,
        })
    }

    /// Set name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Number of mapped fields.
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Look up a mapping by its target field.
    pub fn get(&self, target_field: &str) -> Option<&FieldMapping> {
        self.index.get(target_field).map(|&i| &self.mappings[i])
    }

    /// Resolved transform of a target field.
    pub fn transform_for(&self, target_field: &str) -> Option<Transform> {
        self.index
            .get(target_field)
            .and_then(|&i| self.transforms[i])
    }

    /// Mappings with their resolved transforms, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldMapping, Option<Transform>)> {
        self.mappings
            .iter()
            .zip(self.transforms.iter().copied())
    }

    /// The raw field definitions.
    pub fn mappings(&self) -> &[FieldMapping] {
        &self.mappings
    }

    /// Target fields marked as required, in declaration order.
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.mappings
            .iter()
            .filter(|m| m.is_required)
            .map(|m| m.target_field.as_str())
    }

    /// Get all target fields
    pub fn target_fields(&self) -> Vec<String> {
        self.mappings.iter().map(|m| m.target_field.clone()).collect()
    }

    /// Fraction of mapped fields that at least one header can satisfy.
    pub fn coverage(&self, headers: &[String]) -> f64 {
        if self.mappings.is_empty() {
            return 0.0;
        }
        let keys: Vec<String> = headers.iter().map(|h| normalize_key(h)).collect();
        let covered = self
            .mappings
            .iter()
            .filter(|m| matches_any(m, &keys))
            .count();
        covered as f64 / self.mappings.len() as f64
    }

    /// Required fields that no header can satisfy.
    pub fn validate_headers(&self, headers: &[String]) -> Result<(), Vec<String>> {
        let keys: Vec<String> = headers.iter().map(|h| normalize_key(h)).collect();
        let missing: Vec<String> = self
            .mappings
            .iter()
            .filter(|m| m.is_required && !matches_any(m, &keys))
            .map(|m| m.target_field.clone())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }

    /// Built-in mappings for lead imports (spreadsheets, CRM exports, forms).
    pub fn default_leads() -> Self {
        let mappings = vec![
            FieldMapping::new("nome")
                .with_aliases(["Nome", "Nome Completo", "Nome do Lead", "NAME", "TITLE"])
                .required(),
            FieldMapping::new("telefone")
                .with_aliases(["Telefone", "Celular", "WhatsApp", "PHONE", "Telefone Principal"])
                .required(),
            FieldMapping::new("email").with_aliases(["E-mail", "Email", "EMAIL"]),
            FieldMapping::new("idade")
                .with_aliases(["Idade", "Age"])
                .with_transform("parseNumber"),
            FieldMapping::new("valor_ficha")
                .with_aliases(["Valor Ficha", "R$/Ficha", "Valor da Ficha"])
                .with_transform("parseCurrency"),
            FieldMapping::new("data_criacao_ficha")
                .with_aliases(["Data de criação da Ficha", "Data Criação", "Criado em", "DATE_CREATE"])
                .with_transform("parseDate"),
            FieldMapping::new("projeto_comercial")
                .with_aliases(["Projetos Comerciais", "Projeto Comercial", "Projeto"]),
            FieldMapping::new("scouter").with_aliases(["Scouter", "Responsável", "ASSIGNED_BY"]),
            FieldMapping::new("etapa").with_aliases(["Etapa", "Fase", "STAGE_ID"]),
            FieldMapping::new("ficha_confirmada")
                .with_aliases(["Ficha Confirmada", "Confirmada"])
                .with_transform("parseBoolean"),
            FieldMapping::new("presenca_confirmada")
                .with_aliases(["Presença Confirmada", "Compareceu"])
                .with_transform("parseBoolean"),
            FieldMapping::new("local_abordagem")
                .with_aliases(["Local da Abordagem", "Local", "Endereço"]),
            FieldMapping::new("latitude")
                .with_aliases(["Latitude", "lat"])
                .with_transform("parseNumber"),
            FieldMapping::new("longitude")
                .with_aliases(["Longitude", "lng", "lon"])
                .with_transform("parseNumber"),
            FieldMapping::new("bitrix_id").with_aliases(["ID Bitrix", "ID"]),
        ];

        let mut set = Self::new("leads", mappings)
            .expect("built-in lead mappings are valid");
        set.description = "Default lead import mappings".to_string();
        set
    }
}

impl Default for MappingSet {
    fn default() -> Self {
        Self::default_leads()
    }
}

impl From<MappingSet> for MappingConfig {
    fn from(set: MappingSet) -> Self {
        MappingConfig {
            name: set.name,
            description: set.description,
            mappings: set.mappings,
        }
    }
}

impl TryFrom<MappingConfig> for MappingSet {
    type Error = MappingError;

    fn try_from(config: MappingConfig) -> Result<Self, Self::Error> {
        MappingSet::from_config(config)
    }
}

fn matches_any(mapping: &FieldMapping, keys: &[String]) -> bool {
    mapping
        .candidates()
        .map(normalize_key)
        .any(|c| keys.contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_leads_is_valid() {
        let set = MappingSet::default_leads();
        assert_eq!(set.name(), "leads");
        assert!(set.get("valor_ficha").is_some());
        assert_eq!(set.transform_for("valor_ficha"), Some(Transform::ParseCurrency));
        assert_eq!(set.transform_for("nome"), None);
        let required: Vec<&str> = set.required_fields().collect();
        assert_eq!(required, vec!["nome", "telefone"]);
    }

    #[test]
    fn test_duplicate_target_rejected() {
        let result = MappingSet::new(
            "dup",
            vec![FieldMapping::new("nome"), FieldMapping::new("nome")],
        );
        assert!(matches!(result, Err(MappingError::DuplicateTarget(f)) if f == "nome"));

        let lenient = MappingSet::new_lenient(
            "dup",
            vec![FieldMapping::new("nome"), FieldMapping::new("nome")],
        );
        assert!(lenient.is_err());
    }

    #[test]
    fn test_unknown_transform() {
        let mappings = vec![FieldMapping::new("valor").with_transform("parseMoney")];

        let strict = MappingSet::new("x", mappings.clone());
        assert!(matches!(strict, Err(MappingError::UnknownTransform { .. })));

        let lenient = MappingSet::new_lenient("x", mappings).unwrap();
        assert_eq!(lenient.transform_for("valor"), None);
        assert_eq!(
            lenient.get("valor").unwrap().transform_function.as_deref(),
            Some("parseMoney")
        );
    }

    #[test]
    fn test_empty_target_rejected() {
        let result = MappingSet::new("x", vec![FieldMapping::new("a"), FieldMapping::new("  ")]);
        assert!(matches!(result, Err(MappingError::EmptyTarget(1))));
    }

    #[test]
    fn test_from_json_roundtrip_keeps_order() {
        let set = MappingSet::default_leads();
        let json = set.to_json().unwrap();
        let parsed = MappingSet::from_json(&json).unwrap();
        assert_eq!(parsed.target_fields(), set.target_fields());
        assert_eq!(parsed.description(), set.description());
    }

    #[test]
    fn test_from_value_schema_error() {
        let result = MappingSet::from_value(&json!({ "mappings": [{ "legacyAliases": [] }] }));
        assert!(matches!(result, Err(MappingError::Schema { .. })));
    }

    #[test]
    fn test_coverage_and_headers() {
        let set = MappingSet::new(
            "small",
            vec![
                FieldMapping::new("nome").with_aliases(["Nome Completo"]).required(),
                FieldMapping::new("telefone").with_aliases(["Celular"]).required(),
            ],
        )
        .unwrap();

        let headers = vec![" nome completo ".to_string(), "Cidade".to_string()];
        assert!((set.coverage(&headers) - 0.5).abs() < f64::EPSILON);
        assert_eq!(set.validate_headers(&headers), Err(vec!["telefone".to_string()]));

        let full = vec!["NOME".to_string(), "celular".to_string()];
        assert!(set.validate_headers(&full).is_ok());
    }
}
