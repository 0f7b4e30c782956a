//! Normalizer
//!
//! Resolves canonical values from a raw record using a [`MappingSet`].
//!
//! For each mapping, in order, the candidate names are the target field
//! followed by its legacy aliases. The first candidate that equals a raw key
//! (both sides trimmed and lower-cased) wins, and the first raw key in
//! iteration order is the one taken. A present key is resolved even when its
//! value is `null`, `0`, `false` or `""`.
//!
//! Afterwards every raw key whose lower-cased form is not already an output
//! key is copied through unchanged, so no source column is silently dropped.

use rayon::prelude::*;
use serde_json::Value;
use std::sync::Arc;

use super::mapping::MappingSet;
use crate::models::{normalize_key, CanonicalRecord, FieldMapping, RawRecord};

/// Normalizes raw records against one mapping set.
///
/// Cheap to clone; the mapping set is shared, never mutated.
#[derive(Debug, Clone)]
pub struct Normalizer {
    mappings: Arc<MappingSet>,
}

impl Normalizer {
    pub fn new(mappings: Arc<MappingSet>) -> Self {
        Self { mappings }
    }

    /// The mapping set this normalizer resolves against.
    pub fn mappings(&self) -> &MappingSet {
        &self.mappings
    }

    /// Normalize one raw record.
    pub fn normalize(&self, raw: &RawRecord) -> CanonicalRecord {
        // Comparison form of every raw key, computed once per record.
        let keys: Vec<(String, &Value)> = raw
            .iter()
            .map(|(k, v)| (normalize_key(k), v))
            .collect();

        let mut output = CanonicalRecord::new();

        for (mapping, transform) in self.mappings.iter() {
            let Some(value) = resolve(mapping, &keys) else {
                continue;
            };
            let value = match transform {
                Some(t) => t.apply(value),
                None => value.clone(),
            };
            output.insert(mapping.target_field.clone(), value);
        }

        for (key, value) in keys {
            if !output.contains_key(&key) {
                output.insert(key, value.clone());
            }
        }

        output
    }

    /// Normalize a batch in parallel. Output order matches input order.
    pub fn normalize_batch(&self, records: &[RawRecord]) -> Vec<CanonicalRecord> {
        records.par_iter().map(|r| self.normalize(r)).collect()
    }

    /// Normalize a JSON value; non-object values yield `None`.
    pub fn normalize_value(&self, value: &Value) -> Option<CanonicalRecord> {
        value.as_object().map(|raw| self.normalize(raw))
    }
}

/// First raw value matching the mapping's candidates in priority order.
fn resolve<'a>(mapping: &FieldMapping, keys: &[(String, &'a Value)]) -> Option<&'a Value> {
    mapping.candidates().find_map(|candidate| {
        let candidate = normalize_key(candidate);
        keys.iter()
            .find(|(key, _)| *key == candidate)
            .map(|(_, value)| *value)
    })
}
