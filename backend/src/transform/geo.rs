//! Geo aliasing for map consumers.
//!
//! Map widgets read short `lat`/`lng` keys; canonical records carry
//! `latitude`/`longitude`. Aliasing only ever adds keys.

use rayon::prelude::*;

use super::normalizer::Normalizer;
use crate::models::{CanonicalRecord, RawRecord};

const GEO_ALIASES: [(&str, &str); 2] = [("latitude", "lat"), ("longitude", "lng")];

/// Copy `latitude` to `lat` and `longitude` to `lng` when present.
pub fn apply_geo_aliases(record: &mut CanonicalRecord) {
    for (source, alias) in GEO_ALIASES {
        if let Some(value) = record.get(source).cloned() {
            record.insert(alias.to_string(), value);
        }
    }
}

/// A [`Normalizer`] that also adds geo aliases.
#[derive(Debug, Clone)]
pub struct GeoNormalizer {
    inner: Normalizer,
}

impl GeoNormalizer {
    pub fn new(inner: Normalizer) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Normalizer {
        &self.inner
    }

    pub fn normalize(&self, raw: &RawRecord) -> CanonicalRecord {
        let mut record = self.inner.normalize(raw);
        apply_geo_aliases(&mut record);
        record
    }

    /// Parallel batch variant, order preserving.
    pub fn normalize_batch(&self, records: &[RawRecord]) -> Vec<CanonicalRecord> {
        records.par_iter().map(|r| self.normalize(r)).collect()
    }
}

impl From<Normalizer> for GeoNormalizer {
    fn from(inner: Normalizer) -> Self {
        Self::new(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::mapping::MappingSet;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_latitude_aliased() {
        let mut record = json!({ "latitude": -23.55, "longitude": -46.63 })
            .as_object()
            .cloned()
            .unwrap();
        apply_geo_aliases(&mut record);

        assert_eq!(record["lat"], json!(-23.55));
        assert_eq!(record["lng"], json!(-46.63));
        assert_eq!(record["latitude"], json!(-23.55));
        assert_eq!(record["longitude"], json!(-46.63));
    }

    #[test]
    fn test_absent_source_leaves_alias_unset() {
        let mut record = json!({ "longitude": 1.5 }).as_object().cloned().unwrap();
        apply_geo_aliases(&mut record);

        assert!(!record.contains_key("lat"));
        assert_eq!(record["lng"], json!(1.5));
    }

    #[test]
    fn test_geo_normalizer_end_to_end() {
        let normalizer =
            GeoNormalizer::from(Normalizer::new(Arc::new(MappingSet::default_leads())));
        let raw = json!({ "Nome": "Ana", "Latitude": "-23.55", "Longitude": "-46.63" })
            .as_object()
            .cloned()
            .unwrap();

        let out = normalizer.normalize(&raw);
        assert_eq!(out["latitude"], json!(-23.55));
        assert_eq!(out["lat"], json!(-23.55));
        assert_eq!(out["lng"], json!(-46.63));
    }

    #[test]
    fn test_null_latitude_is_still_copied() {
        let mut record = json!({ "latitude": null }).as_object().cloned().unwrap();
        apply_geo_aliases(&mut record);
        assert!(record.contains_key("lat"));
        assert!(record["lat"].is_null());
    }
}
