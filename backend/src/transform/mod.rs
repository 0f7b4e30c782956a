//! Transformation module.
//!
//! - Transforms: named value conversions (currency, date, boolean, number)
//! - Mapping: field mapping sets and their lookup index
//! - Normalizer: raw record to canonical record
//! - Geo: `lat`/`lng` aliasing
//! - Shared: the swappable active mapping set
//! - Pipeline: CSV/JSON import end to end

pub mod geo;
pub mod mapping;
pub mod normalizer;
pub mod pipeline;
pub mod shared;
pub mod transforms;

pub use geo::{apply_geo_aliases, GeoNormalizer};
pub use mapping::{MappingConfig, MappingSet};
pub use normalizer::Normalizer;
pub use pipeline::*;
pub use shared::SharedMappings;
pub use transforms::Transform;
