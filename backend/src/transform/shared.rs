//! Hot-swappable mapping set handle.
//!
//! Readers take a snapshot `Arc` and normalize against it for as long as they
//! like; a reload replaces the whole set. A set is never edited in place.

use std::sync::{Arc, PoisonError, RwLock};

use super::mapping::MappingSet;
use super::normalizer::Normalizer;

#[derive(Debug)]
pub struct SharedMappings {
    current: RwLock<Arc<MappingSet>>,
}

impl SharedMappings {
    pub fn new(set: MappingSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(set)),
        }
    }

    /// Snapshot of the active set.
    pub fn current(&self) -> Arc<MappingSet> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Normalizer bound to the active set.
    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.current())
    }

    /// Swap in a new set, returning the previous one.
    pub fn replace(&self, set: MappingSet) -> Arc<MappingSet> {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(set))
    }
}

impl Default for SharedMappings {
    fn default() -> Self {
        Self::new(MappingSet::default_leads())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldMapping;
    use serde_json::json;

    #[test]
    fn test_snapshot_survives_replace() {
        let shared = SharedMappings::default();
        let before = shared.normalizer();

        let custom = MappingSet::new("custom", vec![FieldMapping::new("cidade")]).unwrap();
        let previous = shared.replace(custom);

        assert_eq!(previous.name(), "leads");
        assert_eq!(shared.current().name(), "custom");

        // the old normalizer still resolves against the set it was built with
        let raw = json!({ "Nome": "Ana" }).as_object().cloned().unwrap();
        assert_eq!(before.normalize(&raw)["nome"], "Ana");
        assert_eq!(before.mappings().name(), "leads");
    }

    #[test]
    fn test_concurrent_readers() {
        let shared = Arc::new(SharedMappings::default());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || {
                    let raw = json!({ "Nome": format!("Lead {}", i) })
                        .as_object()
                        .cloned()
                        .unwrap();
                    shared.normalizer().normalize(&raw)["nome"].clone()
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), json!(format!("Lead {}", i)));
        }
    }
}
