//! Mapping Store - keep named mapping sets on disk
//!
//! Each source (a CRM export, a partner spreadsheet, a web form) can have its
//! own mapping set. Sets are stored as one JSON file per id and matched to
//! incoming files by how many of their fields the CSV headers can satisfy.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::logs::log_warning;
use crate::error::{StoreError, StoreResult};
use crate::transform::mapping::MappingSet;

/// Minimum header coverage for a stored set to be considered compatible.
const MIN_COMPATIBILITY: f64 = 0.5;

/// A stored mapping set with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMapping {
    /// Unique identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// The mapping set
    pub mapping_set: MappingSet,
    /// CSV columns this set was imported for
    #[serde(default)]
    pub source_columns: Vec<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last time this set was used
    pub last_used: Option<String>,
    /// Number of times used
    #[serde(default)]
    pub use_count: u32,
}

/// Store for managing mapping sets
pub struct MappingStore {
    dir: PathBuf,
    /// id -> stored set
    entries: HashMap<String, StoredMapping>,
}

impl MappingStore {
    /// Open a store, loading every readable set in `dir`.
    ///
    /// A missing directory is an empty store; it is created on first save.
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let mut store = Self {
            dir: dir.as_ref().to_path_buf(),
            entries: HashMap::new(),
        };
        store.load_all();
        store
    }

    fn load_all(&mut self) {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.extension().is_some_and(|e| e == "json") {
                continue;
            }
            match Self::read_entry(&path) {
                Ok(stored) => {
                    self.entries.insert(stored.id.clone(), stored);
                }
                Err(e) => log_warning(format!("Skipping {}: {}", path.display(), e)),
            }
        }
    }

    fn read_entry(path: &Path) -> StoreResult<StoredMapping> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Directory backing this store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All stored sets, most used first.
    pub fn list(&self) -> Vec<&StoredMapping> {
        let mut all: Vec<&StoredMapping> = self.entries.values().collect();
        all.sort_by(|a, b| b.use_count.cmp(&a.use_count).then_with(|| a.id.cmp(&b.id)));
        all
    }

    /// Get a stored set by id.
    pub fn get(&self, id: &str) -> StoreResult<&StoredMapping> {
        self.entries
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Stored sets whose fields the headers cover well enough, best first.
    pub fn find_compatible(&self, headers: &[String]) -> Vec<(&StoredMapping, f64)> {
        let mut compatible: Vec<_> = self
            .entries
            .values()
            .map(|m| (m, m.mapping_set.coverage(headers)))
            .filter(|(_, score)| *score > MIN_COMPATIBILITY)
            .collect();

        compatible.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.use_count.cmp(&a.0.use_count))
        });
        compatible
    }

    /// Save a mapping set under a new id.
    pub fn save(
        &mut self,
        mapping_set: MappingSet,
        name: &str,
        source_columns: Vec<String>,
    ) -> StoreResult<String> {
        fs::create_dir_all(&self.dir)?;

        let id = generate_id(name);
        let stored = StoredMapping {
            id: id.clone(),
            name: name.to_string(),
            mapping_set,
            source_columns,
            created_at: chrono::Utc::now().to_rfc3339(),
            last_used: None,
            use_count: 0,
        };

        self.write_entry(&stored)?;
        self.entries.insert(id.clone(), stored);
        Ok(id)
    }

    /// Import a mapping-set configuration file.
    pub fn import(&mut self, path: &Path, name: Option<&str>) -> StoreResult<String> {
        let content = fs::read_to_string(path)?;
        let mapping_set = MappingSet::from_json(&content)?;

        let name = name
            .map(str::to_string)
            .or_else(|| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .unwrap_or_else(|| mapping_set.name().to_string());

        let source_columns: Vec<String> = mapping_set
            .mappings()
            .iter()
            .flat_map(|m| m.legacy_aliases.iter().cloned())
            .collect();

        self.save(mapping_set, &name, source_columns)
    }

    /// Record that a set was used for an import.
    pub fn record_use(&mut self, id: &str) -> StoreResult<()> {
        let mut stored = self.get(id)?.clone();
        stored.last_used = Some(chrono::Utc::now().to_rfc3339());
        stored.use_count += 1;

        // Commit only after the write succeeds
        self.write_entry(&stored)?;
        self.entries.insert(stored.id.clone(), stored);
        Ok(())
    }

    /// Delete a stored set.
    pub fn delete(&mut self, id: &str) -> StoreResult<()> {
        if self.entries.remove(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        fs::remove_file(self.entry_path(id))?;
        Ok(())
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn write_entry(&self, stored: &StoredMapping) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(stored)?;
        fs::write(self.entry_path(&stored.id), content)?;
        Ok(())
    }
}

/// Slug of `name`, a millisecond timestamp and a random suffix.
fn generate_id(name: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let slug = if slug.is_empty() { "mapping".to_string() } else { slug };

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        slug,
        chrono::Utc::now().timestamp_millis(),
        &suffix[..8]
    )
}
