//! Service configuration.
//!
//! Defaults are constants below; each can be overridden from the environment
//! (or a `.env` file), and CLI flags override the environment.

use std::env;
use std::path::PathBuf;

/// HTTP port for `leadnorm serve`.
pub const DEFAULT_PORT: u16 = 3000;

/// Where stored mapping sets live, relative to the working directory.
pub const DEFAULT_MAPPINGS_DIR: &str = ".leadnorm/mappings";

/// How many invalid records are reported in detail per import.
pub const DEFAULT_MAX_REPORTED_ERRORS: usize = 10;

/// Maximum upload size accepted by the HTTP API (in bytes).
///
/// 50 MB limit.
pub const MAX_UPLOAD_SIZE: usize = 50 * 1024 * 1024;

pub const ENV_MAPPINGS_DIR: &str = "LEADNORM_MAPPINGS_DIR";
pub const ENV_MAPPING: &str = "LEADNORM_MAPPING";
pub const ENV_PORT: &str = "LEADNORM_PORT";
pub const ENV_MAX_REPORTED_ERRORS: &str = "LEADNORM_PREVIEW_ERRORS";

/// Resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Mapping store directory
    pub mappings_dir: PathBuf,
    /// Mapping-set file used instead of the built-in lead mappings
    pub mapping_file: Option<PathBuf>,
    pub port: u16,
    pub max_reported_errors: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mappings_dir: PathBuf::from(DEFAULT_MAPPINGS_DIR),
            mapping_file: None,
            port: DEFAULT_PORT,
            max_reported_errors: DEFAULT_MAX_REPORTED_ERRORS,
        }
    }
}

impl Settings {
    /// Load `.env` (if present) and read settings from the environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup. Unparsable values fall back
    /// to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            mappings_dir: non_empty(ENV_MAPPINGS_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.mappings_dir),
            mapping_file: non_empty(ENV_MAPPING).map(PathBuf::from),
            port: non_empty(ENV_PORT)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.port),
            max_reported_errors: non_empty(ENV_MAX_REPORTED_ERRORS)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_reported_errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_unset() {
        let settings = Settings::from_lookup(|_| None);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_MAPPINGS_DIR, "/srv/leadnorm"),
            (ENV_MAPPING, "bitrix.json"),
            (ENV_PORT, " 8080 "),
            (ENV_MAX_REPORTED_ERRORS, "3"),
        ]);
        let settings = Settings::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(settings.mappings_dir, PathBuf::from("/srv/leadnorm"));
        assert_eq!(settings.mapping_file, Some(PathBuf::from("bitrix.json")));
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.max_reported_errors, 3);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let settings = Settings::from_lookup(|k| match k {
            ENV_PORT => Some("not-a-port".into()),
            ENV_MAPPING => Some("   ".into()),
            _ => None,
        });
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.mapping_file, None);
    }
}
