//! Tracker configuration loading.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "offprint.toml";
const ENV_PREFIX: &str = "OFFPRINT_";

/// Configuration for the cache tracker.
///
/// Layered lowest-to-highest: built-in defaults, then `offprint.toml`, then
/// `OFFPRINT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Location of the SQLite metadata store.
    pub database_path: PathBuf,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        // Platform data directory when available, working directory otherwise
        // (sandboxed or containerized hosts without a resolvable home).
        let data_dir = directories::ProjectDirs::from("", "", "offprint")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_default();
        Self { database_path: data_dir.join("cache.sqlite") }
    }
}

impl TrackerConfig {
    /// Load configuration from the default file location and environment.
    pub fn load() -> Result<Self> {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from a specific TOML file (plus environment
    /// overrides). A missing file is not an error; defaults apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .or_raise(|| ErrorKind::Config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrackerConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, TrackerConfig::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"database_path = "/srv/offprint/cache.sqlite""#).unwrap();
        let config = TrackerConfig::load_from(&path).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/srv/offprint/cache.sqlite"));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "database_path = [not toml").unwrap();
        assert!(TrackerConfig::load_from(&path).is_err());
    }
}
