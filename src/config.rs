//! # Configuration
//!
//! Where the profile store keeps its two files. A config is either built in code, derived
//! from a storage directory, or read from a TOML file:
//!
//! ```toml
//! # Either a directory holding both files...
//! data_dir = "vector_store"
//!
//! # ...or explicit paths (these win over data_dir)
//! index_path = "/var/lib/neurotwin/profiles.index"
//! metadata_path = "/var/lib/neurotwin/metadata.json"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::errors::{NeuroTwinError, NeuroTwinResult};
use crate::persistence::PersistenceError;

pub const DEFAULT_DATA_DIR: &str = "vector_store";
pub const INDEX_FILE_NAME: &str = "profiles.index";
pub const METADATA_FILE_NAME: &str = "metadata.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    data_dir: Option<PathBuf>,
    #[serde(default)]
    index_path: Option<PathBuf>,
    #[serde(default)]
    metadata_path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn new(index_path: impl Into<PathBuf>, metadata_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            metadata_path: metadata_path.into(),
        }
    }

    /// Both files under `dir` with their default names.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(INDEX_FILE_NAME), dir.join(METADATA_FILE_NAME))
    }

    pub fn from_toml_str(text: &str) -> NeuroTwinResult<Self> {
        let file: ConfigFile = toml::from_str(text)
            .map_err(|e| NeuroTwinError::InvalidArgument(format!("invalid store config: {}", e)))?;

        let dir = file
            .data_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let defaults = Self::in_dir(&dir);

        Ok(Self {
            index_path: file.index_path.unwrap_or(defaults.index_path),
            metadata_path: file.metadata_path.unwrap_or(defaults.metadata_path),
        })
    }

    pub fn from_toml_file(path: &Path) -> NeuroTwinResult<Self> {
        let text = std::fs::read_to_string(path).map_err(PersistenceError::from)?;
        Self::from_toml_str(&text)
    }

    /// The two paths must be distinct, or every commit would clobber itself.
    pub fn validate(&self) -> NeuroTwinResult<()> {
        if self.index_path == self.metadata_path {
            return Err(NeuroTwinError::InvalidArgument(format!(
                "index and metadata paths must differ (both are {})",
                self.index_path.display()
            )));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::in_dir(DEFAULT_DATA_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_dir() {
        let config = StoreConfig::in_dir("/tmp/profiles");
        assert_eq!(config.index_path, PathBuf::from("/tmp/profiles/profiles.index"));
        assert_eq!(config.metadata_path, PathBuf::from("/tmp/profiles/metadata.json"));
    }

    #[test]
    fn test_toml_data_dir() {
        let config = StoreConfig::from_toml_str(r#"data_dir = "/srv/twins""#).unwrap();
        assert_eq!(config, StoreConfig::in_dir("/srv/twins"));
    }

    #[test]
    fn test_toml_explicit_paths_override_dir() {
        let config = StoreConfig::from_toml_str(
            r#"
            data_dir = "/srv/twins"
            metadata_path = "/etc/twins/meta.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.index_path, PathBuf::from("/srv/twins/profiles.index"));
        assert_eq!(config.metadata_path, PathBuf::from("/etc/twins/meta.json"));
    }

    #[test]
    fn test_toml_empty_uses_default_dir() {
        assert_eq!(StoreConfig::from_toml_str("").unwrap(), StoreConfig::default());
    }

    #[test]
    fn test_toml_invalid() {
        let result = StoreConfig::from_toml_str("data_dir = [1, 2]");
        assert!(matches!(result.unwrap_err(), NeuroTwinError::InvalidArgument(_)));
    }

    #[test]
    fn test_validate_rejects_same_path() {
        let config = StoreConfig::new("store.bin", "store.bin");
        assert!(config.validate().is_err());
        assert!(StoreConfig::default().validate().is_ok());
    }
}
