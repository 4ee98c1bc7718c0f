//! Extension registry
//!
//! Loaded once at startup from a directory holding one record per extension
//! (`<id>.json`, or `<id>.yaml`/`<id>.yml`). The file stem is the extension
//! identifier. Records are validated into typed form while loading, so a
//! malformed record stops the run before anything is built.

use pgext_core::types::{ExtensionRecord, ExtensionRecordFile};
use pgext_core::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Registry of extension records keyed by identifier
#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
    extensions: HashMap<String, ExtensionRecord>,
}

impl ExtensionRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every record in `dir`
    pub fn load_dir(dir: &Path) -> Result<Self> {
        debug!("Loading extension registry from {}", dir.display());

        let entries = std::fs::read_dir(dir).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::config_not_found(dir.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;

        let mut registry = Self::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }

            let (Some(stem), Some(ext)) = (
                path.file_stem().and_then(|s| s.to_str()),
                path.extension().and_then(|s| s.to_str()),
            ) else {
                continue;
            };

            let content = std::fs::read_to_string(&path)?;
            let file: ExtensionRecordFile = match ext {
                "json" => serde_json::from_str(&content)?,
                "yaml" | "yml" => serde_yaml_ng::from_str(&content)?,
                _ => {
                    debug!("Skipping non-record file {}", path.display());
                    continue;
                }
            };

            if registry.contains(stem) {
                return Err(Error::invalid_record(
                    stem,
                    "defined by more than one registry file",
                ));
            }
            registry.insert(ExtensionRecord::from_file(stem, file)?);
        }

        info!("Loaded {} extension records", registry.len());
        Ok(registry)
    }

    /// Add or replace a record
    pub fn insert(&mut self, record: ExtensionRecord) {
        self.extensions.insert(record.id.clone(), record);
    }

    /// Get a record by identifier
    pub fn get(&self, id: &str) -> Option<&ExtensionRecord> {
        self.extensions.get(id)
    }

    /// Get a record, failing with [`Error::UnknownExtension`]
    pub fn require(&self, id: &str) -> Result<&ExtensionRecord> {
        self.get(id).ok_or_else(|| Error::unknown_extension(id))
    }

    /// Check if an extension exists
    pub fn contains(&self, id: &str) -> bool {
        self.extensions.contains_key(id)
    }

    /// Get an iterator over all records
    pub fn extensions(&self) -> impl Iterator<Item = (&String, &ExtensionRecord)> {
        self.extensions.iter()
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgext_core::types::{DownloadMethod, InstallMethod};
    use tempfile::TempDir;

    #[test]
    fn test_load_json_and_yaml_records() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("cube.json"),
            r#"{"download_method": "contrib", "install_method": "installed", "folder_name": "cube"}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("earthdistance.yaml"),
            "download_method: contrib\ninstall_method: installed\ndependencies: [cube]\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("README"), "not a record").unwrap();

        let registry = ExtensionRegistry::load_dir(dir.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(!registry.contains("README"));
        assert_eq!(registry.require("earthdistance").unwrap().dependencies, vec!["cube"]);

        let cube = registry.require("cube").unwrap();
        assert_eq!(cube.download, Some(DownloadMethod::Contrib));
        assert_eq!(cube.install, Some(InstallMethod::Installed));
    }

    #[test]
    fn test_require_unknown() {
        let registry = ExtensionRegistry::new();
        let err = registry.require("nope").unwrap_err();
        assert!(matches!(err, Error::UnknownExtension { .. }));
    }

    #[test]
    fn test_duplicate_stem_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.yml"), "{}").unwrap();
        let err = ExtensionRegistry::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidRecord { .. }));
    }

    #[test]
    fn test_malformed_record_stops_loading() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.json"), r#"{"install_method": "cmake"}"#).unwrap();
        assert!(ExtensionRegistry::load_dir(dir.path()).is_err());
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = ExtensionRegistry::load_dir(&dir.path().join("extn_info")).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }
}
