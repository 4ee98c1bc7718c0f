//! Configuration file loading and parsing

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration file names to search for in the working root
const CONFIG_FILE_NAMES: &[&str] = &["pgext.yaml", "pgext.yml"];

/// Engine port used when none is configured
pub const DEFAULT_PORT: u16 = 5432;

/// Settings read from `pgext.yaml`; every field has a default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfigFile {
    /// Engine release built from source
    pub postgres_version: String,

    pub port: u16,

    /// Abort the whole run on the first failed test
    pub exit_on_failure: bool,

    /// Parallel jobs for `make`
    pub make_jobs: u32,

    pub directories: DirectoryNames,

    pub bench: BenchSettings,
}

impl Default for HarnessConfigFile {
    fn default() -> Self {
        Self {
            postgres_version: "15.3".to_string(),
            port: DEFAULT_PORT,
            exit_on_failure: false,
            make_jobs: 8,
            directories: DirectoryNames::default(),
            bench: BenchSettings::default(),
        }
    }
}

/// Directory names under the working root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryNames {
    /// Registry records, one file per extension
    pub registry: String,
    /// Install, post-install and custom test scripts
    pub scripts: String,
    /// Expected output fixtures for custom script tests
    pub expected_results: String,
    /// Scratch directory extension sources are fetched into
    pub work: String,
}

impl Default for DirectoryNames {
    fn default() -> Self {
        Self {
            registry: "extn_info".to_string(),
            scripts: "extn_scripts".to_string(),
            expected_results: "extn_test_results".to_string(),
            work: "pgextworkdir".to_string(),
        }
    }
}

/// Load benchmark parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchSettings {
    pub database: String,
    /// Scale factor for table initialisation
    pub scale: u32,
    pub duration_secs: u32,
    pub clients: u32,
    pub threads: u32,
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            database: "pgbench_test".to_string(),
            scale: 10,
            duration_secs: 30,
            clients: 8,
            threads: 8,
        }
    }
}

/// Immutable harness configuration, passed by reference into every component
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Working root all directories are resolved against
    pub root: PathBuf,

    pub settings: HarnessConfigFile,

    /// Timestamp suffix of this run's output directory
    pub run_label: String,

    /// Leave the engine source and build in place after the run
    pub keep_build: bool,

    /// Config file the settings came from, if any
    pub config_path: Option<PathBuf>,
}

impl HarnessConfig {
    /// Configuration with built-in defaults rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            settings: HarnessConfigFile::default(),
            run_label: chrono::Local::now().format("%m-%d-%Y_%H:%M").to_string(),
            keep_build: false,
            config_path: None,
        }
    }

    /// Load configuration for `root`
    ///
    /// An explicit path must exist. Without one, `pgext.yaml`/`pgext.yml` in
    /// the root is used when present, otherwise defaults apply.
    pub fn load(root: impl Into<PathBuf>, explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::new(root);

        let found = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => CONFIG_FILE_NAMES
                .iter()
                .map(|name| config.root.join(name))
                .find(|candidate| candidate.is_file()),
        };

        if let Some(path) = found {
            let content = fs::read_to_string(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::config_not_found(path.display().to_string())
                } else {
                    Error::Io(e)
                }
            })?;
            debug!("Loading harness configuration from {}", path.display());
            config.settings = serde_yaml_ng::from_str(&content)?;
            config.config_path = Some(path);
        }

        config.validate()?;
        Ok(config)
    }

    /// Override the engine port
    pub fn with_port(mut self, port: u16) -> Self {
        self.settings.port = port;
        self
    }

    /// Enable fail-fast abort
    pub fn with_exit_flag(mut self, exit_on_failure: bool) -> Self {
        self.settings.exit_on_failure = exit_on_failure;
        self
    }

    /// Skip final cleanup of the engine source and build
    pub fn with_keep_build(mut self, keep_build: bool) -> Self {
        self.keep_build = keep_build;
        self
    }

    /// Fix the output directory suffix (tests, reruns)
    pub fn with_run_label(mut self, label: impl Into<String>) -> Self {
        self.run_label = label.into();
        self
    }

    /// Port the engine listens on
    pub fn port(&self) -> u16 {
        self.settings.port
    }

    /// Whether a failed test aborts the run
    pub fn exit_on_failure(&self) -> bool {
        self.settings.exit_on_failure
    }

    /// Whether the port differs from the engine default
    pub fn is_custom_port(&self) -> bool {
        self.settings.port != DEFAULT_PORT
    }

    fn validate(&self) -> Result<()> {
        let version = &self.settings.postgres_version;
        if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return Err(Error::invalid_config(format!(
                "postgres_version '{}' is not a release number",
                version
            )));
        }
        if self.settings.port == 0 {
            return Err(Error::invalid_config("port must be non-zero"));
        }
        if self.settings.make_jobs == 0 {
            return Err(Error::invalid_config("make_jobs must be at least 1"));
        }
        if self.settings.bench.clients < self.settings.bench.threads {
            return Err(Error::invalid_config(
                "bench.threads cannot exceed bench.clients",
            ));
        }
        Ok(())
    }
}
