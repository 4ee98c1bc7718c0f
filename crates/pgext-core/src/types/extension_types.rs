//! Typed extension records
//!
//! Registry files carry their methods as strings; they are converted once,
//! at load time, into the closed enums below so every dispatch site handles
//! each method exhaustively.

use crate::error::{Error, Result};
use crate::types::record_file::{CustomScriptFile, ExtensionRecordFile, RegressFile};
use std::fmt;

/// Placeholder in `custom_config` lines replaced with the extension's source directory
pub const SOURCE_DIR_PLACEHOLDER: &str = "$PATH";

/// How an extension's sources reach the scratch working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadMethod {
    /// Ships in the engine's contrib tree
    Contrib,
    /// Already staged by the operator
    Downloaded,
    Git { url: String },
    Tar { url: String },
    Zip { url: String },
}

impl DownloadMethod {
    /// Whether provisioning has nothing to fetch
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Contrib | Self::Downloaded)
    }
}

impl fmt::Display for DownloadMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadMethod::Contrib => write!(f, "contrib"),
            DownloadMethod::Downloaded => write!(f, "downloaded"),
            DownloadMethod::Git { .. } => write!(f, "git"),
            DownloadMethod::Tar { .. } => write!(f, "tar"),
            DownloadMethod::Zip { .. } => write!(f, "zip"),
        }
    }
}

/// How downloaded sources are built and installed into the engine distribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallMethod {
    /// Nothing to do (contrib modules are part of the engine build)
    Installed,
    /// `make USE_PGXS=1 PG_CONFIG=...` then `make ... install`
    Pgxs,
    /// Copy a script from the script directory into the sources and run it there
    ShellScript { script: String },
}

impl fmt::Display for InstallMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallMethod::Installed => write!(f, "installed"),
            InstallMethod::Pgxs => write!(f, "pgxs"),
            InstallMethod::ShellScript { .. } => write!(f, "shell_script"),
        }
    }
}

/// Declared test strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestMethod {
    PgRegress(RegressTest),
    CustomScript(ScriptTest),
}

impl fmt::Display for TestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestMethod::PgRegress(_) => write!(f, "pg_regress"),
            TestMethod::CustomScript(_) => write!(f, "custom_test_script"),
        }
    }
}

/// Regression-diff test declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegressTest {
    /// Directory holding `sql/` (and usually `expected/`), relative to the sources
    pub input_dir: String,
    /// Alternate directory holding `expected/`, relative to the sources
    pub expected_dir: Option<String>,
    pub test_list: Vec<String>,
    /// Extra runner options, passed through (launcher paths made absolute)
    pub options: Vec<String>,
    /// PATH override for the runner
    pub path: Option<String>,
}

/// Custom-script test declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTest {
    pub script: String,
    /// Fixture file name under the expected results directory
    pub expected: String,
    pub match_mode: MatchMode,
    /// Script-produced files moved into the pair output directory on failure
    pub fail_artifacts: Vec<FailArtifact>,
}

/// A file to preserve when a custom script test fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailArtifact {
    /// Path relative to the extension source directory
    pub source: String,
    /// File name inside the pair output directory
    pub target: String,
}

/// How captured script output is compared to its fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Output must start with the fixture (`beginning`)
    Prefix,
    /// Output must end with the fixture (`end`)
    Suffix,
    /// Output must equal the fixture (`all`)
    Exact,
}

impl MatchMode {
    /// Parse the registry spelling
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "beginning" => Some(Self::Prefix),
            "end" => Some(Self::Suffix),
            "all" => Some(Self::Exact),
            _ => None,
        }
    }

    /// Compare captured output against the expected fixture
    pub fn matches(self, output: &str, expected: &str) -> bool {
        match self {
            MatchMode::Prefix => output.starts_with(expected),
            MatchMode::Suffix => output.ends_with(expected),
            MatchMode::Exact => output == expected,
        }
    }
}

/// Placement of an extension in `shared_preload_libraries`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreloadPolicy {
    /// Appended under its own name
    Append,
    /// Left out entirely
    Skip,
    /// Appended under an alternate library name
    Rename(String),
    /// Inserted at the front of the list
    First,
}

/// An extension's declarative metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionRecord {
    pub id: String,
    pub download: Option<DownloadMethod>,
    pub install: Option<InstallMethod>,
    pub folder_name: Option<String>,
    pub dependencies: Vec<String>,
    pub configure_options: Vec<String>,
    pub test: Option<TestMethod>,
    pub env: Vec<(String, String)>,
    pub before_test_scripts: Vec<String>,
    pub after_test_scripts: Vec<String>,
    pub custom_config: Vec<String>,
    pub preload: PreloadPolicy,
    /// Whether the extension has a SQL-level object to create
    pub creates_extension: bool,
    pub post_install_script: Option<String>,
}

impl ExtensionRecord {
    /// Interpret a raw registry file for extension `id`
    pub fn from_file(id: impl Into<String>, file: ExtensionRecordFile) -> Result<Self> {
        let id = id.into();

        let download = file
            .download_method
            .as_deref()
            .map(|method| parse_download(&id, method, file.download_url.as_deref()))
            .transpose()?;

        let install = file
            .install_method
            .as_deref()
            .map(|method| parse_install(&id, method, file.shell_script.as_deref()))
            .transpose()?;

        let test = file
            .test_method
            .as_deref()
            .map(|method| {
                parse_test(
                    &id,
                    method,
                    file.pg_regress.as_ref(),
                    file.custom_test_script.as_ref(),
                )
            })
            .transpose()?;

        let env = file
            .env
            .iter()
            .map(|entry| {
                entry
                    .split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .ok_or_else(|| {
                        Error::invalid_record(&id, format!("env entry '{}' is not KEY=VALUE", entry))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let preload = if file.no_preload {
            PreloadPolicy::Skip
        } else if let Some(name) = file.preload_name {
            PreloadPolicy::Rename(name)
        } else if file.preload_first {
            PreloadPolicy::First
        } else {
            PreloadPolicy::Append
        };

        Ok(Self {
            id,
            download,
            install,
            folder_name: file.folder_name,
            dependencies: file.dependencies,
            configure_options: file.configure_options,
            test,
            env,
            before_test_scripts: file.before_test_scripts,
            after_test_scripts: file.after_test_scripts,
            custom_config: file.custom_config,
            preload,
            creates_extension: !file.no_create_extn,
            post_install_script: file.post_install_shell_script,
        })
    }

    /// Source folder name, defaulting to the identifier
    pub fn folder(&self) -> &str {
        self.folder_name.as_deref().unwrap_or(&self.id)
    }

    /// Whether the record can be downloaded and installed at all
    pub fn is_provisionable(&self) -> bool {
        self.download.is_some() && self.install.is_some()
    }

    /// Whether a contrib module (sources live in the engine tree)
    pub fn is_contrib(&self) -> bool {
        matches!(self.download, Some(DownloadMethod::Contrib))
    }

    /// `custom_config` lines with the source directory placeholder expanded
    pub fn expanded_config(&self, source_dir: &str) -> Vec<String> {
        self.custom_config
            .iter()
            .map(|line| line.replace(SOURCE_DIR_PLACEHOLDER, source_dir))
            .collect()
    }
}

fn parse_download(id: &str, method: &str, url: Option<&str>) -> Result<DownloadMethod> {
    let require_url = || {
        url.map(str::to_string)
            .ok_or_else(|| Error::invalid_record(id, format!("{} download needs download_url", method)))
    };

    match method {
        "contrib" => Ok(DownloadMethod::Contrib),
        "downloaded" => Ok(DownloadMethod::Downloaded),
        "git" => Ok(DownloadMethod::Git { url: require_url()? }),
        "tar" => Ok(DownloadMethod::Tar { url: require_url()? }),
        "zip" => Ok(DownloadMethod::Zip { url: require_url()? }),
        other => Err(Error::invalid_record(
            id,
            format!("unknown download_method '{}'", other),
        )),
    }
}

fn parse_install(id: &str, method: &str, script: Option<&str>) -> Result<InstallMethod> {
    match method {
        "installed" => Ok(InstallMethod::Installed),
        "pgxs" => Ok(InstallMethod::Pgxs),
        "shell_script" => script
            .map(|s| InstallMethod::ShellScript {
                script: s.to_string(),
            })
            .ok_or_else(|| Error::invalid_record(id, "shell_script install needs shell_script")),
        other => Err(Error::invalid_record(
            id,
            format!("unknown install_method '{}'", other),
        )),
    }
}

fn parse_test(
    id: &str,
    method: &str,
    regress: Option<&RegressFile>,
    script: Option<&CustomScriptFile>,
) -> Result<TestMethod> {
    match method {
        "pg_regress" => {
            let regress =
                regress.ok_or_else(|| Error::invalid_record(id, "pg_regress block is missing"))?;
            let input_dir = regress
                .input_dir
                .clone()
                .ok_or_else(|| Error::invalid_record(id, "pg_regress.input_dir is missing"))?;
            Ok(TestMethod::PgRegress(RegressTest {
                input_dir,
                expected_dir: regress.expected_dir.clone(),
                test_list: regress.test_list.clone(),
                options: regress.options.clone(),
                path: regress.path.clone(),
            }))
        }
        "custom_test_script" => {
            let script = script
                .ok_or_else(|| Error::invalid_record(id, "custom_test_script block is missing"))?;
            let match_mode = MatchMode::parse(&script.expected_location).ok_or_else(|| {
                Error::invalid_record(
                    id,
                    format!("unknown expected_location '{}'", script.expected_location),
                )
            })?;
            if script.fail_files.len() != script.fail_file_names.len() {
                return Err(Error::invalid_record(
                    id,
                    "fail_files and fail_file_names differ in length",
                ));
            }
            let fail_artifacts = script
                .fail_files
                .iter()
                .zip(&script.fail_file_names)
                .map(|(source, target)| FailArtifact {
                    source: source.clone(),
                    target: target.clone(),
                })
                .collect();
            Ok(TestMethod::CustomScript(ScriptTest {
                script: script.script.clone(),
                expected: script.expected.clone(),
                match_mode,
                fail_artifacts,
            }))
        }
        other => Err(Error::invalid_record(
            id,
            format!("unknown test_method '{}'", other),
        )),
    }
}
