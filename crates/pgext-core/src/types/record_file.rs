//! On-disk shape of an extension registry record (`extn_info/<id>.json`)
//!
//! Field names follow the files maintained by the registry authors. Fields
//! used only by the static analysis reports (`sql_files`, `source_dir`, ...)
//! are ignored here.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

/// Raw registry record as stored on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtensionRecordFile {
    /// contrib | git | tar | zip | downloaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_method: Option<String>,

    /// Clone or archive URL for git/tar/zip downloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,

    /// installed | pgxs | shell_script
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_method: Option<String>,

    /// Install script name for `shell_script` installs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell_script: Option<String>,

    /// Directory the sources live in (under contrib/ or the working directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    /// Engine `./configure` flags required when this extension is present
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configure_options: Vec<String>,

    /// pg_regress | custom_test_script
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pg_regress: Option<RegressFile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_test_script: Option<CustomScriptFile>,

    /// `KEY=VALUE` entries exported for the extension's tests
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before_test_scripts: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after_test_scripts: Vec<String>,

    /// Lines appended to postgresql.conf; `$PATH` expands to the source directory
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_config: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preload_name: Option<String>,

    #[serde(default, deserialize_with = "presence_flag", skip_serializing_if = "is_false")]
    pub no_preload: bool,

    #[serde(default, deserialize_with = "presence_flag", skip_serializing_if = "is_false")]
    pub preload_first: bool,

    /// Extension has no SQL-level object to `CREATE EXTENSION`
    #[serde(default, deserialize_with = "presence_flag", skip_serializing_if = "is_false")]
    pub no_create_extn: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_install_shell_script: Option<String>,
}

/// `pg_regress` block of a record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_dir: Option<String>,

    #[serde(default)]
    pub test_list: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,

    /// PATH override for the runner process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// `custom_test_script` block of a record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomScriptFile {
    pub script: String,

    /// Fixture name under the expected test results directory
    pub expected: String,

    /// beginning | end | all
    pub expected_location: String,

    #[serde(default)]
    pub fail_files: Vec<String>,

    #[serde(default)]
    pub fail_file_names: Vec<String>,
}

/// Flags in the registry are set by the key being present, whatever its value
fn presence_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    IgnoredAny::deserialize(deserializer)?;
    Ok(true)
}

fn is_false(value: &bool) -> bool {
    !*value
}
