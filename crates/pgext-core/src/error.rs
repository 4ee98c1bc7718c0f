//! Error types for pgext-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using pgext-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the compatibility harness
///
/// Test failures are not errors; they are reported as verdicts. Everything
/// here either aborts the run or, for [`Error::ProvisioningFailed`], marks the
/// current pair as unusable.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration format
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Extension identifier not present in the registry
    #[error("Unknown extension: {extension}")]
    UnknownExtension { extension: String },

    /// Circular dependency
    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    /// A registry record that cannot be interpreted
    #[error("Invalid registry record for {extension}: {message}")]
    InvalidRecord { extension: String, message: String },

    /// A record lacks the download, install or test metadata an operation needs
    #[error("Extension {extension} has no {kind} method")]
    MissingMethod { extension: String, kind: String },

    /// A declared regression test case has no input script or expected output
    #[error("Test fixture for {extension} does not exist: {}", path.display())]
    MissingFixture { extension: String, path: PathBuf },

    /// A regression test declaration without any test cases
    #[error("Testing cannot happen on extension {extension}: test list is empty")]
    EmptyTestList { extension: String },

    /// Operator input (extension list, pair list) is unusable
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Engine configure/build/install step failed
    #[error("Engine build step '{step}' failed with exit code {code}")]
    BuildFailed { step: String, code: i32 },

    /// Extension download/build/install step failed
    #[error("Provisioning {extension} failed at '{step}' (exit code {code})")]
    ProvisioningFailed {
        extension: String,
        step: String,
        code: i32,
    },

    /// An external program could not be started at all
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Server lifecycle operations issued out of order
    #[error("Server lifecycle violation: cannot {operation} while {state}")]
    Lifecycle { operation: String, state: String },

    /// HTTP download failure
    #[error("Download of {url} failed: {message}")]
    Download { url: String, message: String },

    /// Fail-fast stop requested by the exit flag
    #[error("Exiting after failed tests for {extension} (exit flag set)")]
    Aborted { extension: String },
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an unknown extension error
    pub fn unknown_extension(extension: impl Into<String>) -> Self {
        Self::UnknownExtension {
            extension: extension.into(),
        }
    }

    /// Create a circular dependency error from the visiting path
    pub fn circular_dependency(path: &[String], repeated: &str) -> Self {
        let mut cycle: Vec<&str> = path.iter().map(String::as_str).collect();
        cycle.push(repeated);
        Self::CircularDependency {
            cycle: cycle.join(" -> "),
        }
    }

    /// Create an invalid record error
    pub fn invalid_record(extension: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            extension: extension.into(),
            message: message.into(),
        }
    }

    /// Create a missing method error
    pub fn missing_method(extension: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::MissingMethod {
            extension: extension.into(),
            kind: kind.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a provisioning failure
    pub fn provisioning_failed(
        extension: impl Into<String>,
        step: impl Into<String>,
        code: i32,
    ) -> Self {
        Self::ProvisioningFailed {
            extension: extension.into(),
            step: step.into(),
            code,
        }
    }

    /// Create a lifecycle violation
    pub fn lifecycle(operation: impl Into<String>, state: impl Into<String>) -> Self {
        Self::Lifecycle {
            operation: operation.into(),
            state: state.into(),
        }
    }

    /// Whether this error only spoils the current pair rather than the run
    pub fn is_provisioning(&self) -> bool {
        matches!(self, Self::ProvisioningFailed { .. } | Self::Download { .. })
    }
}
