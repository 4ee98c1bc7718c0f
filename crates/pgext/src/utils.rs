//! Utility functions shared across CLI commands

use anyhow::{Context, Result};
use pgext_core::HarnessConfig;
use pgext_harness::ExtensionRegistry;
use std::path::{Path, PathBuf};

/// Resolve the working root: `--root`, else the current directory
///
/// The root is canonicalized so every derived path is absolute; commands
/// run from different working directories and launcher options are
/// resolved against it.
pub fn resolve_root(root: Option<&Path>) -> Result<PathBuf> {
    let root = match root {
        Some(root) => root.to_path_buf(),
        None => std::env::current_dir().context("Could not determine current directory")?,
    };
    root.canonicalize()
        .with_context(|| format!("Working root {} does not exist", root.display()))
}

/// Load the harness configuration for the resolved root
pub fn load_config(root: Option<&Path>, config_path: Option<&Path>) -> Result<HarnessConfig> {
    let root = resolve_root(root)?;
    HarnessConfig::load(&root, config_path).context("Failed to load harness configuration")
}

/// Load the extension registry of a configuration
pub fn load_registry(config: &HarnessConfig) -> Result<ExtensionRegistry> {
    let dir = config.registry_dir();
    ExtensionRegistry::load_dir(&dir)
        .with_context(|| format!("Failed to load extension registry from {}", dir.display()))
}
