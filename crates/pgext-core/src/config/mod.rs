//! Configuration loading and on-disk layout

mod layout;
mod loader;

pub use loader::{BenchSettings, DirectoryNames, HarnessConfig, HarnessConfigFile, DEFAULT_PORT};
