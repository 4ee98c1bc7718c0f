//! # pgext-core
//!
//! Core library for the extension compatibility harness providing:
//! - Harness configuration (pgext.yaml plus command line overrides)
//! - On-disk layout of the engine build, storage area and run output
//! - Typed extension registry records
//! - The error taxonomy shared by the harness crates

pub mod config;
pub mod error;
pub mod types;

pub use config::HarnessConfig;
pub use error::{Error, Result};
