//! Type definitions for extension registry records

mod extension_types;
mod record_file;

pub use extension_types::*;
pub use record_file::*;
