//! CLI command implementations

pub mod contrib;
pub mod run;
pub mod split_pairs;
