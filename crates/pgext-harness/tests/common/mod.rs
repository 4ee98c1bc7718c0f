//! Common test utilities for pgext-harness
//!
//! This module provides shared test infrastructure including:
//! - Record builders for registry fixtures
//! - A scratch working root with engine source layout
//! - A recording `CommandRunner` that never spawns processes

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod builders;
pub mod fixtures;
pub mod mocks;

pub use builders::*;
pub use fixtures::*;
pub use mocks::*;
