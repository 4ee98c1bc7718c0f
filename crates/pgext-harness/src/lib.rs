//! Extension compatibility harness
//!
//! This crate handles:
//! - Extension registry loading
//! - Dependency resolution
//! - Engine build coordination
//! - Extension provisioning
//! - Server lifecycle management
//! - Test execution (regression, custom script, benchmark)
//! - Pairwise and single-extension aggregation and reports

pub mod build;
pub mod compatibility;
pub mod dependency;
pub mod pairs;
pub mod provision;
pub mod registry;
pub mod report;
pub mod runner;
pub mod server;
pub mod testing;
pub mod workspace;

pub use build::{BuildCoordinator, BuildState};
pub use compatibility::{CompatibilityRunner, PairOutcome};
pub use dependency::DependencyResolver;
pub use provision::Provisioner;
pub use registry::ExtensionRegistry;
pub use report::{CompatibilityMatrix, PairResult, SingleRow, SingleStatus};
pub use runner::{CapturedOutput, CommandRunner, CommandSpec, SystemRunner, TerminalLog};
pub use server::{ServerManager, ServerState};
pub use testing::{TestContext, TestEngine, TestVerdict};
