//! Test execution engine
//!
//! Each extension declares at most one test strategy (regression diff or
//! custom script). A pair additionally runs a load benchmark in both
//! directions. Test failures are verdicts, never errors: only configuration
//! problems and the exit flag turn into [`Error`]s.

mod artifacts;
mod bench;
mod regress;
mod script;

pub use artifacts::{copy_dir, copy_server_log, move_file};
pub use bench::failed_transactions;

use pgext_core::types::TestMethod;
use pgext_core::{Error, HarnessConfig, Result};
use std::path::Path;
use tracing::info;

use crate::dependency::DependencyResolver;
use crate::registry::ExtensionRegistry;
use crate::runner::{CommandRunner, TerminalLog};

/// Outcome of an extension's own declared test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestVerdict {
    /// No test method declared; never blocks compatibility
    NotDeclared,
    Passed,
    Failed,
}

impl TestVerdict {
    pub fn is_failure(self) -> bool {
        self == TestVerdict::Failed
    }
}

/// Where one test runs and where its artifacts go
#[derive(Debug, Clone, Copy)]
pub struct TestContext<'a> {
    /// Extension under test
    pub extension: &'a str,
    /// Compatibility partner, absent in single mode
    pub partner: Option<&'a str>,
    /// Per-pair (or per-extension) output directory
    pub output_dir: &'a Path,
    pub log: &'a TerminalLog,
}

/// Runs declared tests and benchmarks against the live server
pub struct TestEngine<'a> {
    config: &'a HarnessConfig,
    registry: &'a ExtensionRegistry,
    resolver: DependencyResolver,
    runner: &'a dyn CommandRunner,
}

impl<'a> TestEngine<'a> {
    pub fn new(
        config: &'a HarnessConfig,
        registry: &'a ExtensionRegistry,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            config,
            registry,
            resolver: DependencyResolver::new(registry),
            runner,
        }
    }

    /// Run the extension's declared test strategy
    ///
    /// With the exit flag set, a failed test becomes [`Error::Aborted`].
    pub async fn run_declared(&self, ctx: &TestContext<'_>) -> Result<TestVerdict> {
        let record = self.registry.require(ctx.extension)?;
        let verdict = match &record.test {
            None => return Ok(TestVerdict::NotDeclared),
            Some(TestMethod::PgRegress(test)) => {
                info!("Testing {}", ctx.extension);
                self.run_regress(ctx, record, test).await?
            }
            Some(TestMethod::CustomScript(test)) => {
                info!("Testing {}", ctx.extension);
                self.run_script(ctx, record, test).await?
            }
        };

        match verdict {
            TestVerdict::Passed => info!("Tests for extension {} passed", ctx.extension),
            _ => info!("Tests for extension {} failed", ctx.extension),
        }

        if verdict.is_failure() && self.config.exit_on_failure() {
            return Err(Error::Aborted {
                extension: ctx.extension.to_string(),
            });
        }
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_helpers() {
        assert!(TestVerdict::Failed.is_failure());
        assert!(!TestVerdict::NotDeclared.is_failure());
    }
}
