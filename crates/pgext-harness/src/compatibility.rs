//! Compatibility aggregator
//!
//! Drives resolver, build coordinator, provisioning, server lifecycle and the
//! test engine over every requested pair (or single extension), strictly one
//! cycle at a time, and writes the reports.
//!
//! Per pair (sequential mode):
//!
//! ```text
//! resolve -> ensure build -> provision -> initdb -> configure -> start
//!   -> post-install -> own tests -> benchmarks -> stop -> cleanup
//! ```
//!
//! The parallel mode builds and provisions the union of all involved
//! extensions once and only repeats the server part per pair.

use pgext_core::{Error, HarnessConfig, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::build::{BuildCoordinator, BuildState};
use crate::dependency::DependencyResolver;
use crate::pairs::{ordered_pairs, pair_members};
use crate::provision::Provisioner;
use crate::registry::ExtensionRegistry;
use crate::report::{
    write_pair_results, CompatibilityMatrix, CsvWriter, PairResult, SingleRow, SingleStatus,
    SINGLE_HEADER,
};
use crate::runner::{CommandRunner, TerminalLog};
use crate::server::ServerManager;
use crate::testing::{TestContext, TestEngine, TestVerdict};
use crate::workspace;

/// Report file names, written to the working root
pub const SINGLE_REPORT: &str = "single.csv";
pub const PAIRWISE_REPORT: &str = "pairwise.csv";
pub const PAIRWISE_PARALLEL_REPORT: &str = "pairwise_parallel.csv";

const TERMINAL_FILE: &str = "terminal.txt";
const INSTALLATION_TERMINAL_FILE: &str = "installation_terminal.txt";

/// Everything observed while testing one ordered pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairOutcome {
    pub first: String,
    pub second: String,
    pub first_test: TestVerdict,
    pub second_test: TestVerdict,
    /// Benchmark of `first` with `second`; `None` when not reached
    pub forward_bench: Option<bool>,
    /// Benchmark of `second` with `first`; `None` when not reached
    pub backward_bench: Option<bool>,
    /// Provisioning error that made the pair untestable
    pub provisioning_error: Option<String>,
}

impl PairOutcome {
    fn new(first: &str, second: &str) -> Self {
        Self {
            first: first.to_string(),
            second: second.to_string(),
            first_test: TestVerdict::NotDeclared,
            second_test: TestVerdict::NotDeclared,
            forward_bench: None,
            backward_bench: None,
            provisioning_error: None,
        }
    }

    fn unprovisioned(first: &str, second: &str, error: String) -> Self {
        Self {
            provisioning_error: Some(error),
            ..Self::new(first, second)
        }
    }

    /// Both own tests did not fail and both benchmark directions passed
    pub fn is_compatible(&self) -> bool {
        self.provisioning_error.is_none()
            && !self.first_test.is_failure()
            && !self.second_test.is_failure()
            && self.forward_bench == Some(true)
            && self.backward_bench == Some(true)
    }

    pub fn to_result(&self) -> PairResult {
        PairResult {
            first: self.first.clone(),
            second: self.second.clone(),
            compatible: self.is_compatible(),
        }
    }
}

/// Check a pairwise input set: at least two extensions, each registered with
/// download and install methods
pub fn validate_extensions(registry: &ExtensionRegistry, extensions: &[String]) -> Result<()> {
    if extensions.len() < 2 {
        return Err(Error::invalid_input(
            "must test compatibility of at least 2 extensions",
        ));
    }
    for id in extensions {
        let record = registry.require(id)?;
        if record.download.is_none() {
            return Err(Error::missing_method(id, "download"));
        }
        if record.install.is_none() {
            return Err(Error::missing_method(id, "install"));
        }
    }
    Ok(())
}

/// Runs compatibility and single-extension testing
pub struct CompatibilityRunner<'a> {
    config: &'a HarnessConfig,
    registry: &'a ExtensionRegistry,
    runner: &'a dyn CommandRunner,
    resolver: DependencyResolver,
    build_state: BuildState,
}

impl<'a> CompatibilityRunner<'a> {
    pub fn new(
        config: &'a HarnessConfig,
        registry: &'a ExtensionRegistry,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            config,
            registry,
            runner,
            resolver: DependencyResolver::new(registry),
            build_state: BuildState::unbuilt(),
        }
    }

    /// Options of the engine build currently installed by this run
    pub fn build_state(&self) -> &BuildState {
        &self.build_state
    }

    /// Test every ordered pair of `extensions`, one full cycle per pair,
    /// and write `pairwise.csv`
    pub async fn pairwise(&mut self, extensions: &[String]) -> Result<Vec<PairOutcome>> {
        validate_extensions(self.registry, extensions)?;
        workspace::prepare(self.config).await?;

        let mut outcomes = Vec::new();
        for (first, second) in ordered_pairs(extensions) {
            info!("Determining compatibility between {} and {}", first, second);
            outcomes.push(self.sequential_cycle(&first, &second).await?);
        }

        self.finish(&outcomes);
        let results: Vec<PairResult> = outcomes.iter().map(PairOutcome::to_result).collect();
        CompatibilityMatrix::from_results(extensions, &results)
            .write_csv(&self.config.report_path(PAIRWISE_REPORT))?;
        Ok(outcomes)
    }

    /// Test pre-supplied pairs against one shared build and provisioning pass,
    /// and write `pairwise_parallel.csv`
    pub async fn pairwise_parallel(
        &mut self,
        pairs: &[(String, String)],
    ) -> Result<Vec<PairOutcome>> {
        let extensions = pair_members(pairs);
        validate_extensions(self.registry, &extensions)?;
        workspace::prepare(self.config).await?;

        let closure = self.resolver.resolve_closure(&extensions)?;
        self.ensure_build(&closure).await?;

        let install_log =
            TerminalLog::create(self.config.output_dir().join(INSTALLATION_TERMINAL_FILE))?;
        let provisioner = self.provisioner();
        let mut unprovisioned: HashMap<String, String> = HashMap::new();
        for id in &closure {
            if let Err(e) = provisioner.provision(id, &install_log).await {
                let message = self.pair_scoped(e, &install_log)?;
                unprovisioned.insert(id.clone(), message);
            }
        }

        let mut outcomes = Vec::new();
        for (first, second) in pairs {
            info!("Determining compatibility between {} and {}", first, second);
            let pair_closure = self
                .resolver
                .resolve_closure(&[first.as_str(), second.as_str()])?;

            if let Some(message) = pair_closure.iter().find_map(|id| unprovisioned.get(id)) {
                outcomes.push(PairOutcome::unprovisioned(first, second, message.clone()));
                continue;
            }

            let (pair_dir, log) = self.pair_output(first, Some(second))?;
            let server = self.start_server(&pair_closure, &log).await?;
            let outcome = self.compatibility_test(first, second, &pair_dir, &log).await;
            self.stop_server(server, &log, false).await?;
            outcomes.push(outcome?);
        }

        self.finish(&outcomes);
        let results: Vec<PairResult> = outcomes.iter().map(PairOutcome::to_result).collect();
        write_pair_results(
            &self.config.report_path(PAIRWISE_PARALLEL_REPORT),
            &results,
        )?;
        Ok(outcomes)
    }

    /// Test each extension on its own, writing `single.csv` row by row
    pub async fn single(&mut self, extensions: &[String]) -> Result<Vec<SingleRow>> {
        workspace::prepare(self.config).await?;

        let mut writer = CsvWriter::create(&self.config.report_path(SINGLE_REPORT))?;
        writer.write_row(SINGLE_HEADER)?;

        let mut rows = Vec::with_capacity(extensions.len());
        for id in extensions {
            let status = self.single_status(id).await?;
            let row = SingleRow::new(id.as_str(), status);
            writer.write_row(row.cells())?;
            rows.push(row);
        }

        self.final_cleanup();
        Ok(rows)
    }

    async fn single_status(&mut self, id: &str) -> Result<SingleStatus> {
        let Some(record) = self.registry.get(id) else {
            info!("Extension {} is not in the registry", id);
            return Ok(SingleStatus::NotInRegistry);
        };
        let tests_declared = record.test.is_some();

        let closure = match self.resolver.resolve(id) {
            Ok(closure) => closure,
            Err(Error::UnknownExtension { extension }) => {
                info!("Dependency {} of {} is not supported", extension, id);
                return Ok(SingleStatus::DependencyUnsupported { tests_declared });
            }
            Err(e) => return Err(e),
        };

        let unrunnable: Vec<&str> = closure
            .iter()
            .map(String::as_str)
            .filter(|member| {
                self.registry
                    .get(member)
                    .is_none_or(|record| !record.is_provisionable())
            })
            .collect();
        if !unrunnable.is_empty() {
            info!(
                "{} cannot be run: no download or install method for {}",
                id,
                unrunnable.join(", ")
            );
            return Ok(SingleStatus::CannotRun { tests_declared });
        }

        info!("Running single testing on {}", id);
        self.ensure_build(&closure).await?;
        let (ext_dir, log) = self.pair_output(id, None)?;

        if let Err(e) = self.provisioner().provision_all(&closure, &log).await {
            self.pair_scoped(e, &log)?;
            ServerManager::new(self.config, self.registry, self.runner).cleanup(true)?;
            return Ok(SingleStatus::CannotRun { tests_declared });
        }

        let server = self.start_server(&closure, &log).await?;
        let verdict = self.single_test(id, &ext_dir, &log).await;
        self.stop_server(server, &log, true).await?;

        Ok(match verdict? {
            Some(verdict) => SingleStatus::Ran(verdict),
            None => SingleStatus::CannotRun { tests_declared },
        })
    }

    /// One sequential-mode cycle: build, provision, then the server part
    async fn sequential_cycle(&mut self, first: &str, second: &str) -> Result<PairOutcome> {
        let closure = self.resolver.resolve_closure(&[first, second])?;
        self.ensure_build(&closure).await?;
        let (pair_dir, log) = self.pair_output(first, Some(second))?;

        if let Err(e) = self.provisioner().provision_all(&closure, &log).await {
            let message = self.pair_scoped(e, &log)?;
            ServerManager::new(self.config, self.registry, self.runner).cleanup(true)?;
            return Ok(PairOutcome::unprovisioned(first, second, message));
        }

        let server = self.start_server(&closure, &log).await?;
        let outcome = self.compatibility_test(first, second, &pair_dir, &log).await;
        self.stop_server(server, &log, true).await?;
        outcome
    }

    /// Fresh storage, configuration for `closure`, running server
    async fn start_server(&self, closure: &[String], log: &TerminalLog) -> Result<ServerManager<'a>> {
        let mut server = ServerManager::new(self.config, self.registry, self.runner);
        server.init_storage(log).await?;
        server.write_config(closure)?;
        server.start(log).await?;
        Ok(server)
    }

    /// Stop and clean up; runs whether or not the tests succeeded
    async fn stop_server(
        &self,
        mut server: ServerManager<'a>,
        log: &TerminalLog,
        delete_work_dir: bool,
    ) -> Result<()> {
        server.ensure_stopped(log).await;
        server.cleanup(delete_work_dir)
    }

    /// Post-install hooks, both own tests, then both benchmark directions
    async fn compatibility_test(
        &self,
        first: &str,
        second: &str,
        output_dir: &Path,
        log: &TerminalLog,
    ) -> Result<PairOutcome> {
        let mut outcome = PairOutcome::new(first, second);

        let closure = self.resolver.resolve_closure(&[first, second])?;
        if let Err(e) = self.provisioner().post_install_all(&closure, log).await {
            outcome.provisioning_error = Some(self.pair_scoped(e, log)?);
            return Ok(outcome);
        }

        let engine = self.test_engine();
        outcome.first_test = engine
            .run_declared(&TestContext {
                extension: first,
                partner: Some(second),
                output_dir,
                log,
            })
            .await?;
        outcome.second_test = engine
            .run_declared(&TestContext {
                extension: second,
                partner: Some(first),
                output_dir,
                log,
            })
            .await?;

        if outcome.first_test.is_failure() || outcome.second_test.is_failure() {
            return Ok(outcome);
        }

        let forward = engine.run_benchmark(first, second, output_dir, log).await?;
        outcome.forward_bench = Some(forward);
        if forward {
            outcome.backward_bench = Some(engine.run_benchmark(second, first, output_dir, log).await?);
        }

        if outcome.is_compatible() {
            info!("{} and {} are compatible", first, second);
        } else {
            info!("{} and {} are not compatible", first, second);
        }
        Ok(outcome)
    }

    /// Post-install hooks then the extension's own test; `None` when a hook fails
    async fn single_test(
        &self,
        id: &str,
        output_dir: &Path,
        log: &TerminalLog,
    ) -> Result<Option<TestVerdict>> {
        let closure = self.resolver.resolve(id)?;
        if let Err(e) = self.provisioner().post_install_all(&closure, log).await {
            self.pair_scoped(e, log)?;
            return Ok(None);
        }

        let verdict = self
            .test_engine()
            .run_declared(&TestContext {
                extension: id,
                partner: None,
                output_dir,
                log,
            })
            .await?;
        Ok(Some(verdict))
    }

    async fn ensure_build(&mut self, closure: &[String]) -> Result<()> {
        let coordinator = BuildCoordinator::new(self.config, self.registry, self.runner);
        let state = std::mem::take(&mut self.build_state);
        self.build_state = coordinator.ensure_build(closure, state).await?;
        Ok(())
    }

    /// Create the output directory and terminal capture file of a pair
    fn pair_output(&self, first: &str, second: Option<&str>) -> Result<(PathBuf, TerminalLog)> {
        let dir = self
            .config
            .output_dir()
            .join(HarnessConfig::pair_dir_name(first, second));
        std::fs::create_dir_all(&dir)?;
        let log = TerminalLog::create(dir.join(TERMINAL_FILE))?;
        Ok((dir, log))
    }

    /// Keep a provisioning failure inside its pair unless the exit flag is set
    fn pair_scoped(&self, error: Error, log: &TerminalLog) -> Result<String> {
        if !error.is_provisioning() {
            return Err(error);
        }
        warn!("{}", error);
        log.note(&error.to_string());
        if self.config.exit_on_failure() {
            return Err(error);
        }
        Ok(error.to_string())
    }

    /// Drop output of compatible pairs, then remove the build
    fn finish(&self, outcomes: &[PairOutcome]) {
        for outcome in outcomes.iter().filter(|o| o.is_compatible()) {
            let dir = self.config.output_dir().join(HarnessConfig::pair_dir_name(
                &outcome.first,
                Some(&outcome.second),
            ));
            workspace::remove_path(&dir);
        }
        self.final_cleanup();
    }

    fn final_cleanup(&self) {
        if self.config.keep_build {
            info!("Keeping engine sources and build");
        } else {
            workspace::final_cleanup(self.config);
        }
    }

    fn provisioner(&self) -> Provisioner<'a> {
        Provisioner::new(self.config, self.registry, self.runner)
    }

    fn test_engine(&self) -> TestEngine<'a> {
        TestEngine::new(self.config, self.registry, self.runner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(first: TestVerdict, second: TestVerdict, fwd: Option<bool>, back: Option<bool>) -> PairOutcome {
        PairOutcome {
            first_test: first,
            second_test: second,
            forward_bench: fwd,
            backward_bench: back,
            ..PairOutcome::new("a", "b")
        }
    }

    #[test]
    fn test_compatible_requires_both_benchmarks() {
        use TestVerdict::*;
        assert!(outcome(Passed, NotDeclared, Some(true), Some(true)).is_compatible());
        assert!(outcome(NotDeclared, NotDeclared, Some(true), Some(true)).is_compatible());
        assert!(!outcome(Passed, Passed, Some(true), Some(false)).is_compatible());
        assert!(!outcome(Passed, Passed, Some(false), None).is_compatible());
        assert!(!outcome(Failed, Passed, None, None).is_compatible());
    }

    #[test]
    fn test_unprovisioned_pair_is_incompatible() {
        let outcome = PairOutcome::unprovisioned("a", "b", "git clone failed".into());
        assert!(!outcome.is_compatible());
    }

    #[test]
    fn test_validate_needs_two_extensions() {
        let registry = ExtensionRegistry::new();
        assert!(matches!(
            validate_extensions(&registry, &["a".to_string()]),
            Err(Error::InvalidInput { .. })
        ));
        assert!(matches!(
            validate_extensions(&registry, &["a".to_string(), "b".to_string()]),
            Err(Error::UnknownExtension { .. })
        ));
    }
}
