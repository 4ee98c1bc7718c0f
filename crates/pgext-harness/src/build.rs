//! Engine build coordination
//!
//! The engine distribution is compiled with the union of `configure_options`
//! of every extension under test. Pairs needing the same option set share
//! one build; any change triggers a full delete-and-rebuild.

use pgext_core::{Error, HarnessConfig, Result};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::registry::ExtensionRegistry;
use crate::runner::{CommandRunner, CommandSpec, TerminalLog};

/// Capture file for engine build output, inside the run's output directory
pub const BUILD_TERMINAL_FILE: &str = "build_terminal.txt";

/// Option set the installed engine was compiled with
///
/// Starts unbuilt and is only replaced by [`BuildCoordinator`] after a
/// successful rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildState {
    options: Option<BTreeSet<String>>,
}

impl BuildState {
    /// No engine has been built during this run
    pub fn unbuilt() -> Self {
        Self::default()
    }

    /// An engine built with `options`
    pub fn built<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            options: Some(options.into_iter().map(Into::into).collect()),
        }
    }

    pub fn is_built(&self) -> bool {
        self.options.is_some()
    }

    pub fn options(&self) -> Option<&BTreeSet<String>> {
        self.options.as_ref()
    }

    /// Whether the current build already has exactly `required` (as a set)
    pub fn satisfies(&self, required: &[String]) -> bool {
        match &self.options {
            Some(current) => {
                let required: BTreeSet<&str> = required.iter().map(String::as_str).collect();
                current.len() == required.len()
                    && current.iter().all(|opt| required.contains(opt.as_str()))
            }
            None => false,
        }
    }
}

/// Ordered, de-duplicated union of `configure_options` across `closure`
pub fn required_options<S: AsRef<str>>(
    registry: &ExtensionRegistry,
    closure: &[S],
) -> Result<Vec<String>> {
    let mut options: Vec<String> = Vec::new();
    for id in closure {
        let record = registry.require(id.as_ref())?;
        for opt in &record.configure_options {
            if !options.contains(opt) {
                options.push(opt.clone());
            }
        }
    }
    Ok(options)
}

/// Decides whether the installed engine fits a closure and rebuilds it when not
pub struct BuildCoordinator<'a> {
    config: &'a HarnessConfig,
    registry: &'a ExtensionRegistry,
    runner: &'a dyn CommandRunner,
}

impl<'a> BuildCoordinator<'a> {
    pub fn new(
        config: &'a HarnessConfig,
        registry: &'a ExtensionRegistry,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            config,
            registry,
            runner,
        }
    }

    /// Make sure the engine is built with the options `closure` requires
    ///
    /// Returns `state` untouched when the option sets already match.
    pub async fn ensure_build<S: AsRef<str>>(
        &self,
        closure: &[S],
        state: BuildState,
    ) -> Result<BuildState> {
        let options = required_options(self.registry, closure)?;
        if state.satisfies(&options) {
            debug!("Engine build already has options {:?}", options);
            return Ok(state);
        }
        self.rebuild(&options).await
    }

    /// Delete the distribution and run configure/clean/build/install
    pub async fn rebuild(&self, options: &[String]) -> Result<BuildState> {
        let version = &self.config.settings.postgres_version;
        info!(
            "Building PostgreSQL {} with options [{}]",
            version,
            options.join(" ")
        );

        let dist_dir = self.config.dist_dir();
        if dist_dir.exists() {
            debug!("Removing {}", dist_dir.display());
            std::fs::remove_dir_all(&dist_dir)?;
        }

        let log = TerminalLog::create(self.config.output_dir().join(BUILD_TERMINAL_FILE))?;
        let source_dir = self.config.source_dir();
        let jobs = format!("-j{}", self.config.settings.make_jobs);

        let steps = [
            (
                "configure",
                CommandSpec::new(source_dir.join("configure"), &source_dir)
                    .arg(format!("--prefix={}", dist_dir.display()))
                    .args(options.iter().cloned()),
            ),
            (
                "make clean",
                CommandSpec::new("make", &source_dir).arg("clean"),
            ),
            (
                "make world-bin",
                CommandSpec::new("make", &source_dir).args(["world-bin", jobs.as_str()]),
            ),
            (
                "make install-world-bin",
                CommandSpec::new("make", &source_dir).args(["install-world-bin", jobs.as_str()]),
            ),
        ];

        for (step, spec) in &steps {
            debug!("Engine build step: {}", step);
            log.append(&format!("$ {}\n", spec.display()))?;
            let output = match self.runner.run_captured(spec).await {
                Ok(output) => output,
                Err(e) => {
                    log.note(&e.to_string());
                    return Err(e);
                }
            };
            log.append(&output.stdout)?;
            log.append(&output.stderr)?;
            if !output.success() {
                log.note(&format!("{} exited with code {}", step, output.code));
                let tail: Vec<&str> = output.stderr.lines().rev().take(20).collect();
                warn!(
                    "Engine build step '{}' failed:\n{}",
                    step,
                    tail.into_iter().rev().collect::<Vec<_>>().join("\n")
                );
                return Err(Error::BuildFailed {
                    step: step.to_string(),
                    code: output.code,
                });
            }
        }

        info!("Done installing PostgreSQL {}", version);
        Ok(BuildState::built(options.iter().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbuilt_never_satisfies() {
        assert!(!BuildState::unbuilt().satisfies(&[]));
    }

    #[test]
    fn test_satisfies_compares_as_sets() {
        let state = BuildState::built(["--with-openssl", "--with-python"]);
        assert!(state.satisfies(&["--with-python".into(), "--with-openssl".into()]));
        assert!(!state.satisfies(&["--with-python".into()]));
        assert!(!state.satisfies(&[
            "--with-python".into(),
            "--with-openssl".into(),
            "--with-llvm".into()
        ]));
    }

    #[test]
    fn test_empty_build_satisfies_empty_requirement() {
        let state = BuildState::built(Vec::<String>::new());
        assert!(state.satisfies(&[]));
    }
}
