//! Regression-diff strategy

use pgext_core::types::{ExtensionRecord, RegressTest, SOURCE_DIR_PLACEHOLDER};
use pgext_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::artifacts::{copy_dir, copy_server_log, move_file};
use super::{TestContext, TestEngine, TestVerdict};
use crate::provision::source_dir_for;
use crate::runner::{run_lenient, CommandSpec};

const LAUNCHER_PREFIX: &str = "--launcher=";
const LOAD_EXTENSION_PREFIX: &str = "--load-extension=";

impl TestEngine<'_> {
    pub(super) async fn run_regress(
        &self,
        ctx: &TestContext<'_>,
        record: &ExtensionRecord,
        test: &RegressTest,
    ) -> Result<TestVerdict> {
        let base = source_dir_for(self.config, record);
        let input_dir = base.join(&test.input_dir);

        if let Some(expected_dir) = &test.expected_dir {
            let from = base.join(expected_dir).join("expected");
            debug!("Copying {} into {}", from.display(), input_dir.display());
            copy_dir(&from, &input_dir.join("expected"))?;
        }
        validate_fixtures(&record.id, &input_dir, &test.test_list)?;

        let options = absolute_launcher(&test.options, &base);
        let load_flags = match ctx.partner {
            Some(partner) => self.load_extension_flags(ctx.extension, partner, &options)?,
            None => Vec::new(),
        };

        let mut env: Vec<(String, String)> = Vec::new();
        if let Some(path) = &test.path {
            env.push(("PATH".to_string(), path.clone()));
        }
        env.extend(record.env.iter().cloned());

        let mut spec = CommandSpec::new(self.config.pg_regress(), &base)
            .arg("--outputdir=./")
            .arg(format!("--bindir={}", self.config.dist_dir().join("bin").display()))
            .arg(format!("--inputdir={}", test.input_dir))
            .args(options)
            .args(load_flags)
            .args(test.test_list.iter().cloned())
            .envs(env.iter().cloned());
        if self.config.is_custom_port() {
            spec = spec.arg(format!("--port={}", self.config.port()));
        }

        let code = match self.run_snippets(&record.before_test_scripts, &base, &env, ctx).await {
            0 => run_lenient(self.runner, &spec, ctx.log).await,
            code => {
                ctx.log.note(&format!(
                    "before_test_scripts for {} exited with code {}",
                    record.id, code
                ));
                code
            }
        };

        let verdict = match code {
            0 => TestVerdict::Passed,
            1 => {
                self.capture_regress_failure(&record.id, &base, ctx.output_dir)?;
                TestVerdict::Failed
            }
            other => {
                warn!("Tests for extension {} could not run (exit code {})", record.id, other);
                copy_server_log(self.config, ctx.output_dir);
                TestVerdict::Failed
            }
        };

        for snippet in &record.after_test_scripts {
            let spec = CommandSpec::new("sh", &base)
                .args(["-c", snippet.as_str()])
                .envs(env.iter().cloned());
            run_lenient(self.runner, &spec, ctx.log).await;
        }

        Ok(verdict)
    }

    /// `--load-extension` flags for the partner's closure
    ///
    /// Skips the extension under test, entries without a SQL object and
    /// anything already loaded by the declared options.
    fn load_extension_flags(
        &self,
        extension: &str,
        partner: &str,
        options: &[String],
    ) -> Result<Vec<String>> {
        let loaded: Vec<&str> = options
            .iter()
            .filter_map(|opt| opt.strip_prefix(LOAD_EXTENSION_PREFIX))
            .collect();

        let mut flags = Vec::new();
        for dep in self.resolver.resolve(partner)? {
            if dep == extension || loaded.contains(&dep.as_str()) {
                continue;
            }
            if !self.registry.require(&dep)?.creates_extension {
                continue;
            }
            flags.push(format!("{}{}", LOAD_EXTENSION_PREFIX, dep));
        }
        Ok(flags)
    }

    /// Run shell snippets in order, stopping at the first failure
    async fn run_snippets(
        &self,
        snippets: &[String],
        cwd: &Path,
        env: &[(String, String)],
        ctx: &TestContext<'_>,
    ) -> i32 {
        for snippet in snippets {
            let spec = CommandSpec::new("sh", cwd)
                .args(["-c", snippet.as_str()])
                .envs(env.iter().cloned());
            let code = run_lenient(self.runner, &spec, ctx.log).await;
            if code != 0 {
                return code;
            }
        }
        0
    }

    fn capture_regress_failure(&self, id: &str, base: &Path, output_dir: &Path) -> Result<()> {
        let results = base.join("results");
        if results.is_dir() {
            copy_dir(&results, &output_dir.join("results"))?;
        }
        for (file, suffix) in [("regression.out", "out"), ("regression.diffs", "diffs")] {
            let src = base.join(file);
            if src.is_file() {
                move_file(&src, &output_dir.join(format!("{}.{}", id, suffix)))?;
            } else {
                warn!("{} missing after failed run of {}", src.display(), id);
            }
        }
        copy_server_log(self.config, output_dir);
        Ok(())
    }
}

/// Every named case needs `sql/<name>.sql` and `expected/<name>.out`
fn validate_fixtures(id: &str, input_dir: &Path, test_list: &[String]) -> Result<()> {
    if test_list.is_empty() {
        return Err(Error::EmptyTestList {
            extension: id.to_string(),
        });
    }

    for name in test_list {
        for path in [
            input_dir.join("sql").join(format!("{}.sql", name)),
            input_dir.join("expected").join(format!("{}.out", name)),
        ] {
            if !path.is_file() {
                return Err(Error::MissingFixture {
                    extension: id.to_string(),
                    path,
                });
            }
        }
    }
    Ok(())
}

/// Resolve a `--launcher=` option against the extension sources
///
/// `$PATH` stands for the source directory; other relative paths are joined onto it.
fn absolute_launcher(options: &[String], base: &Path) -> Vec<String> {
    options
        .iter()
        .map(|opt| match opt.strip_prefix(LAUNCHER_PREFIX) {
            Some(launcher) if launcher.starts_with(SOURCE_DIR_PLACEHOLDER) => {
                let rest = launcher
                    .strip_prefix(SOURCE_DIR_PLACEHOLDER)
                    .unwrap_or_default()
                    .trim_start_matches('/');
                let resolved: PathBuf = if rest.is_empty() {
                    base.to_path_buf()
                } else {
                    base.join(rest)
                };
                format!("{}{}", LAUNCHER_PREFIX, resolved.display())
            }
            Some(launcher) if Path::new(launcher).is_relative() => {
                let resolved: PathBuf = base.join(launcher.trim_start_matches("./"));
                format!("{}{}", LAUNCHER_PREFIX, resolved.display())
            }
            _ => opt.clone(),
        })
        .collect()
}
