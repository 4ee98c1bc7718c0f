//! Custom-script strategy

use pgext_core::types::{ExtensionRecord, ScriptTest};
use pgext_core::{Error, Result};
use tracing::warn;

use super::artifacts::{copy_server_log, move_file};
use super::{TestContext, TestEngine, TestVerdict};
use crate::provision::{source_dir_for, stage_script};
use crate::runner::{run_lenient, CommandSpec};

impl TestEngine<'_> {
    pub(super) async fn run_script(
        &self,
        ctx: &TestContext<'_>,
        record: &ExtensionRecord,
        test: &ScriptTest,
    ) -> Result<TestVerdict> {
        let fixture = self.config.expected_results_dir().join(&test.expected);
        let expected = std::fs::read_to_string(&fixture).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::MissingFixture {
                    extension: record.id.clone(),
                    path: fixture.clone(),
                }
            } else {
                Error::Io(e)
            }
        })?;

        let base = source_dir_for(self.config, record);
        let script = stage_script(&self.config.scripts_dir(), &test.script, &base)?;

        let mut env: Vec<(String, String)> = Vec::new();
        if let Some(partner) = ctx.partner {
            env.push(("COMPATIBLE_EXTENSION".to_string(), partner.to_string()));
            let partner_record = self.registry.require(partner)?;
            if !partner_record.custom_config.is_empty() {
                env.push((
                    "EXTRA_CONFIGS".to_string(),
                    partner_record.custom_config.join(";"),
                ));
            }
            self.create_partner_extensions(ctx, partner).await?;
        }
        env.extend(record.env.iter().cloned());

        let spec = CommandSpec::new(script, &base).envs(env);
        let stdout = match self.runner.run_captured(&spec).await {
            Ok(output) => output.stdout,
            Err(e) => {
                warn!("{}", e);
                ctx.log.note(&e.to_string());
                String::new()
            }
        };
        ctx.log.append(&stdout)?;

        if test.match_mode.matches(&stdout, &expected) {
            return Ok(TestVerdict::Passed);
        }

        copy_server_log(self.config, ctx.output_dir);
        for artifact in &test.fail_artifacts {
            let src = base.join(&artifact.source);
            if !src.exists() {
                warn!("Fail artifact {} was not produced", src.display());
                continue;
            }
            move_file(&src, &ctx.output_dir.join(&artifact.target))?;
        }
        Ok(TestVerdict::Failed)
    }

    /// `CREATE EXTENSION` in `template1` for partner closure members the
    /// extension under test does not already pull in
    async fn create_partner_extensions(&self, ctx: &TestContext<'_>, partner: &str) -> Result<()> {
        let own = self.resolver.resolve(ctx.extension)?;
        for dep in self.resolver.resolve(partner)? {
            if own.contains(&dep) || !self.registry.require(&dep)?.creates_extension {
                continue;
            }
            let spec = self.psql_create_extension(&dep, "template1");
            run_lenient(self.runner, &spec, ctx.log).await;
        }
        Ok(())
    }

    /// `psql -c 'CREATE EXTENSION "<id>";' <database>` against the live server
    pub(super) fn psql_create_extension(&self, id: &str, database: &str) -> CommandSpec {
        CommandSpec::new(self.config.bin("psql"), &self.config.root).args([
            format!("--port={}", self.config.port()),
            "-c".to_string(),
            format!("CREATE EXTENSION \"{}\";", id.replace('"', "\"\"")),
            database.to_string(),
        ])
    }
}
