//! Load-benchmark strategy

use pgext_core::Result;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{info, warn};

use super::artifacts::copy_server_log;
use super::TestEngine;
use crate::runner::{run_lenient, CommandSpec, TerminalLog};

static FAILED_TXN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^number of failed transactions:\s*(\d+)").expect("failed transaction regex is valid")
});

/// Failed-transaction count reported by `pgbench`, if present
pub fn failed_transactions(output: &str) -> Option<u64> {
    FAILED_TXN_RE
        .captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

impl TestEngine<'_> {
    /// Benchmark `extension` with `partner` installed alongside
    ///
    /// Passes when the load generator exits 0 and reports no failed
    /// transactions. The scratch database is always dropped.
    pub async fn run_benchmark(
        &self,
        extension: &str,
        partner: &str,
        output_dir: &Path,
        log: &TerminalLog,
    ) -> Result<bool> {
        info!("Benchmarking {} with {}", extension, partner);
        let bench = &self.config.settings.bench;
        let port = self.config.port().to_string();
        let root = &self.config.root;

        let createdb = CommandSpec::new(self.config.bin("createdb"), root)
            .args(["-p", port.as_str(), bench.database.as_str()]);
        run_lenient(self.runner, &createdb, log).await;

        for id in self.resolver.resolve_closure(&[extension, partner])? {
            if self.registry.require(&id)?.creates_extension {
                let spec = self.psql_create_extension(&id, &bench.database);
                run_lenient(self.runner, &spec, log).await;
            }
        }

        let init = CommandSpec::new(self.config.bin("pgbench"), root).args([
            "-i".to_string(),
            "-s".to_string(),
            bench.scale.to_string(),
            "-p".to_string(),
            port.clone(),
            bench.database.clone(),
        ]);
        run_lenient(self.runner, &init, log).await;

        let load = CommandSpec::new(self.config.bin("pgbench"), root).args([
            "-p".to_string(),
            port.clone(),
            "--no-vacuum".to_string(),
            "-T".to_string(),
            bench.duration_secs.to_string(),
            "-c".to_string(),
            bench.clients.to_string(),
            "-j".to_string(),
            bench.threads.to_string(),
            bench.database.clone(),
        ]);
        log.append(&format!("$ {}\n", load.display()))?;
        let passed = match self.runner.run_captured(&load).await {
            Ok(output) => {
                log.append(&output.stdout)?;
                log.append(&output.stderr)?;
                output.success() && failed_transactions(&output.stdout).unwrap_or(0) == 0
            }
            Err(e) => {
                warn!("{}", e);
                log.note(&e.to_string());
                false
            }
        };

        let dropdb = CommandSpec::new(self.config.bin("dropdb"), root)
            .args(["-p", port.as_str(), bench.database.as_str()]);
        run_lenient(self.runner, &dropdb, log).await;

        if !passed {
            warn!("Benchmark of {} with {} failed", extension, partner);
            copy_server_log(self.config, output_dir);
        }
        Ok(passed)
    }
}
