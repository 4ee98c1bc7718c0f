//! Run command - single, pairwise and pairwise-parallel testing

use anyhow::{Context, Result};
use pgext_core::HarnessConfig;
use pgext_harness::compatibility::{PAIRWISE_PARALLEL_REPORT, PAIRWISE_REPORT, SINGLE_REPORT};
use pgext_harness::pairs::{read_extension_list, read_pair_list};
use pgext_harness::{workspace, CompatibilityRunner, PairOutcome, SingleStatus, SystemRunner};
use pgext_harness::{ExtensionRegistry, TestVerdict};
use std::path::Path;

use crate::cli::{Mode, RunArgs};
use crate::{output, utils};

pub async fn run(args: RunArgs, root: Option<&Path>, config_path: Option<&Path>) -> Result<()> {
    if args.mode == Mode::Combinatorial {
        output::info("Combinatorial testing is not implemented yet");
        return Ok(());
    }

    let mut config = utils::load_config(root, config_path)?.with_keep_build(args.keep_build);
    if let Some(port) = args.port {
        config = config.with_port(port);
    }
    if args.exit_flag {
        config = config.with_exit_flag(true);
    }

    let spinner = output::spinner("Loading extension registry...");
    let registry = utils::load_registry(&config);
    spinner.finish_and_clear();
    let registry = registry?;

    let _lock = workspace::acquire_lock(&config).context("Failed to acquire the run lock")?;
    let missing = workspace::preflight();
    if !missing.is_empty() {
        output::warning(&format!("Missing programs: {}", missing.join(", ")));
    }

    output::header("pgext run");
    output::kv("Root", &config.root.display().to_string());
    output::kv("PostgreSQL", &config.settings.postgres_version);
    output::kv("Port", &config.port().to_string());
    output::kv("Output", &config.output_dir().display().to_string());

    match args.mode {
        Mode::Single => run_single(&config, &registry, &args.list).await,
        Mode::Pairwise => run_pairwise(&config, &registry, &args.list).await,
        Mode::PairwiseParallel => run_parallel(&config, &registry, &args.list).await,
        Mode::Combinatorial => Ok(()),
    }
}

async fn run_single(config: &HarnessConfig, registry: &ExtensionRegistry, list: &Path) -> Result<()> {
    let extensions = read_extension_list(list)?;
    let runner = SystemRunner;
    let mut compat = CompatibilityRunner::new(config, registry, &runner);

    output::info(&format!("Testing {} extensions", extensions.len()));
    let rows = compat
        .single(&extensions)
        .await
        .context("Single-extension testing failed")?;

    output::header("Results");
    for row in &rows {
        let status = match row.status {
            SingleStatus::NotInRegistry => "not in registry",
            SingleStatus::DependencyUnsupported { .. } => "dependency unsupported",
            SingleStatus::CannotRun { .. } => "cannot be run",
            SingleStatus::Ran(TestVerdict::NotDeclared) => "no tests",
            SingleStatus::Ran(TestVerdict::Passed) => "tests pass",
            SingleStatus::Ran(TestVerdict::Failed) => "tests fail",
        };
        output::kv(&row.extension, status);
    }
    output::success(&format!(
        "Report written to {}",
        config.report_path(SINGLE_REPORT).display()
    ));
    Ok(())
}

async fn run_pairwise(config: &HarnessConfig, registry: &ExtensionRegistry, list: &Path) -> Result<()> {
    let extensions = read_extension_list(list)?;
    let runner = SystemRunner;
    let mut compat = CompatibilityRunner::new(config, registry, &runner);

    output::info(&format!("Testing {} extensions pairwise", extensions.len()));
    let outcomes = compat
        .pairwise(&extensions)
        .await
        .context("Pairwise testing failed")?;

    summarize(&outcomes);
    output::success(&format!(
        "Report written to {}",
        config.report_path(PAIRWISE_REPORT).display()
    ));
    Ok(())
}

async fn run_parallel(config: &HarnessConfig, registry: &ExtensionRegistry, list: &Path) -> Result<()> {
    let pairs = read_pair_list(list)?;
    let runner = SystemRunner;
    let mut compat = CompatibilityRunner::new(config, registry, &runner);

    output::info(&format!("Testing {} pairs", pairs.len()));
    let outcomes = compat
        .pairwise_parallel(&pairs)
        .await
        .context("Pairwise testing failed")?;

    summarize(&outcomes);
    output::success(&format!(
        "Report written to {}",
        config.report_path(PAIRWISE_PARALLEL_REPORT).display()
    ));
    Ok(())
}

fn summarize(outcomes: &[PairOutcome]) {
    output::header("Results");
    println!("{}", output::pair_table(outcomes));

    let compatible = outcomes.iter().filter(|o| o.is_compatible()).count();
    output::info(&format!(
        "{} of {} pairs compatible",
        compatible,
        outcomes.len()
    ));
}
