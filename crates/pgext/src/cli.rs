//! CLI argument parsing with clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// pgext - PostgreSQL extension compatibility testing
#[derive(Parser, Debug)]
#[command(name = "pgext")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to pgext.yaml config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Working root holding extn_info/, extn_scripts/ and the engine build
    #[arg(long, global = true, env = "PGEXT_ROOT")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run compatibility or single-extension testing
    Run(RunArgs),

    /// Split all pairs of an extension list into groups sharing a build
    SplitPairs(SplitPairsArgs),

    /// Print the contrib extensions of a list
    Contrib(ContribArgs),
}

/// Testing mode
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Test each extension on its own
    Single,
    /// Test every ordered pair, rebuilding as needed
    Pairwise,
    /// Test pre-paired extensions against one shared build
    PairwiseParallel,
    /// Not implemented
    Combinatorial,
}

// Run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Extension list (one identifier per line; pairs for pairwise-parallel)
    #[arg(short, long)]
    pub list: PathBuf,

    /// Testing mode
    #[arg(short, long, value_enum)]
    pub mode: Mode,

    /// Port the engine listens on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Abort the whole run on the first failed test
    #[arg(long)]
    pub exit_flag: bool,

    /// Leave the engine sources and build in place afterwards
    #[arg(long)]
    pub keep_build: bool,
}

// Split pairs command
#[derive(Args, Debug)]
pub struct SplitPairsArgs {
    /// Extension list (one identifier per line)
    #[arg(short, long)]
    pub list: PathBuf,

    /// Output directory and file name prefix of the pair lists
    #[arg(long, default_value = "pairs")]
    pub prefix: String,
}

// Contrib command
#[derive(Args, Debug)]
pub struct ContribArgs {
    /// Extension list (one identifier per line)
    #[arg(short, long)]
    pub list: PathBuf,
}
