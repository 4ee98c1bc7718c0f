//! Contrib command

use anyhow::Result;
use pgext_harness::pairs::{contrib_extensions, read_extension_list};
use std::path::Path;

use crate::cli::ContribArgs;
use crate::utils;

/// Print the extensions of a list that ship in the engine's contrib tree
pub fn run(args: ContribArgs, root: Option<&Path>, config_path: Option<&Path>) -> Result<()> {
    let config = utils::load_config(root, config_path)?;
    let registry = utils::load_registry(&config)?;

    let extensions = read_extension_list(&args.list)?;
    for id in contrib_extensions(&registry, &extensions) {
        println!("{}", id);
    }
    Ok(())
}
