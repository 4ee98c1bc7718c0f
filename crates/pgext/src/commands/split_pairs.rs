//! Split pairs command

use anyhow::Result;
use pgext_harness::pairs::{group_pairs_by_options, read_extension_list, write_pair_groups};
use std::path::Path;

use crate::cli::SplitPairsArgs;
use crate::{output, utils};

/// Write one pair list per distinct engine build, ready for pairwise-parallel runs
pub fn run(args: SplitPairsArgs, root: Option<&Path>, config_path: Option<&Path>) -> Result<()> {
    let config = utils::load_config(root, config_path)?;
    let registry = utils::load_registry(&config)?;

    let extensions = read_extension_list(&args.list)?;
    let groups = group_pairs_by_options(&registry, &extensions)?;
    let files = write_pair_groups(&config.root.join(&args.prefix), &args.prefix, &groups)?;

    output::header("Pair groups");
    for ((options, pairs), path) in groups.iter().zip(&files) {
        let options = if options.is_empty() {
            "(no options)".to_string()
        } else {
            options.join(" ")
        };
        output::kv(
            &path.display().to_string(),
            &format!("{} pairs, {}", pairs.len(), options),
        );
    }
    output::success(&format!("Wrote {} pair lists", files.len()));
    Ok(())
}
