//! Extension and pair list handling
//!
//! Lists are plain text: one extension per line, or for the parallel mode
//! one space-separated pair per line. Blank lines and surrounding whitespace
//! are ignored.

use pgext_core::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::build::required_options;
use crate::dependency::DependencyResolver;
use crate::registry::ExtensionRegistry;

/// Read a newline-delimited extension list
pub fn read_extension_list(path: &Path) -> Result<Vec<String>> {
    let content = read_list(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Read a list of space-separated extension pairs
pub fn read_pair_list(path: &Path) -> Result<Vec<(String, String)>> {
    let content = read_list(path)?;
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [first, second] => Ok((first.to_string(), second.to_string())),
                _ => Err(Error::invalid_input(format!(
                    "{} entry {}: expected two extensions, got '{}'",
                    path.display(),
                    index + 1,
                    line
                ))),
            }
        })
        .collect()
}

fn read_list(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::invalid_input(format!("list file {} does not exist", path.display()))
        } else {
            Error::Io(e)
        }
    })
}

/// All ordered pairs of distinct extensions, first-major
pub fn ordered_pairs(extensions: &[String]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for first in extensions {
        for second in extensions {
            if first != second {
                pairs.push((first.clone(), second.clone()));
            }
        }
    }
    pairs
}

/// Extensions named by a pair list, in order of first appearance
pub fn pair_members(pairs: &[(String, String)]) -> Vec<String> {
    let mut members: Vec<String> = Vec::new();
    for (first, second) in pairs {
        for id in [first, second] {
            if !members.contains(id) {
                members.push(id.clone());
            }
        }
    }
    members
}

/// Group all ordered pairs by the configure options their closures need
///
/// Keys are the sorted, de-duplicated option lists; each group can run in
/// the parallel mode without an engine rebuild.
pub fn group_pairs_by_options(
    registry: &ExtensionRegistry,
    extensions: &[String],
) -> Result<BTreeMap<Vec<String>, Vec<(String, String)>>> {
    let resolver = DependencyResolver::new(registry);
    let mut groups: BTreeMap<Vec<String>, Vec<(String, String)>> = BTreeMap::new();

    for (first, second) in ordered_pairs(extensions) {
        let closure = resolver.resolve_closure(&[first.as_str(), second.as_str()])?;
        let mut options = required_options(registry, &closure)?;
        options.sort();
        groups.entry(options).or_default().push((first, second));
    }
    Ok(groups)
}

/// Write each group to `<dir>/<prefix><n>.txt`, numbered from 1
pub fn write_pair_groups(
    dir: &Path,
    prefix: &str,
    groups: &BTreeMap<Vec<String>, Vec<(String, String)>>,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(groups.len());
    for (index, (options, pairs)) in groups.iter().enumerate() {
        let path = dir.join(format!("{}{}.txt", prefix, index + 1));
        let body = pairs
            .iter()
            .map(|(first, second)| format!("{} {}", first, second))
            .collect::<Vec<_>>()
            .join("\n");
        std::fs::write(&path, body)?;
        debug!(
            "Wrote {} pairs needing [{}] to {}",
            pairs.len(),
            options.join(" "),
            path.display()
        );
        written.push(path);
    }
    Ok(written)
}

/// Extensions of `extensions` that ship in the engine's contrib tree
pub fn contrib_extensions(registry: &ExtensionRegistry, extensions: &[String]) -> Vec<String> {
    extensions
        .iter()
        .filter(|id| match registry.get(id) {
            Some(record) => record.is_contrib(),
            None => {
                warn!("Extension {} is not in the registry", id);
                false
            }
        })
        .cloned()
        .collect()
}
