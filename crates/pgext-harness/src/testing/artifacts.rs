//! Failure artifact capture

use pgext_core::{HarnessConfig, Result};
use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

/// Recursively copy `src` into `dst`, creating `dst`
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Move a file, copying when a plain rename crosses filesystems
pub fn move_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if std::fs::rename(src, dst).is_err() {
        std::fs::copy(src, dst)?;
        std::fs::remove_file(src)?;
    }
    Ok(())
}

/// Preserve the server log in a pair's output directory
pub fn copy_server_log(config: &HarnessConfig, output_dir: &Path) {
    let log = config.server_log();
    if !log.is_file() {
        warn!("No server log at {} to preserve", log.display());
        return;
    }
    let result = std::fs::create_dir_all(output_dir)
        .and_then(|_| std::fs::copy(&log, output_dir.join("logfile")));
    if let Err(e) = result {
        warn!("Failed to copy server log: {}", e);
    }
}
