//! Working-root preparation and teardown
//!
//! Before a run the engine sources are fetched and unpacked into the root,
//! the scratch directory is emptied, and an advisory lock keeps a second
//! harness from sharing the same root. After the run the build is removed
//! unless it was asked to be kept.

use fs4::fs_std::FileExt;
use pgext_core::{Error, HarnessConfig, Result};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Programs that must be on `PATH` before anything is built
pub const REQUIRED_TOOLS: &[&str] = &["make", "git", "tar", "unzip"];

/// Exclusive advisory lock on the working root, released on drop
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    _file: File,
}

impl RunLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Take the run lock, blocking while another run holds it
pub fn acquire_lock(config: &HarnessConfig) -> Result<RunLock> {
    let path = config.lock_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)?;
    file.lock_exclusive()?;
    debug!("Acquired run lock {}", path.display());

    Ok(RunLock { path, _file: file })
}

/// Tools from [`REQUIRED_TOOLS`] that cannot be found
pub fn missing_tools() -> Vec<&'static str> {
    REQUIRED_TOOLS
        .iter()
        .copied()
        .filter(|tool| which::which(tool).is_err())
        .collect()
}

/// Warn about build prerequisites that are not installed
pub fn preflight() -> Vec<&'static str> {
    let missing = missing_tools();
    for tool in &missing {
        warn!("Required program '{}' not found on PATH", tool);
    }
    missing
}

/// Download `url` into `destination`
pub async fn download_file(url: &str, destination: &Path) -> Result<()> {
    debug!("Downloading {} to {}", url, destination.display());

    let download_error = |message: String| Error::Download {
        url: url.to_string(),
        message,
    };

    let response = reqwest::get(url)
        .await
        .map_err(|e| download_error(e.to_string()))?;
    if !response.status().is_success() {
        return Err(download_error(format!("HTTP status {}", response.status())));
    }
    let data = response
        .bytes()
        .await
        .map_err(|e| download_error(e.to_string()))?;

    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(destination, &data).await?;
    Ok(())
}

/// Unpack a gzip-compressed tarball into `destination`
pub async fn extract_tarball(archive: &Path, destination: &Path) -> Result<()> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    let archive = archive.to_path_buf();
    let dest = destination.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = File::open(&archive)?;
        let mut unpacker = Archive::new(GzDecoder::new(file));
        unpacker.unpack(&dest)?;
        Ok(())
    })
    .await
    .map_err(|e| Error::Io(std::io::Error::other(e)))??;

    Ok(())
}

/// Ready the working root for a run
///
/// Fetches and unpacks the engine sources when they are not already there,
/// empties the scratch directory and creates the output directory.
pub async fn prepare(config: &HarnessConfig) -> Result<()> {
    std::fs::create_dir_all(&config.root)?;

    let source_dir = config.source_dir();
    if source_dir.is_dir() {
        debug!("Engine sources already present at {}", source_dir.display());
    } else {
        let archive = config.root.join(config.source_archive_name());
        if !archive.is_file() {
            info!(
                "Downloading PostgreSQL {} sources",
                config.settings.postgres_version
            );
            download_file(&config.source_archive_url(), &archive).await?;
        }
        info!("Unpacking {}", archive.display());
        extract_tarball(&archive, &config.root).await?;
        std::fs::remove_file(&archive)?;
    }

    reset_dir(&config.work_dir())?;
    std::fs::create_dir_all(config.output_dir())?;
    Ok(())
}

/// Remove the engine sources, distribution and scratch directory
///
/// Missing paths are ignored; other failures only warn so a finished run
/// still writes its report.
pub fn final_cleanup(config: &HarnessConfig) {
    for path in [
        config.source_dir(),
        config.dist_dir(),
        config.data_dir(),
        config.work_dir(),
    ] {
        remove_path(&path);
    }
    remove_path(&config.server_log());
    remove_path(&config.root.join(config.source_archive_name()));
}

/// Empty a directory, creating it when missing
pub fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// Remove a file or directory tree, warning on failure
pub fn remove_path(path: &Path) {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else if path.exists() {
        std::fs::remove_file(path)
    } else {
        return;
    };

    if let Err(e) = result {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}
