//! Extension provisioning pipeline
//!
//! Fetches extension sources into the scratch working directory and builds
//! them against the installed engine. Every step's exit status is checked;
//! a failing step surfaces as [`Error::ProvisioningFailed`] naming the
//! extension and step.

use pgext_core::types::{DownloadMethod, ExtensionRecord, InstallMethod};
use pgext_core::{Error, HarnessConfig, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::registry::ExtensionRegistry;
use crate::runner::{run_lenient, CommandRunner, CommandSpec, TerminalLog};
use crate::workspace;

/// Downloads, builds and installs extensions
pub struct Provisioner<'a> {
    config: &'a HarnessConfig,
    registry: &'a ExtensionRegistry,
    runner: &'a dyn CommandRunner,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        config: &'a HarnessConfig,
        registry: &'a ExtensionRegistry,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            config,
            registry,
            runner,
        }
    }

    /// Where an extension's sources live: the engine's contrib tree or the
    /// scratch working directory
    pub fn source_dir(&self, record: &ExtensionRecord) -> PathBuf {
        source_dir_for(self.config, record)
    }

    /// Fetch and install one extension
    ///
    /// `contrib`/`downloaded` sources and `installed` builds are no-ops.
    pub async fn provision(&self, id: &str, log: &TerminalLog) -> Result<()> {
        let record = self.registry.require(id)?;
        let download = record
            .download
            .as_ref()
            .ok_or_else(|| Error::missing_method(id, "download"))?;
        let install = record
            .install
            .as_ref()
            .ok_or_else(|| Error::missing_method(id, "install"))?;

        if download.is_noop() {
            debug!("{} sources are already in place ({})", id, download);
            return Ok(());
        }

        info!("Downloading extension {}", id);
        log.note(&format!("provisioning {} ({} / {})", id, download, install));
        self.download(record, download, log).await?;

        info!("Installing {}", id);
        self.install(record, install, log).await
    }

    /// Provision every member of a closure, in order
    pub async fn provision_all<S: AsRef<str>>(&self, closure: &[S], log: &TerminalLog) -> Result<()> {
        for id in closure {
            self.provision(id.as_ref(), log).await?;
        }
        Ok(())
    }

    /// Run an extension's post-install hook against the live server
    pub async fn post_install(&self, id: &str, log: &TerminalLog) -> Result<()> {
        let record = self.registry.require(id)?;
        let Some(script) = record.post_install_script.as_deref() else {
            return Ok(());
        };
        debug!("Running post-install script {} for {}", script, id);
        self.run_script(record, script, "post-install script", log)
            .await
    }

    /// Run post-install hooks for every member of a closure, in order
    pub async fn post_install_all<S: AsRef<str>>(
        &self,
        closure: &[S],
        log: &TerminalLog,
    ) -> Result<()> {
        for id in closure {
            self.post_install(id.as_ref(), log).await?;
        }
        Ok(())
    }

    async fn download(
        &self,
        record: &ExtensionRecord,
        method: &DownloadMethod,
        log: &TerminalLog,
    ) -> Result<()> {
        let work_dir = self.config.work_dir();
        std::fs::create_dir_all(&work_dir)?;

        match method {
            DownloadMethod::Contrib | DownloadMethod::Downloaded => Ok(()),
            DownloadMethod::Git { url } => {
                if work_dir.join(record.folder()).exists() {
                    log.note(&format!("{} already cloned", record.folder()));
                    return Ok(());
                }
                let spec = CommandSpec::new("git", &work_dir).args(["clone", url.as_str(), record.folder()]);
                self.checked(record, "git clone", &spec, log).await
            }
            DownloadMethod::Tar { url } | DownloadMethod::Zip { url } => {
                let archive_name = archive_name(url)
                    .ok_or_else(|| Error::invalid_record(&record.id, "download_url has no file name"))?;
                let archive = work_dir.join(&archive_name);
                log.note(&format!("downloading {}", url));
                workspace::download_file(url, &archive).await?;

                let spec = match method {
                    DownloadMethod::Zip { .. } => {
                        CommandSpec::new("unzip", &work_dir).args(["-o", archive_name.as_str()])
                    }
                    _ => CommandSpec::new("tar", &work_dir).args(["-xf", archive_name.as_str()]),
                };
                self.checked(record, "extract archive", &spec, log).await?;
                std::fs::remove_file(&archive)?;
                Ok(())
            }
        }
    }

    async fn install(
        &self,
        record: &ExtensionRecord,
        method: &InstallMethod,
        log: &TerminalLog,
    ) -> Result<()> {
        match method {
            InstallMethod::Installed => Ok(()),
            InstallMethod::Pgxs => {
                let source_dir = self.source_dir(record);
                let pg_config = format!("PG_CONFIG={}", self.config.pg_config().display());
                let jobs = format!("-j{}", self.config.settings.make_jobs);

                let build = CommandSpec::new("make", &source_dir).args([
                    "USE_PGXS=1",
                    pg_config.as_str(),
                    jobs.as_str(),
                ]);
                self.checked(record, "make", &build, log).await?;

                let install = CommandSpec::new("make", &source_dir).args([
                    "USE_PGXS=1",
                    pg_config.as_str(),
                    "install",
                    jobs.as_str(),
                ]);
                self.checked(record, "make install", &install, log).await
            }
            InstallMethod::ShellScript { script } => {
                self.run_script(record, script, "install script", log).await
            }
        }
    }

    /// Copy a script from the script directory into the sources and run it there
    async fn run_script(
        &self,
        record: &ExtensionRecord,
        script: &str,
        step: &str,
        log: &TerminalLog,
    ) -> Result<()> {
        let source_dir = self.source_dir(record);
        let target = stage_script(&self.config.scripts_dir(), script, &source_dir)?;
        let spec = CommandSpec::new(target, &source_dir);
        self.checked(record, step, &spec, log).await
    }

    async fn checked(
        &self,
        record: &ExtensionRecord,
        step: &str,
        spec: &CommandSpec,
        log: &TerminalLog,
    ) -> Result<()> {
        let code = run_lenient(self.runner, spec, log).await;
        if code != 0 {
            return Err(Error::provisioning_failed(&record.id, step, code));
        }
        Ok(())
    }
}

/// Source directory of `record` under the working root
pub fn source_dir_for(config: &HarnessConfig, record: &ExtensionRecord) -> PathBuf {
    if record.is_contrib() {
        config.contrib_dir().join(record.folder())
    } else {
        config.work_dir().join(record.folder())
    }
}

/// Copy `script` from `scripts_dir` into `dest_dir` and make it executable
pub fn stage_script(scripts_dir: &Path, script: &str, dest_dir: &Path) -> Result<PathBuf> {
    let target = dest_dir.join(script);
    std::fs::create_dir_all(dest_dir)?;
    std::fs::copy(scripts_dir.join(script), &target)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o755))?;
    }

    Ok(target)
}

/// Last path segment of an archive URL
fn archive_name(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .next_back()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}
