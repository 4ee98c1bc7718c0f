//! Paths derived from the harness configuration
//!
//! Everything lives under the working root:
//!
//! ```text
//! <root>/postgresql-<ver>/          engine sources (contrib/ inside)
//! <root>/pg-<major>-dist/           installed engine distribution
//! <root>/pg-<major>-data/           storage area of the live server
//! <root>/logfile                    server log
//! <root>/pgextworkdir/              fetched extension sources
//! <root>/testing-output-<label>/    per-pair capture files and failure artifacts
//! ```

use super::HarnessConfig;
use std::path::PathBuf;

impl HarnessConfig {
    /// Major release, e.g. `15` for `15.3`
    pub fn major_version(&self) -> &str {
        let version = &self.settings.postgres_version;
        version.split('.').next().unwrap_or(version)
    }

    /// Unpacked engine sources
    pub fn source_dir(&self) -> PathBuf {
        self.root
            .join(format!("postgresql-{}", self.settings.postgres_version))
    }

    /// Engine source archive file name
    pub fn source_archive_name(&self) -> String {
        format!("postgresql-{}.tar.gz", self.settings.postgres_version)
    }

    /// Upstream location of the engine source archive
    pub fn source_archive_url(&self) -> String {
        format!(
            "https://ftp.postgresql.org/pub/source/v{}/{}",
            self.settings.postgres_version,
            self.source_archive_name()
        )
    }

    /// contrib/ directory of the engine sources
    pub fn contrib_dir(&self) -> PathBuf {
        self.source_dir().join("contrib")
    }

    /// Installed engine distribution (`--prefix`)
    pub fn dist_dir(&self) -> PathBuf {
        self.root.join(format!("pg-{}-dist", self.major_version()))
    }

    /// Storage area of the live server
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(format!("pg-{}-data", self.major_version()))
    }

    /// Server log written by `pg_ctl -l`
    pub fn server_log(&self) -> PathBuf {
        self.root.join("logfile")
    }

    /// An executable of the installed distribution
    pub fn bin(&self, tool: &str) -> PathBuf {
        self.dist_dir().join("bin").join(tool)
    }

    pub fn pg_config(&self) -> PathBuf {
        self.bin("pg_config")
    }

    /// Regression test runner installed with the PGXS support files
    pub fn pg_regress(&self) -> PathBuf {
        self.dist_dir()
            .join("lib/postgresql/pgxs/src/test/regress/pg_regress")
    }

    pub fn registry_dir(&self) -> PathBuf {
        self.root.join(&self.settings.directories.registry)
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join(&self.settings.directories.scripts)
    }

    pub fn expected_results_dir(&self) -> PathBuf {
        self.root.join(&self.settings.directories.expected_results)
    }

    /// Scratch directory extension sources are fetched into
    pub fn work_dir(&self) -> PathBuf {
        self.root.join(&self.settings.directories.work)
    }

    /// This run's output directory
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(format!("testing-output-{}", self.run_label))
    }

    /// Per-pair (or per-extension) output directory name
    pub fn pair_dir_name(first: &str, second: Option<&str>) -> String {
        match second {
            Some(second) => format!("{}_{}", first, second),
            None => first.to_string(),
        }
    }

    /// Advisory lock held for the duration of a run
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(".pgext.lock")
    }

    /// Report file written to the root
    pub fn report_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }
}
