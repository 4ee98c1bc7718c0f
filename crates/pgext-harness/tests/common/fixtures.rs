//! Working-root fixtures
//!
//! A [`TestRoot`] lays out a temporary harness root with the engine sources
//! already unpacked, so preparing a run never touches the network.

use pgext_core::HarnessConfig;
use pgext_harness::TerminalLog;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Fixed output directory suffix used by every test run
pub const RUN_LABEL: &str = "01-01-2026_00:00";

pub struct TestRoot {
    // Held for its Drop
    _dir: TempDir,
    pub config: HarnessConfig,
}

impl TestRoot {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = HarnessConfig::new(dir.path()).with_run_label(RUN_LABEL);
        std::fs::create_dir_all(config.contrib_dir()).unwrap();
        std::fs::create_dir_all(config.scripts_dir()).unwrap();
        std::fs::create_dir_all(config.expected_results_dir()).unwrap();
        std::fs::create_dir_all(config.output_dir()).unwrap();
        Self { _dir: dir, config }
    }

    /// Replace the configuration, keeping the root
    pub fn configure(mut self, f: impl FnOnce(HarnessConfig) -> HarnessConfig) -> Self {
        self.config = f(self.config);
        self
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Create a contrib module source folder
    pub fn contrib_sources(&self, folder: &str) -> PathBuf {
        let dir = self.config.contrib_dir().join(folder);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Create a source folder under the scratch working directory
    pub fn work_sources(&self, folder: &str) -> PathBuf {
        let dir = self.config.work_dir().join(folder);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Write `sql/<name>.sql` and `expected/<name>.out` for each test under `input_dir`
    pub fn regress_fixtures(&self, input_dir: &Path, tests: &[&str]) {
        std::fs::create_dir_all(input_dir.join("sql")).unwrap();
        std::fs::create_dir_all(input_dir.join("expected")).unwrap();
        for test in tests {
            std::fs::write(input_dir.join("sql").join(format!("{test}.sql")), "SELECT 1;\n")
                .unwrap();
            std::fs::write(
                input_dir.join("expected").join(format!("{test}.out")),
                "SELECT 1;\n",
            )
            .unwrap();
        }
    }

    /// Put a script into the script directory
    pub fn script(&self, name: &str, body: &str) {
        std::fs::write(self.config.scripts_dir().join(name), body).unwrap();
    }

    /// Put an expected-output fixture into the expected results directory
    pub fn expected_result(&self, name: &str, content: &str) {
        std::fs::write(self.config.expected_results_dir().join(name), content).unwrap();
    }

    /// Output directory of one pair, created
    pub fn pair_dir(&self, first: &str, second: Option<&str>) -> PathBuf {
        let dir = self
            .config
            .output_dir()
            .join(HarnessConfig::pair_dir_name(first, second));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Capture file inside `dir`
    pub fn terminal_log(&self, dir: &Path) -> TerminalLog {
        TerminalLog::create(dir.join("terminal.txt")).unwrap()
    }
}

impl Default for TestRoot {
    fn default() -> Self {
        Self::new()
    }
}
