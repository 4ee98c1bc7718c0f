//! External process execution
//!
//! Every program the harness invokes (engine build, server control, test
//! runners, version control) goes through [`CommandRunner`] as a program plus
//! argument vector. Output is either appended to the pair's terminal capture
//! file or captured for inspection.

use async_trait::async_trait;
use pgext_core::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// A program invocation: executable, arguments, working directory, extra environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Start a command running `program` inside `cwd`
    pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn envs<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env.extend(vars);
        self
    }

    /// Base name of the program (`pg_ctl`, `make`, ...)
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    /// Human-readable command line for capture files and logs
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Result of a captured invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    /// Exit code; -1 when terminated by a signal
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Append-only terminal capture file of one pair (or one extension)
#[derive(Debug)]
pub struct TerminalLog {
    path: PathBuf,
    file: File,
}

impl TerminalLog {
    /// Open (creating parent directories) a capture file in append mode
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append raw text
    pub fn append(&self, text: &str) -> Result<()> {
        (&self.file).write_all(text.as_bytes())?;
        Ok(())
    }

    /// Append a harness note on its own line
    pub fn note(&self, message: &str) {
        if let Err(e) = self.append(&format!("[pgext] {}\n", message)) {
            warn!("Failed to write to {}: {}", self.path.display(), e);
        }
    }

    /// stdout/stderr handles redirected into this file
    fn stdio(&self) -> Result<(Stdio, Stdio)> {
        Ok((
            Stdio::from(self.file.try_clone()?),
            Stdio::from(self.file.try_clone()?),
        ))
    }
}

/// Process spawning seam
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion with stdout and stderr appended to `log`; returns the exit code
    async fn run_logged(&self, spec: &CommandSpec, log: &TerminalLog) -> Result<i32>;

    /// Run to completion capturing stdout and stderr
    async fn run_captured(&self, spec: &CommandSpec) -> Result<CapturedOutput>;
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        cmd.current_dir(&spec.cwd);
        cmd.envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        cmd.stdin(Stdio::null());
        cmd
    }

    fn spawn_error(spec: &CommandSpec, source: std::io::Error) -> Error {
        Error::Spawn {
            program: spec.program.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run_logged(&self, spec: &CommandSpec, log: &TerminalLog) -> Result<i32> {
        debug!("Running: {} (in {})", spec.display(), spec.cwd.display());
        log.append(&format!("$ {}\n", spec.display()))?;

        let (stdout, stderr) = log.stdio()?;
        let status = Self::command(spec)
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .await
            .map_err(|e| Self::spawn_error(spec, e))?;

        Ok(status.code().unwrap_or(-1))
    }

    async fn run_captured(&self, spec: &CommandSpec) -> Result<CapturedOutput> {
        debug!("Running: {} (in {})", spec.display(), spec.cwd.display());

        let output = Self::command(spec)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Self::spawn_error(spec, e))?;

        Ok(CapturedOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run a logged command whose failure is not fatal
///
/// A program that cannot be spawned is noted in the capture file and
/// reported as exit code -1, like any other failed invocation.
pub async fn run_lenient(runner: &dyn CommandRunner, spec: &CommandSpec, log: &TerminalLog) -> i32 {
    match runner.run_logged(spec, log).await {
        Ok(code) => code,
        Err(e) => {
            warn!("{}", e);
            log.note(&e.to_string());
            -1
        }
    }
}
