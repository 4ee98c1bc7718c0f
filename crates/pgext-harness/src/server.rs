//! Server lifecycle management
//!
//! At most one engine instance is live at a time. Its lifecycle is strictly
//! sequenced:
//!
//! ```text
//! Absent -> init_storage -> Initialized -> write_config -> Configured
//!        -> start -> Running -> stop -> Stopped -> cleanup -> Absent
//! ```
//!
//! Calling an operation out of order is an [`Error::Lifecycle`]. Failures of
//! the engine tools themselves are only recorded in the terminal capture
//! file: a server that did not start shows up as failing tests.

use pgext_core::types::PreloadPolicy;
use pgext_core::{Error, HarnessConfig, Result};
use std::fmt;
use std::io::Write;
use tracing::{debug, info, warn};

use crate::provision::source_dir_for;
use crate::registry::ExtensionRegistry;
use crate::runner::{run_lenient, CommandRunner, CommandSpec, TerminalLog};
use crate::workspace::{remove_path, reset_dir};

/// Lifecycle state of the single server instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Absent,
    Initialized,
    Configured,
    Running,
    Stopped,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::Absent => "absent",
            ServerState::Initialized => "initialized",
            ServerState::Configured => "configured",
            ServerState::Running => "running",
            ServerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Drives init/configure/start/stop/cleanup of the engine instance
pub struct ServerManager<'a> {
    config: &'a HarnessConfig,
    registry: &'a ExtensionRegistry,
    runner: &'a dyn CommandRunner,
    state: ServerState,
}

impl<'a> ServerManager<'a> {
    pub fn new(
        config: &'a HarnessConfig,
        registry: &'a ExtensionRegistry,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            config,
            registry,
            runner,
            state: ServerState::Absent,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ServerState::Running
    }

    /// Create a fresh storage area with `initdb`
    pub async fn init_storage(&mut self, log: &TerminalLog) -> Result<()> {
        self.expect_state("initialize storage", &[ServerState::Absent])?;
        info!("Running initdb");

        let data_dir = self.config.data_dir();
        let spec = CommandSpec::new(self.config.bin("initdb"), &self.config.root)
            .arg("-D")
            .arg(data_dir.display().to_string());
        let code = run_lenient(self.runner, &spec, log).await;
        if code != 0 {
            warn!("initdb exited with code {}", code);
        }

        self.state = ServerState::Initialized;
        Ok(())
    }

    /// Append port, preload and custom settings for `closure` to `postgresql.conf`
    pub fn write_config<S: AsRef<str>>(&mut self, closure: &[S]) -> Result<()> {
        self.expect_state("write configuration", &[ServerState::Initialized])?;

        let rendered = render_config(self.config, self.registry, closure)?;
        let data_dir = self.config.data_dir();
        std::fs::create_dir_all(&data_dir)?;

        let conf_path = data_dir.join("postgresql.conf");
        debug!("Appending to {}:\n{}", conf_path.display(), rendered);
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&conf_path)?;
        file.write_all(rendered.as_bytes())?;

        self.state = ServerState::Configured;
        Ok(())
    }

    /// Start the server with `pg_ctl start`
    pub async fn start(&mut self, log: &TerminalLog) -> Result<()> {
        self.expect_state("start", &[ServerState::Configured])?;
        info!("Starting PostgreSQL");

        let code = run_lenient(self.runner, &self.pg_ctl("start"), log).await;
        if code != 0 {
            warn!("pg_ctl start exited with code {}", code);
        }

        self.state = ServerState::Running;
        Ok(())
    }

    /// Stop the server with `pg_ctl stop`
    pub async fn stop(&mut self, log: &TerminalLog) -> Result<()> {
        self.expect_state("stop", &[ServerState::Running])?;
        info!("Stopping PostgreSQL");

        let code = run_lenient(self.runner, &self.pg_ctl("stop"), log).await;
        if code != 0 {
            warn!("pg_ctl stop exited with code {}", code);
        }

        self.state = ServerState::Stopped;
        Ok(())
    }

    /// Stop the server if it is running; used when a cycle is abandoned
    pub async fn ensure_stopped(&mut self, log: &TerminalLog) {
        if self.is_running() {
            if let Err(e) = self.stop(log).await {
                warn!("{}", e);
            }
        }
    }

    /// Remove the storage area and server log, optionally emptying the
    /// scratch working directory
    pub fn cleanup(&mut self, delete_work_dir: bool) -> Result<()> {
        if self.is_running() {
            return Err(Error::lifecycle("clean up", self.state.to_string()));
        }

        remove_path(&self.config.data_dir());
        remove_path(&self.config.server_log());
        if delete_work_dir {
            reset_dir(&self.config.work_dir())?;
        }

        self.state = ServerState::Absent;
        Ok(())
    }

    fn pg_ctl(&self, action: &str) -> CommandSpec {
        CommandSpec::new(self.config.bin("pg_ctl"), &self.config.root).args([
            "-D".to_string(),
            self.config.data_dir().display().to_string(),
            "-l".to_string(),
            self.config.server_log().display().to_string(),
            action.to_string(),
        ])
    }

    fn expect_state(&self, operation: &str, allowed: &[ServerState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::lifecycle(operation, self.state.to_string()))
        }
    }
}

/// Ordered `shared_preload_libraries` entries for a closure
pub fn preload_libraries<S: AsRef<str>>(
    registry: &ExtensionRegistry,
    closure: &[S],
) -> Result<Vec<String>> {
    let mut libraries = Vec::new();
    for id in closure {
        let record = registry.require(id.as_ref())?;
        match &record.preload {
            PreloadPolicy::Skip => {}
            PreloadPolicy::Rename(name) => libraries.push(name.clone()),
            PreloadPolicy::First => libraries.insert(0, record.id.clone()),
            PreloadPolicy::Append => libraries.push(record.id.clone()),
        }
    }
    Ok(libraries)
}

/// Configuration lines appended to `postgresql.conf` for a closure
pub fn render_config<S: AsRef<str>>(
    config: &HarnessConfig,
    registry: &ExtensionRegistry,
    closure: &[S],
) -> Result<String> {
    let mut out = String::new();
    if config.is_custom_port() {
        out.push_str(&format!("port = {}\n", config.port()));
    }

    let libraries = preload_libraries(registry, closure)?;
    out.push_str(&format!(
        "shared_preload_libraries = '{}'\n",
        libraries.join(",")
    ));

    for id in closure {
        let record = registry.require(id.as_ref())?;
        let source_dir = source_dir_for(config, record);
        for line in record.expanded_config(&source_dir.display().to_string()) {
            out.push_str(&line);
            out.push('\n');
        }
    }
    Ok(out)
}
