//! Lifecycle management for the notebook tool-server child process.
//!
//! The supervisor owns at most one child. Start, stop and liveness probes are
//! serialized through a single lock and a small state machine, so a second
//! `start()` while a child is alive is rejected instead of spawning a twin.

use std::{
    fmt,
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    process::{Child, Command},
    sync::Mutex,
};
use tracing::{error, info, warn};

pub const CHILD_PORT: u16 = 8001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("child process is already {0}")]
    AlreadyActive(LifecycleState),
    #[error("failed to prepare child config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize child config: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed waiting for child exit: {0}")]
    Wait(#[source] std::io::Error),
}

/// Liveness probe the tool bridge consults before talking to the child.
#[async_trait]
pub trait ChildMonitor: Send + Sync {
    async fn is_running(&self) -> bool;
}

/// Contents of the JSON config file handed to the child via `--config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildConfigFile {
    pub default_notebook_id: String,
    pub headless: bool,
    pub timeout: u64,
    pub debug: bool,
}

impl ChildConfigFile {
    pub fn with_notebook(notebook_id: impl Into<String>) -> Self {
        Self {
            default_notebook_id: notebook_id.into(),
            headless: true,
            timeout: 30,
            debug: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChildSettings {
    pub program: String,
    /// Arguments placed before the generated ones, e.g. `uvx notebooklm-mcp`.
    pub leading_args: Vec<String>,
    pub config_path: PathBuf,
    pub port: u16,
    pub default_notebook_id: String,
}

impl ChildSettings {
    /// Splits a whitespace separated command line into program and leading
    /// arguments.
    pub fn from_command_line(
        command_line: &str,
        config_path: PathBuf,
        port: u16,
        default_notebook_id: String,
    ) -> Self {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .unwrap_or_else(|| crate::config::DEFAULT_CHILD_PROGRAM.to_string());

        Self {
            program,
            leading_args: parts.collect(),
            config_path,
            port,
            default_notebook_id,
        }
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.extend([
            "--config".to_string(),
            self.config_path.display().to_string(),
            "server".to_string(),
            "--transport".to_string(),
            "http".to_string(),
            "--port".to_string(),
            self.port.to_string(),
        ]);
        args
    }

    pub fn endpoint(&self) -> String {
        format!("http://localhost:{}/mcp", self.port)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SupervisorStatus {
    pub state: LifecycleState,
    pub pid: Option<u32>,
    pub started_at_utc: Option<DateTime<Utc>>,
}

/// Writes a default child config when `path` does not exist yet.
/// Returns whether a new file was created.
pub async fn ensure_child_config(path: &Path, notebook_id: &str) -> Result<bool, SupervisorError> {
    let config_error = |source| SupervisorError::Config {
        path: path.to_path_buf(),
        source,
    };

    if tokio::fs::try_exists(path).await.map_err(config_error)? {
        return Ok(false);
    }

    info!(path = %path.display(), "child config not found, creating default");
    let contents = serde_json::to_string_pretty(&ChildConfigFile::with_notebook(notebook_id))?;
    tokio::fs::write(path, contents).await.map_err(config_error)?;
    Ok(true)
}

#[derive(Debug)]
struct SupervisorInner {
    state: LifecycleState,
    child: Option<Child>,
    started_at: Option<DateTime<Utc>>,
}

impl SupervisorInner {
    /// Drops the handle of a child that exited without being asked to.
    fn reap(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };

        match child.try_wait() {
            Ok(None) => {}
            Ok(Some(status)) => {
                warn!(code = status.code().unwrap_or(-1), "child process exited");
                self.clear();
            }
            Err(err) => {
                warn!(error = %err, "failed to poll child process");
                self.clear();
            }
        }
    }

    fn clear(&mut self) {
        self.child = None;
        self.started_at = None;
        self.state = LifecycleState::Stopped;
    }
}

#[derive(Debug)]
pub struct Supervisor {
    settings: ChildSettings,
    inner: Mutex<SupervisorInner>,
}

impl Supervisor {
    pub fn new(settings: ChildSettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(SupervisorInner {
                state: LifecycleState::Stopped,
                child: None,
                started_at: None,
            }),
        }
    }

    pub fn settings(&self) -> &ChildSettings {
        &self.settings
    }

    /// Spawns the child and returns its pid.
    pub async fn start(&self) -> Result<u32, SupervisorError> {
        let mut inner = self.inner.lock().await;
        inner.reap();
        if inner.state != LifecycleState::Stopped {
            warn!(state = %inner.state, "rejecting start of an active child");
            return Err(SupervisorError::AlreadyActive(inner.state));
        }

        inner.state = LifecycleState::Starting;
        match self.spawn_child().await {
            Ok(child) => {
                let pid = child.id().unwrap_or_default();
                inner.child = Some(child);
                inner.started_at = Some(Utc::now());
                inner.state = LifecycleState::Running;
                info!(pid, port = self.settings.port, "child process started");
                Ok(pid)
            }
            Err(err) => {
                inner.clear();
                error!(error = %err, "failed to start child process");
                Err(err)
            }
        }
    }

    async fn spawn_child(&self) -> Result<Child, SupervisorError> {
        ensure_child_config(&self.settings.config_path, &self.settings.default_notebook_id)
            .await?;

        info!(
            program = %self.settings.program,
            port = self.settings.port,
            "starting child process"
        );
        Command::new(&self.settings.program)
            .args(self.settings.args())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                program: self.settings.program.clone(),
                source,
            })
    }

    /// Terminates the child and waits for it. Returns the exit code, or
    /// `None` when there was no child to stop. A stop racing another stop
    /// returns `None` and leaves the state `Stopping` until the first one
    /// has reaped the child.
    pub async fn stop(&self) -> Result<Option<i32>, SupervisorError> {
        let mut child = {
            let mut inner = self.inner.lock().await;
            let Some(child) = inner.child.take() else {
                return Ok(None);
            };
            inner.state = LifecycleState::Stopping;
            child
        };

        info!(pid = child.id(), "stopping child process");
        send_terminate(&mut child);
        let waited = child.wait().await;

        self.inner.lock().await.clear();
        let status = waited.map_err(SupervisorError::Wait)?;
        let code = status.code().unwrap_or(-1);
        info!(code, "child process stopped");
        Ok(Some(code))
    }

    pub async fn is_running(&self) -> bool {
        let mut inner = self.inner.lock().await;
        inner.reap();
        inner.state == LifecycleState::Running && inner.child.is_some()
    }

    pub async fn status(&self) -> SupervisorStatus {
        let mut inner = self.inner.lock().await;
        inner.reap();
        SupervisorStatus {
            state: inner.state,
            pid: inner.child.as_ref().and_then(Child::id),
            started_at_utc: inner.started_at,
        }
    }
}

#[async_trait]
impl ChildMonitor for Supervisor {
    async fn is_running(&self) -> bool {
        Supervisor::is_running(self).await
    }
}

#[cfg(unix)]
fn send_terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    if let Err(err) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        warn!(pid, error = ?err, "SIGTERM failed, killing child");
        if let Err(err) = child.start_kill() {
            warn!(pid, error = %err, "kill failed");
        }
    }
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child) {
    if let Err(err) = child.start_kill() {
        warn!(error = %err, "kill failed");
    }
}
