//! Process delegate
//!
//! Every interaction with the host goes through here: the service manager
//! for unit status and control, and the `rds` tool for backups. Commands are
//! executed by a [`CommandRunner`], so the delegate can be driven by canned
//! results in tests.

mod runner;

pub use runner::SystemRunner;

use crate::config::CommandConfig;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Bound for `is-active` probes
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound for start/stop/restart
pub const CONTROL_TIMEOUT: Duration = Duration::from_secs(30);

/// Bound for listing backups
pub const BACKUP_LIST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bound for taking a backup
pub const BACKUP_TIMEOUT: Duration = Duration::from_secs(300);

/// Bound for restoring a backup
pub const RESTORE_TIMEOUT: Duration = Duration::from_secs(600);

/// Status reported when the probe itself could not run
pub const STATUS_UNKNOWN: &str = "unknown";

/// Status reported when the probe printed nothing
pub const STATUS_INACTIVE: &str = "inactive";

/// A single external command with its wall-clock bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to execute
    pub program: String,
    /// Arguments, passed verbatim (no shell)
    pub args: Vec<String>,
    /// Hard wall-clock limit
    pub timeout: Duration,
}

impl Invocation {
    /// Create a new invocation
    pub fn new<I, S>(program: impl Into<String>, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout,
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a command that ran to completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when terminated by a signal
    pub exit_code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status 0
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Reasons a command did not run to completion
#[derive(Debug, Error)]
pub enum RunError {
    /// The program could not be started
    #[error("failed to execute {program}: {source}")]
    Spawn {
        /// Program name
        program: String,
        /// Underlying error
        source: io::Error,
    },

    /// The command exceeded its bound and was killed
    #[error("`{command}` timed out after {}s", timeout.as_secs())]
    TimedOut {
        /// Rendered command line
        command: String,
        /// The bound that was exceeded
        timeout: Duration,
    },

    /// Waiting on or reading from the child failed
    #[error("I/O error while running command: {0}")]
    Io(#[from] io::Error),
}

/// Capability to execute external commands
pub trait CommandRunner: Send + Sync {
    /// Run `invocation` to completion or until its timeout elapses.
    ///
    /// A non-zero exit is not an error at this level.
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunError>;
}

/// Delegate failures surfaced to the router
#[derive(Debug, Error)]
pub enum DelegateError {
    /// The command ran but exited non-zero
    #[error("`{command}` exited with status {}{}", display_code(*code), display_stderr(stderr))]
    CommandFailed {
        /// Rendered command line
        command: String,
        /// Exit code, if any
        code: Option<i32>,
        /// Trimmed standard error
        stderr: String,
    },

    /// The command could not be executed or did not finish in time
    #[error("{0}")]
    Execution(String),
}

impl From<RunError> for DelegateError {
    fn from(err: RunError) -> Self {
        DelegateError::Execution(err.to_string())
    }
}

fn display_code(code: Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string())
}

fn display_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr)
    }
}

/// Service-manager verbs accepted for an engine unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitAction {
    /// `systemctl start`
    Start,
    /// `systemctl stop`
    Stop,
    /// `systemctl restart`
    Restart,
}

impl UnitAction {
    /// Verb as passed to the service manager
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }
}

impl fmt::Display for UnitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit name managed for an engine
pub fn unit_name(engine: &str) -> String {
    format!("rds-{}.service", engine)
}

/// Split line-oriented tool output into trimmed, non-empty entries
pub fn parse_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Shells out to the service manager and backup tool
#[derive(Clone)]
pub struct ProcessDelegate {
    runner: Arc<dyn CommandRunner>,
    commands: CommandConfig,
}

impl ProcessDelegate {
    /// Create a delegate over `runner`
    pub fn new(runner: Arc<dyn CommandRunner>, commands: CommandConfig) -> Self {
        Self { runner, commands }
    }

    /// Create a delegate that runs real processes
    pub fn system(commands: CommandConfig) -> Self {
        Self::new(Arc::new(SystemRunner::new()), commands)
    }

    /// Query whether the engine's unit is active.
    ///
    /// Never fails: a probe that could not run reports [`STATUS_UNKNOWN`].
    pub fn probe_status(&self, engine: &str) -> String {
        let invocation = Invocation::new(
            &self.commands.systemctl,
            ["is-active".to_string(), unit_name(engine)],
            STATUS_TIMEOUT,
        );

        // is-active exits non-zero for inactive units; only stdout matters
        match self.runner.run(&invocation) {
            Ok(output) => {
                let status = output.stdout.trim();
                if status.is_empty() {
                    STATUS_INACTIVE.to_string()
                } else {
                    status.to_string()
                }
            }
            Err(e) => {
                warn!("Status probe for '{}' failed: {}", engine, e);
                STATUS_UNKNOWN.to_string()
            }
        }
    }

    /// Start, stop or restart the engine's unit
    pub fn control_unit(&self, engine: &str, action: UnitAction) -> Result<(), DelegateError> {
        let invocation = Invocation::new(
            &self.commands.systemctl,
            [action.as_str().to_string(), unit_name(engine)],
            CONTROL_TIMEOUT,
        );
        self.run_checked(&invocation).map(|_| ())
    }

    /// List backup identifiers for an engine, in tool order
    pub fn list_backups(&self, engine: &str) -> Result<Vec<String>, DelegateError> {
        let invocation = Invocation::new(
            &self.commands.backup_tool,
            ["backup", "list", engine],
            BACKUP_LIST_TIMEOUT,
        );
        let output = self.run_checked(&invocation)?;
        Ok(parse_lines(&output.stdout))
    }

    /// Take a new backup of an engine
    pub fn trigger_backup(&self, engine: &str) -> Result<(), DelegateError> {
        let invocation = Invocation::new(
            &self.commands.backup_tool,
            ["backup", engine],
            BACKUP_TIMEOUT,
        );
        self.run_checked(&invocation).map(|_| ())
    }

    /// Restore an engine from the backup `backup_id`
    pub fn restore_backup(&self, engine: &str, backup_id: &str) -> Result<(), DelegateError> {
        let invocation = Invocation::new(
            &self.commands.backup_tool,
            ["restore", engine, backup_id],
            RESTORE_TIMEOUT,
        );
        self.run_checked(&invocation).map(|_| ())
    }

    fn run_checked(&self, invocation: &Invocation) -> Result<CommandOutput, DelegateError> {
        debug!(command = %invocation, timeout_secs = invocation.timeout.as_secs(), "Running command");

        let output = self.runner.run(invocation)?;
        if output.success() {
            return Ok(output);
        }

        let stderr = output.stderr.trim().to_string();
        warn!(
            command = %invocation,
            code = ?output.exit_code,
            %stderr,
            "Command exited unsuccessfully"
        );
        Err(DelegateError::CommandFailed {
            command: invocation.to_string(),
            code: output.exit_code,
            stderr,
        })
    }
}
