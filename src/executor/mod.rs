//! Command execution abstraction for botstrap.
//!
//! This module provides:
//! - [`CommandSpec`]: Specification for commands to execute
//! - [`ExecutionResult`]: Result of command execution
//! - [`CommandExecutor`]: Trait for command execution strategies
//! - [`RealCommandExecutor`]: Production implementation using `std::process::Command`

mod real;

use std::process::ExitStatus;

use anyhow::Result;

use crate::error::BotstrapError;
use crate::privilege::PrivilegeMethod;

pub use real::RealCommandExecutor;

/// Specification for a command to be executed.
///
/// Provisioning steps come in two shapes: opaque shell lines from the
/// profile's command batches (run via `/bin/sh -c`) and argv-style
/// invocations built by the patcher and startup registrar. Both are
/// represented here; [`CommandSpec::shell`] builds the former.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// The command to execute (e.g., "mv", "/bin/sh")
    pub command: String,
    /// Command arguments
    pub args: Vec<String>,
    /// Privilege escalation method to wrap the command
    pub privilege: Option<PrivilegeMethod>,
    /// Capture stdout instead of letting it reach the terminal
    pub capture: bool,
}

impl CommandSpec {
    /// Creates a new CommandSpec with command and args
    #[must_use]
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            privilege: None,
            capture: false,
        }
    }

    /// Creates a CommandSpec that runs an opaque shell line via `/bin/sh -c`.
    ///
    /// Batch commands are treated as opaque strings; only their exit status
    /// matters.
    #[must_use]
    pub fn shell(line: impl Into<String>) -> Self {
        Self::new("/bin/sh", vec!["-c".to_string(), line.into()])
    }

    /// Sets the privilege escalation method
    #[must_use]
    pub fn with_privilege(mut self, privilege: Option<PrivilegeMethod>) -> Self {
        self.privilege = privilege;
        self
    }

    /// Captures stdout instead of inheriting the terminal.
    ///
    /// Used for the crontab read-modify-write cycle; everything else
    /// streams straight to the operator's console.
    #[must_use]
    pub fn with_capture(mut self) -> Self {
        self.capture = true;
        self
    }

    /// Returns a single-line rendering of the command for logs and errors.
    ///
    /// Shell specs render as their original line; argv specs as the command
    /// followed by debug-quoted arguments.
    pub fn display(&self) -> String {
        let base = if self.command == "/bin/sh"
            && self.args.len() == 2
            && self.args[0] == "-c"
        {
            self.args[1].clone()
        } else {
            let mut parts = vec![self.command.clone()];
            parts.extend(self.args.iter().map(|a| format!("{:?}", a)));
            parts.join(" ")
        };
        match self.privilege {
            Some(method) => format!("{} {}", method.command_name(), base),
            None => base,
        }
    }
}

/// Result of command execution
#[derive(Debug)]
pub struct ExecutionResult {
    /// Exit status of the command (None in dry-run mode)
    pub status: Option<ExitStatus>,
    /// Captured stdout, present only when the spec asked for capture
    pub stdout: Option<String>,
}

impl ExecutionResult {
    /// Returns true if the command executed successfully.
    ///
    /// In dry-run mode (status is None), this always returns true.
    pub fn success(&self) -> bool {
        self.status.is_none_or(|s| s.success())
    }

    /// Returns the exit code if available
    pub fn code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }

    /// Human-readable status for diagnostics ("exit status: 1", or a
    /// placeholder in dry-run mode).
    pub fn status_display(&self) -> String {
        self.status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown (no status available)".to_string())
    }
}

/// Trait for command execution.
///
/// Implementations must be `Send + Sync` so the executor can be shared as
/// `Arc<dyn CommandExecutor>` across the provisioning stages.
pub trait CommandExecutor: Send + Sync {
    /// Executes a command with the given specification.
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult>;
}

/// Executes a spec and converts a non-zero exit status into a typed
/// [`BotstrapError::Execution`].
///
/// Used by steps whose failure should abort just that step (unit
/// installation, crontab load), not by the batch runner, which records
/// failures as data.
pub fn execute_checked(executor: &dyn CommandExecutor, spec: &CommandSpec) -> Result<ExecutionResult> {
    let result = executor.execute(spec)?;
    if !result.success() {
        return Err(BotstrapError::Execution {
            command: spec.display(),
            status: result.status_display(),
        }
        .into());
    }
    Ok(result)
}
