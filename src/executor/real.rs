//! Real command executor implementation.
//!
//! [`RealCommandExecutor`] runs commands with `std::process::Command`.
//! Output is inherited from the parent by default so package-manager
//! progress reaches the operator's terminal unfiltered; specs with
//! `capture` set collect stdout instead.

use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use which::which;

use super::{CommandExecutor, CommandSpec, ExecutionResult};

/// Command executor that runs actual system commands.
///
/// When `dry_run` is true, commands are logged but not executed,
/// and `execute()` returns `Ok(ExecutionResult { status: None, .. })`.
pub struct RealCommandExecutor {
    pub dry_run: bool,
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        if self.dry_run {
            tracing::info!("dry run: {}", spec.display());
            return Ok(ExecutionResult {
                status: None,
                stdout: None,
            });
        }

        let (program, args) = match spec.privilege {
            Some(method) => {
                let mut wrapped = Vec::with_capacity(spec.args.len() + 1);
                wrapped.push(spec.command.clone());
                wrapped.extend(spec.args.iter().cloned());
                (method.command_name().to_string(), wrapped)
            }
            None => (spec.command.clone(), spec.args.clone()),
        };

        let program =
            which(&program).with_context(|| format!("command not found: {}", program))?;
        tracing::trace!("command found: {}", program.to_string_lossy());

        let mut command = Command::new(program);
        command.args(&args);

        if spec.capture {
            command.stderr(Stdio::inherit());
            let output = command
                .output()
                .with_context(|| format!("failed to run command: {}", spec.display()))?;
            tracing::trace!(
                "executed command: {}: success={}",
                spec.display(),
                output.status.success()
            );
            Ok(ExecutionResult {
                status: Some(output.status),
                stdout: Some(String::from_utf8_lossy(&output.stdout).into_owned()),
            })
        } else {
            let status = command
                .status()
                .with_context(|| format!("failed to run command: {}", spec.display()))?;
            tracing::trace!("executed command: {}: success={}", spec.display(), status.success());
            Ok(ExecutionResult {
                status: Some(status),
                stdout: None,
            })
        }
    }
}
