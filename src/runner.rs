//! Ordered command-batch execution with bounded retry.
//!
//! A batch runs synchronously, command by command, via `/bin/sh -c`. The
//! first non-zero exit (or spawn error) abandons the attempt; the next
//! attempt restarts from the first command, since later commands may
//! depend on earlier ones. After [`MAX_BATCH_ATTEMPTS`] failed attempts
//! the failure is returned as data, never raised; only an operator
//! interrupt unwinds as an error.

use tracing::{debug, info, warn};

use crate::config::BatchSpec;
use crate::error::BotstrapError;
use crate::executor::{CommandExecutor, CommandSpec};
use crate::interrupt;
use crate::probe::{Environment, InstallStrategy};

/// Total attempts for a batch, counting the first.
pub const MAX_BATCH_ATTEMPTS: usize = 3;

/// A rendered, ready-to-run command batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBatch {
    pub name: String,
    pub commands: Vec<String>,
}

impl CommandBatch {
    /// Renders a profile batch by substituting the `{pip}`, `{home}` and
    /// `{project}` placeholders.
    pub fn render(spec: &BatchSpec, env: &Environment, strategy: &InstallStrategy) -> Self {
        let commands = spec
            .commands
            .iter()
            .map(|command| env.expand(command).replace("{pip}", &strategy.install_prefix))
            .collect();
        Self {
            name: spec.name.clone(),
            commands,
        }
    }
}

/// Final result of a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// All commands exited zero within the retry bound.
    Succeeded { attempts: usize },
    /// Every attempt failed; carries the last failing command.
    Failed {
        attempts: usize,
        command: String,
        status: String,
    },
}

/// Runs a batch with the whole-batch retry policy.
///
/// The only `Err` is [`BotstrapError::Interrupted`]; batch failure is
/// reported through [`BatchOutcome::Failed`].
pub fn run_batch(
    batch: &CommandBatch,
    executor: &dyn CommandExecutor,
) -> Result<BatchOutcome, BotstrapError> {
    let mut last_failure = None;
    for attempt in 1..=MAX_BATCH_ATTEMPTS {
        info!(
            "running batch '{}' (attempt {}/{}, {} command(s))",
            batch.name,
            attempt,
            MAX_BATCH_ATTEMPTS,
            batch.commands.len()
        );
        match run_attempt(batch, executor)? {
            None => return Ok(BatchOutcome::Succeeded { attempts: attempt }),
            Some((command, status)) => {
                warn!(
                    "batch '{}' attempt {}/{} failed at `{}`: {}",
                    batch.name, attempt, MAX_BATCH_ATTEMPTS, command, status
                );
                last_failure = Some((command, status));
            }
        }
    }

    let (command, status) = last_failure.expect("a failed batch records its last failure");
    Ok(BatchOutcome::Failed {
        attempts: MAX_BATCH_ATTEMPTS,
        command,
        status,
    })
}

/// Runs one pass over the batch. Returns the first failing command and
/// its status, or `None` when every command exited zero.
fn run_attempt(
    batch: &CommandBatch,
    executor: &dyn CommandExecutor,
) -> Result<Option<(String, String)>, BotstrapError> {
    for command in &batch.commands {
        interrupt::check()?;
        let spec = CommandSpec::shell(command.clone());
        let result = match executor.execute(&spec) {
            Ok(result) => result,
            // A spawn failure is recoverable, like a non-zero exit.
            Err(e) => return Ok(Some((command.clone(), format!("{:#}", e)))),
        };
        // The terminal delivers SIGINT to the whole process group; the
        // child has already aborted by the time the flag reads true.
        interrupt::check()?;
        if !result.success() {
            return Ok(Some((command.clone(), result.status_display())));
        }
        debug!("command succeeded: {}", command);
    }
    Ok(None)
}
