use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::sync::Mutex;

use anyhow::Result;
use botstrap::executor::{CommandExecutor, CommandSpec, ExecutionResult};
use botstrap::probe::Environment;
use camino::Utf8PathBuf;

/// Scripted command executor for tests.
///
/// Records the display form of every command it is asked to run and fails
/// the ones matching the programmed patterns (substring match). Nothing is
/// actually executed.
#[allow(dead_code)]
#[derive(Default)]
pub struct ScriptedExecutor {
    fail_always: Vec<String>,
    fail_times: Mutex<HashMap<String, usize>>,
    stdout_for: Vec<(String, String)>,
    log: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands whose display contains `pattern` always fail.
    pub fn fail_always(mut self, pattern: impl Into<String>) -> Self {
        self.fail_always.push(pattern.into());
        self
    }

    /// Commands whose display contains `pattern` fail the first `times`
    /// times they are run, then succeed.
    pub fn fail_times(self, pattern: impl Into<String>, times: usize) -> Self {
        self.fail_times.lock().unwrap().insert(pattern.into(), times);
        self
    }

    /// Captured commands whose display contains `pattern` produce `stdout`.
    pub fn with_stdout(mut self, pattern: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.stdout_for.push((pattern.into(), stdout.into()));
        self
    }

    /// Display forms of every executed command, in order.
    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Number of executed commands whose display contains `pattern`.
    pub fn count_matching(&self, pattern: &str) -> usize {
        self.commands().iter().filter(|c| c.contains(pattern)).count()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        let display = spec.display();
        self.log.lock().unwrap().push(display.clone());

        let mut fail = self.fail_always.iter().any(|p| display.contains(p.as_str()));
        if !fail {
            let mut counts = self.fail_times.lock().unwrap();
            for (pattern, remaining) in counts.iter_mut() {
                if display.contains(pattern.as_str()) && *remaining > 0 {
                    *remaining -= 1;
                    fail = true;
                    break;
                }
            }
        }

        let status = if fail {
            ExitStatus::from_raw(1 << 8)
        } else {
            ExitStatus::from_raw(0)
        };
        let stdout = spec.capture.then(|| {
            self.stdout_for
                .iter()
                .find(|(p, _)| display.contains(p.as_str()))
                .map(|(_, s)| s.clone())
                .unwrap_or_default()
        });
        Ok(ExecutionResult {
            status: Some(status),
            stdout,
        })
    }
}

/// Test helper to build an Environment rooted in a temp directory.
#[allow(dead_code)]
pub fn make_environment(home: impl Into<Utf8PathBuf>) -> Environment {
    let home = home.into();
    let project_dir = home.join("robot");
    Environment {
        user: "pi".to_string(),
        home,
        project_dir,
    }
}

/// Converts a std path into a Utf8PathBuf, panicking on non-UTF-8.
#[allow(dead_code)]
pub fn utf8(path: &std::path::Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).expect("path should be valid UTF-8")
}
