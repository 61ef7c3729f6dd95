//! End-of-run provisioning report.
//!
//! Recoverable step failures are collected here and presented once, after
//! the last step, so the operator can audit the run before the host
//! reboots. Failures surface only in this report and in the log, never in
//! the process exit status.

/// Outcome of a single provisioning step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Ok(String),
    Failed(String),
    Skipped(String),
}

/// A named step with its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub name: String,
    pub status: StepStatus,
}

/// Ordered collection of step outcomes for one provisioning run.
#[derive(Debug, Default)]
pub struct ProvisioningReport {
    steps: Vec<StepReport>,
}

impl ProvisioningReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(&mut self, name: impl Into<String>, detail: impl Into<String>) {
        self.steps.push(StepReport {
            name: name.into(),
            status: StepStatus::Ok(detail.into()),
        });
    }

    pub fn failed(&mut self, name: impl Into<String>, reason: impl Into<String>) {
        self.steps.push(StepReport {
            name: name.into(),
            status: StepStatus::Failed(reason.into()),
        });
    }

    pub fn skipped(&mut self, name: impl Into<String>, reason: impl Into<String>) {
        self.steps.push(StepReport {
            name: name.into(),
            status: StepStatus::Skipped(reason.into()),
        });
    }

    pub fn has_failures(&self) -> bool {
        self.steps
            .iter()
            .any(|step| matches!(step.status, StepStatus::Failed(_)))
    }

    pub fn steps(&self) -> &[StepReport] {
        &self.steps
    }

    /// Renders the summary block printed to the operator.
    pub fn render(&self) -> String {
        let mut out = String::from("provisioning summary:\n");
        for step in &self.steps {
            let line = match &step.status {
                StepStatus::Ok(detail) if detail.is_empty() => {
                    format!("  ✓ {}\n", step.name)
                }
                StepStatus::Ok(detail) => format!("  ✓ {}: {}\n", step.name, detail),
                StepStatus::Failed(reason) => format!("  ✗ {}: {}\n", step.name, reason),
                StepStatus::Skipped(reason) => format!("  - {}: {} (skipped)\n", step.name, reason),
            };
            out.push_str(&line);
        }
        if self.has_failures() {
            out.push_str("some steps failed; review the log above before relying on the device\n");
        }
        out
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }
}
