pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
mod file_ops;
pub mod interrupt;
pub mod patcher;
pub mod privilege;
pub mod probe;
pub mod report;
pub mod runner;
pub mod startup;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{FmtSubscriber, filter::LevelFilter};

use crate::executor::{CommandExecutor, CommandSpec};
use crate::report::ProvisioningReport;

pub use error::BotstrapError;

pub fn init_logging(log_level: cli::LogLevel) -> Result<()> {
    let filter = match log_level {
        cli::LogLevel::Trace => LevelFilter::TRACE,
        cli::LogLevel::Debug => LevelFilter::DEBUG,
        cli::LogLevel::Info => LevelFilter::INFO,
        cli::LogLevel::Warn => LevelFilter::WARN,
        cli::LogLevel::Error => LevelFilter::ERROR,
    };

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_max_level(filter).finish(),
    )
    .context("failed to set global default tracing subscriber")
}

/// Runs the full provisioning sequence: probe, command batches, boot
/// config patch, startup registration, report, reboot.
///
/// Individual step failures are recorded in the report and do not abort
/// the run; the only mid-run error is an operator interrupt. The host is
/// rebooted at the end regardless of recorded failures, so the report is
/// printed first.
pub fn run_apply(opts: &cli::ApplyArgs, executor: Arc<dyn CommandExecutor>) -> Result<()> {
    let profile = match &opts.file {
        Some(path) => config::load_profile(path)
            .with_context(|| format!("failed to load profile from {}", path))?,
        None => {
            info!("no profile given, using the built-in robot controller profile");
            config::Profile::default()
        }
    };
    profile.validate().context("profile validation failed")?;

    let env = probe::Environment::detect(&profile);
    let strategy = probe::InstallStrategy::probe(&env, &profile.installer, executor.as_ref());
    info!(
        "install strategy: {}",
        if strategy.use_isolated_env {
            "isolated environment"
        } else {
            "system-wide pip"
        }
    );

    let mut report = ProvisioningReport::new();

    for spec in &profile.batches {
        interrupt::check()?;
        let batch = runner::CommandBatch::render(spec, &env, &strategy);
        match runner::run_batch(&batch, executor.as_ref())? {
            runner::BatchOutcome::Succeeded { attempts } => {
                report.ok(&spec.name, format!("succeeded after {} attempt(s)", attempts));
            }
            runner::BatchOutcome::Failed {
                attempts,
                command,
                status,
            } => {
                report.failed(
                    &spec.name,
                    format!("failed after {} attempts at `{}`: {}", attempts, command, status),
                );
            }
        }
    }

    interrupt::check()?;
    apply_boot_config(&profile, &mut report, executor.as_ref());

    interrupt::check()?;
    register_startup(&profile, &env, &strategy, &mut report, executor.as_ref());

    interrupt::check()?;
    report.print();

    // The host reboots even after recorded failures; the report above is
    // the operator's only window into them.
    info!("provisioning finished, rebooting the host");
    let reboot = CommandSpec::new("reboot", Vec::new()).with_privilege(profile.privilege);
    match executor.execute(&reboot) {
        Ok(result) if result.success() => {}
        Ok(result) => warn!("reboot command failed: {}", result.status_display()),
        Err(e) => warn!("reboot command failed: {:#}", e),
    }

    Ok(())
}

/// Selects the authoritative boot config file and applies the marker
/// patch. Every failure mode is recoverable and lands in the report.
fn apply_boot_config(
    profile: &config::Profile,
    report: &mut ProvisioningReport,
    executor: &dyn CommandExecutor,
) {
    let path = probe::select_boot_config(&profile.boot_config);
    match patcher::apply_patch(
        &path,
        &profile.boot_config.marker,
        &profile.boot_config.replacement,
        profile.privilege,
        executor,
    ) {
        Ok(outcome @ patcher::PatchOutcome::Patched) => {
            report.ok("boot config", format!("{} {}", outcome, path));
        }
        Ok(patcher::PatchOutcome::NoMarker) => {
            report.ok("boot config", format!("{} has no marker line, already up to date", path));
        }
        Ok(outcome @ patcher::PatchOutcome::MissingFile) => {
            warn!("boot config {} does not exist, skipping patch", path);
            report.skipped("boot config", format!("{}: {}", path, outcome));
        }
        Err(e) => {
            warn!("failed to patch boot config {}: {:#}", path, e);
            report.failed("boot config", format!("{:#}", e));
        }
    }
}

/// Writes the startup script and registers it for execution at boot.
fn register_startup(
    profile: &config::Profile,
    env: &probe::Environment,
    strategy: &probe::InstallStrategy,
    report: &mut ProvisioningReport,
    executor: &dyn CommandExecutor,
) {
    let script = match startup::write_startup_script(env, &profile.startup, strategy, executor) {
        Ok(path) => path,
        Err(e) => {
            warn!("failed to write startup script: {:#}", e);
            report.failed("startup script", format!("{:#}", e));
            return;
        }
    };
    report.ok("startup script", format!("wrote {}", script));

    match startup::register(
        &script,
        env,
        &profile.startup,
        strategy,
        profile.privilege,
        executor,
    ) {
        Ok(mechanism) => {
            report.ok("startup registration", format!("registered via {}", mechanism));
        }
        Err(e) => {
            warn!("startup registration failed: {:#}", e);
            report.failed("startup registration", format!("{:#}", e));
        }
    }
}

pub fn run_validate(opts: &cli::ValidateArgs) -> Result<()> {
    let profile = config::load_profile(opts.file.as_path())?;
    profile.validate().context("profile validation failed")?;
    info!("validation successful:\n{:#?}", profile);
    Ok(())
}
