//! Startup script generation and boot-time registration.
//!
//! The registrar writes an executable launch script into the home
//! directory, then registers it for execution at boot: a systemd unit is
//! the primary mechanism, and the user's crontab (`@reboot`) is the
//! fallback when any part of the systemd sequence fails. Exactly one
//! mechanism is left authoritative; the fallback is never attempted after
//! a successful primary registration.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use strum::Display;
use tracing::{info, warn};

use crate::config::StartupConfig;
use crate::executor::{CommandExecutor, CommandSpec, execute_checked};
use crate::file_ops::{install_file, stage_file};
use crate::privilege::PrivilegeMethod;
use crate::probe::{Environment, InstallStrategy};

const SYSTEMD_UNIT_DIR: &str = "/etc/systemd/system";
const DEFAULT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Which boot-time mechanism ended up authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum StartupMechanism {
    Systemd,
    Crontab,
}

/// Builds the startup script body: shebang, environment activation when an
/// isolated environment is in use, and the server invocation.
pub fn startup_script_contents(strategy: &InstallStrategy, server_entry: &str) -> String {
    match &strategy.venv_path {
        Some(venv) => format!(
            "#!/bin/sh\n. {}/bin/activate && python3 {}\n",
            venv, server_entry
        ),
        None => format!("#!/bin/sh\npython3 {}\n", server_entry),
    }
}

/// Writes the startup script into the home directory and marks it
/// executable (0755; owner-writable only).
pub fn write_startup_script(
    env: &Environment,
    cfg: &StartupConfig,
    strategy: &InstallStrategy,
    executor: &dyn CommandExecutor,
) -> Result<Utf8PathBuf> {
    let script_path = env.home.join(&cfg.script_name);
    let server_entry = env.expand(&cfg.server_entry);
    let contents = startup_script_contents(strategy, &server_entry);

    // The script lives in the caller's home; the move needs no privilege.
    install_file(&contents, &script_path, 0o755, None, executor)
        .with_context(|| format!("failed to install startup script {}", script_path))?;

    info!("wrote startup script {}", script_path);
    Ok(script_path)
}

/// Builds the systemd unit that supervises the startup script.
pub fn unit_file_contents(
    script: &Utf8Path,
    env: &Environment,
    strategy: &InstallStrategy,
) -> String {
    let path_env = match &strategy.venv_path {
        Some(venv) => format!("{}/bin:{}", venv, DEFAULT_PATH),
        None => DEFAULT_PATH.to_string(),
    };
    format!(
        "[Unit]\n\
        Description=Robot controller web server\n\
        After=network.target\n\
        \n\
        [Service]\n\
        User={user}\n\
        Group={user}\n\
        WorkingDirectory={home}\n\
        Environment=PATH={path_env}\n\
        ExecStart={script}\n\
        Restart=always\n\
        RestartSec=5\n\
        \n\
        [Install]\n\
        WantedBy=multi-user.target\n",
        user = env.user,
        home = env.home,
        path_env = path_env,
        script = script,
    )
}

/// The `@reboot` crontab line for the startup script.
pub fn crontab_entry(script: &Utf8Path) -> String {
    format!("@reboot {}", script)
}

/// Appends the entry to the existing table, preserving every pre-existing
/// line. Returns `None` when the exact entry is already present.
pub fn merged_crontab(existing: &str, entry: &str) -> Option<String> {
    if existing.lines().any(|line| line.trim() == entry) {
        return None;
    }
    let mut table = existing.to_string();
    if !table.is_empty() && !table.ends_with('\n') {
        table.push('\n');
    }
    table.push_str(entry);
    table.push('\n');
    Some(table)
}

/// Registers the startup script for execution at boot.
///
/// Primary: systemd unit installation. Fallback, only when the primary
/// fails: an `@reboot` crontab entry. Either way at most one mechanism is
/// left authoritative.
pub fn register(
    script: &Utf8Path,
    env: &Environment,
    cfg: &StartupConfig,
    strategy: &InstallStrategy,
    privilege: Option<PrivilegeMethod>,
    executor: &dyn CommandExecutor,
) -> Result<StartupMechanism> {
    match register_systemd(script, env, cfg, strategy, privilege, executor) {
        Ok(()) => Ok(StartupMechanism::Systemd),
        Err(e) => {
            warn!("systemd registration failed, falling back to crontab: {:#}", e);
            register_crontab(script, executor).context("crontab registration failed")?;
            Ok(StartupMechanism::Crontab)
        }
    }
}

/// Installs, reloads and enables the systemd unit. Any failure in the
/// sequence fails the whole primary path.
fn register_systemd(
    script: &Utf8Path,
    env: &Environment,
    cfg: &StartupConfig,
    strategy: &InstallStrategy,
    privilege: Option<PrivilegeMethod>,
    executor: &dyn CommandExecutor,
) -> Result<()> {
    let unit_name = format!("{}.service", cfg.service_name);
    let unit_path = Utf8PathBuf::from(SYSTEMD_UNIT_DIR).join(&unit_name);
    let contents = unit_file_contents(script, env, strategy);

    install_file(&contents, &unit_path, 0o644, privilege, executor)
        .with_context(|| format!("failed to install unit file {}", unit_path))?;

    execute_checked(
        executor,
        &CommandSpec::new("systemctl", vec!["daemon-reload".to_string()])
            .with_privilege(privilege),
    )
    .context("failed to reload the systemd unit cache")?;

    execute_checked(
        executor,
        &CommandSpec::new("systemctl", vec!["enable".to_string(), unit_name.clone()])
            .with_privilege(privilege),
    )
    .with_context(|| format!("failed to enable unit {}", unit_name))?;

    info!("registered systemd unit {}", unit_name);
    Ok(())
}

/// Appends an `@reboot` entry to the user's crontab via the standard
/// read-modify-write cycle. A missing table reads as empty.
fn register_crontab(script: &Utf8Path, executor: &dyn CommandExecutor) -> Result<()> {
    let listing = executor
        .execute(&CommandSpec::new("crontab", vec!["-l".to_string()]).with_capture())
        .context("failed to read the current crontab")?;
    // `crontab -l` exits non-zero when the user has no table yet.
    let existing = if listing.success() {
        listing.stdout.unwrap_or_default()
    } else {
        String::new()
    };

    let entry = crontab_entry(script);
    let Some(table) = merged_crontab(&existing, &entry) else {
        info!("crontab already contains `{}`", entry);
        return Ok(());
    };

    let (staged, _guard) = stage_file(&table)?;
    execute_checked(
        executor,
        &CommandSpec::new("crontab", vec![staged.to_string()]),
    )
    .context("failed to load the updated crontab")?;

    info!("registered crontab entry `{}`", entry);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_crontab_preserves_existing_lines() {
        let merged = merged_crontab("0 4 * * * /usr/bin/backup\n", "@reboot /home/pi/startup.sh")
            .unwrap();
        assert_eq!(merged, "0 4 * * * /usr/bin/backup\n@reboot /home/pi/startup.sh\n");
    }

    #[test]
    fn merged_crontab_skips_duplicate_entry() {
        let existing = "@reboot /home/pi/startup.sh\n";
        assert!(merged_crontab(existing, "@reboot /home/pi/startup.sh").is_none());
    }

    #[test]
    fn merged_crontab_adds_missing_trailing_newline() {
        let merged = merged_crontab("MAILTO=\"\"", "@reboot /home/pi/startup.sh").unwrap();
        assert_eq!(merged, "MAILTO=\"\"\n@reboot /home/pi/startup.sh\n");
    }
}
