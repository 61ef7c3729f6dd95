//! Environment probing.
//!
//! Runs once at the start of a provisioning run and produces immutable
//! facts for every downstream step: who we are and where home is
//! ([`Environment`]), how packages get installed ([`InstallStrategy`]),
//! and which boot config file is authoritative ([`select_boot_config`]).
//! Probing never fails; a broken environment-tool install simply
//! downgrades the strategy to the system-wide fallback.

use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use tracing::{debug, info, warn};
use which::which;

use crate::config::{BootConfig, InstallerConfig, Profile};
use crate::executor::{CommandExecutor, CommandSpec};

/// Case-insensitive notice left in the legacy config once it has moved to
/// the firmware directory.
static MOVED_NOTICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)moved to").expect("redirect notice regex is valid"));

/// Facts about the current user and filesystem layout.
#[derive(Debug, Clone)]
pub struct Environment {
    pub user: String,
    pub home: Utf8PathBuf,
    pub project_dir: Utf8PathBuf,
}

impl Environment {
    /// Detects the current user, home and project directories.
    ///
    /// Never fails: missing information falls back to the platform
    /// defaults with a warning.
    pub fn detect(profile: &Profile) -> Self {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("LOGNAME"))
            .unwrap_or_else(|_| {
                warn!("neither USER nor LOGNAME is set, assuming user 'pi'");
                "pi".to_string()
            });

        let home = dirs::home_dir()
            .and_then(|p| Utf8PathBuf::from_path_buf(p).ok())
            .unwrap_or_else(|| {
                let fallback = Utf8PathBuf::from(format!("/home/{}", user));
                warn!("could not determine home directory, assuming {}", fallback);
                fallback
            });

        let project_dir = profile.project_dir.clone().unwrap_or_else(|| {
            std::env::current_dir()
                .ok()
                .and_then(|p| Utf8PathBuf::from_path_buf(p).ok())
                .unwrap_or_else(|| {
                    warn!("could not determine current directory, assuming {}", home);
                    home.clone()
                })
        });

        debug!("user: {}, home: {}, project: {}", user, home, project_dir);
        Self {
            user,
            home,
            project_dir,
        }
    }

    /// Substitutes the `{home}` and `{project}` placeholders.
    pub fn expand(&self, template: &str) -> String {
        template
            .replace("{home}", self.home.as_str())
            .replace("{project}", self.project_dir.as_str())
    }
}

/// How package-install commands are phrased for this run.
///
/// Decided once, immutable afterward. Every `{pip}` placeholder in a
/// command batch renders to [`install_prefix`](Self::install_prefix).
#[derive(Debug, Clone)]
pub struct InstallStrategy {
    pub use_isolated_env: bool,
    pub install_prefix: String,
    pub venv_path: Option<Utf8PathBuf>,
}

impl InstallStrategy {
    /// Strategy backed by a `uv`-managed virtual environment.
    ///
    /// The prefix carries `VIRTUAL_ENV=` explicitly so later shell
    /// commands need no inherited process environment.
    pub fn isolated(uv: &Utf8Path, venv: Utf8PathBuf) -> Self {
        Self {
            use_isolated_env: true,
            install_prefix: format!("VIRTUAL_ENV={} {} pip install", venv, uv),
            venv_path: Some(venv),
        }
    }

    /// System-wide fallback: plain pip with `--user`.
    pub fn system_wide() -> Self {
        Self {
            use_isolated_env: false,
            install_prefix: "pip3 install --user".to_string(),
            venv_path: None,
        }
    }

    /// Decides the install strategy for this run. Never fails.
    ///
    /// Looks for `uv` on PATH; if absent, runs the documented installer
    /// and, on failure, falls back to system-wide pip. With `uv`
    /// available, the virtual environment is created up front (an already
    /// existing one is fine).
    pub fn probe(
        env: &Environment,
        installer: &InstallerConfig,
        executor: &dyn CommandExecutor,
    ) -> Self {
        let uv = match which("uv") {
            Ok(path) => match Utf8PathBuf::from_path_buf(path) {
                Ok(path) => {
                    info!("found uv at {}", path);
                    Some(path)
                }
                Err(path) => {
                    warn!("uv path is not valid UTF-8: {}", path.display());
                    None
                }
            },
            Err(_) => install_uv(env, installer, executor),
        };

        match uv {
            Some(uv) => {
                let venv = env.home.join(&installer.venv_dir);
                info!("creating virtual environment at {}", venv);
                let create = CommandSpec::shell(format!("{} venv {}", uv, venv));
                match executor.execute(&create) {
                    Ok(result) if result.success() => {}
                    Ok(result) => warn!(
                        "creating virtual environment failed ({}), continuing: it may already exist",
                        result.status_display()
                    ),
                    Err(e) => warn!("creating virtual environment failed, continuing: {:#}", e),
                }
                Self::isolated(&uv, venv)
            }
            None => {
                info!("using pip with --user flag as fallback");
                Self::system_wide()
            }
        }
    }
}

/// Installs `uv` via its documented installer endpoint.
///
/// Returns the expected binary path on success, `None` on failure. The
/// installer drops the binary under `~/.cargo/bin`.
fn install_uv(
    env: &Environment,
    installer: &InstallerConfig,
    executor: &dyn CommandExecutor,
) -> Option<Utf8PathBuf> {
    info!("installing uv package manager...");
    let line = format!("curl -LsSf {} | sh", installer.uv_installer);
    match executor.execute(&CommandSpec::shell(line)) {
        Ok(result) if result.success() => Some(env.home.join(".cargo/bin/uv")),
        Ok(result) => {
            warn!(
                "error installing uv ({}), falling back to pip",
                result.status_display()
            );
            None
        }
        Err(e) => {
            warn!("error installing uv, falling back to pip: {:#}", e);
            None
        }
    }
}

/// Chooses the authoritative boot config path.
///
/// The legacy path wins unless it carries the "moved to" redirect notice
/// or does not exist, in which case the firmware-era path is
/// authoritative. The patcher skips a selected path that is missing; a
/// config file is never created from nothing.
pub fn select_boot_config(cfg: &BootConfig) -> Utf8PathBuf {
    if !cfg.legacy_path.exists() {
        return cfg.current_path.clone();
    }
    match std::fs::read_to_string(&cfg.legacy_path) {
        Ok(contents) if MOVED_NOTICE.is_match(&contents) => {
            info!("{} redirects to {}", cfg.legacy_path, cfg.current_path);
            cfg.current_path.clone()
        }
        Ok(_) => cfg.legacy_path.clone(),
        Err(e) => {
            warn!("failed to read {} ({}), treating it as authoritative", cfg.legacy_path, e);
            cfg.legacy_path.clone()
        }
    }
}
