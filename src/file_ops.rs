//! Staged file installation.
//!
//! System files (the boot config, systemd units) are never written in
//! place: content goes to a private staging file first and is then moved
//! over the target under the configured privilege method. A failed move
//! leaves the target untouched, and the staging file is removed either
//! way.

use std::fs;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};

use crate::executor::{CommandExecutor, CommandSpec, execute_checked};
use crate::privilege::PrivilegeMethod;

/// RAII guard to ensure staging-file cleanup even on error.
pub(crate) struct TempFileGuard {
    path: Utf8PathBuf,
}

impl TempFileGuard {
    pub(crate) fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("cleaned up staging file: {}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("staging file already moved into place: {}", self.path);
            }
            Err(e) => {
                tracing::error!("failed to cleanup staging file {}: {}", self.path, e);
            }
        }
    }
}

/// Sets Unix file permissions on the given path.
pub(crate) fn set_file_mode(path: &Utf8Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)
        .with_context(|| format!("failed to read metadata for {}", path))?
        .permissions();
    perms.set_mode(mode);
    fs::set_permissions(path, perms)
        .with_context(|| format!("failed to set permissions on {}", path))?;
    Ok(())
}

/// Writes `content` to a uniquely named staging file in the system temp
/// directory. The returned guard removes it when dropped.
pub(crate) fn stage_file(content: &str) -> Result<(Utf8PathBuf, TempFileGuard)> {
    let dir = Utf8PathBuf::from_path_buf(std::env::temp_dir())
        .unwrap_or_else(|_| Utf8PathBuf::from("/tmp"));
    let staged = dir.join(format!("stage-{}.tmp", uuid::Uuid::new_v4()));
    fs::write(&staged, content)
        .with_context(|| format!("failed to write staging file {}", staged))?;
    let guard = TempFileGuard::new(staged.clone());
    Ok((staged, guard))
}

/// Stages `content` and moves it over `target` with the given mode.
pub(crate) fn install_file(
    content: &str,
    target: &Utf8Path,
    mode: u32,
    privilege: Option<PrivilegeMethod>,
    executor: &dyn CommandExecutor,
) -> Result<()> {
    let (staged, _guard) = stage_file(content)?;
    set_file_mode(&staged, mode)?;

    let spec = CommandSpec::new("mv", vec![staged.to_string(), target.to_string()])
        .with_privilege(privilege);
    execute_checked(executor, &spec)
        .with_context(|| format!("failed to move staged file into place: {}", target))?;
    Ok(())
}
