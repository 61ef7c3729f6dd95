//! Idempotent line patching for boot configuration files.
//!
//! The patch contract: the first line whose start matches the marker is
//! replaced with the replacement block (which may span multiple lines);
//! every other line is preserved verbatim in its original order. Because
//! the replacement does not itself match the marker, applying the same
//! patch twice is a no-op, and a file without the marker is left
//! byte-for-byte unchanged.

use camino::Utf8Path;
use strum::Display;

use crate::error::BotstrapError;
use crate::executor::CommandExecutor;
use crate::file_ops::install_file;
use crate::privilege::PrivilegeMethod;

/// Result of a patch application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PatchOutcome {
    /// The marker line was found and replaced.
    #[strum(serialize = "patched")]
    Patched,
    /// No line starts with the marker; the file was left untouched.
    #[strum(serialize = "no marker line")]
    NoMarker,
    /// The selected config file does not exist; nothing was created.
    #[strum(serialize = "missing file")]
    MissingFile,
}

/// Returns the patched content, or `None` when no line starts with the
/// marker (callers then leave the file untouched).
pub fn patched_content(original: &str, marker: &str, replacement: &str) -> Option<String> {
    let mut out = String::with_capacity(original.len() + replacement.len());
    let mut replaced = false;
    for line in original.split_inclusive('\n') {
        if !replaced && line.starts_with(marker) {
            out.push_str(replacement);
            if !replacement.ends_with('\n') {
                out.push('\n');
            }
            replaced = true;
        } else {
            out.push_str(line);
        }
    }
    replaced.then_some(out)
}

/// Applies a marker patch to the file at `path`.
///
/// Content is staged to a private temp file and moved into place under
/// the given privilege, so a failed move never leaves a partially written
/// target. A missing file is skipped, never created.
pub fn apply_patch(
    path: &Utf8Path,
    marker: &str,
    replacement: &str,
    privilege: Option<PrivilegeMethod>,
    executor: &dyn CommandExecutor,
) -> anyhow::Result<PatchOutcome> {
    if !path.exists() {
        return Ok(PatchOutcome::MissingFile);
    }

    let original =
        std::fs::read_to_string(path).map_err(|e| BotstrapError::io(path.as_str(), e))?;

    match patched_content(&original, marker, replacement) {
        Some(content) => {
            install_file(&content, path, 0o644, privilege, executor)?;
            tracing::info!("patched {}", path);
            Ok(PatchOutcome::Patched)
        }
        None => {
            tracing::debug!("no line in {} starts with `{}`", path, marker);
            Ok(PatchOutcome::NoMarker)
        }
    }
}
