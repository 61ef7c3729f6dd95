//! SIGINT latch for graceful interruption.
//!
//! The terminal delivers SIGINT to the whole foreground process group, so
//! the in-flight child command aborts on its own; the handler here only
//! latches a flag. The step runner and orchestrator poll the flag between
//! commands and stages, and unwind with [`BotstrapError::Interrupted`].
//! No cleanup is performed on interruption; partial state is left behind.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

use crate::error::BotstrapError;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_signum: nix::libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Installs the SIGINT handler. Call once at process start.
pub fn install() -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_sigint),
        SaFlags::empty(),
        SigSet::empty(),
    );
    unsafe { signal::sigaction(Signal::SIGINT, &action) }
        .context("failed to install SIGINT handler")?;
    Ok(())
}

/// Returns true once the operator has sent SIGINT.
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Propagates an operator interrupt as a typed error.
pub fn check() -> Result<(), BotstrapError> {
    if interrupted() {
        Err(BotstrapError::Interrupted)
    } else {
        Ok(())
    }
}
