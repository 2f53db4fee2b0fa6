//! Execution back ends for compiled commands

use super::CompiledCommand;
use crate::result::LaunchError;
use std::io::Write;
use std::os::unix::process::CommandExt;
use std::process::Command;
use tracing::{debug, warn};

fn shell_command(shell: &str, command: &str) -> Command {
    let mut cmd = Command::new(shell);
    cmd.arg("-c").arg(command);
    cmd
}

/// Replace the current process with `shell -c command`.
///
/// Never returns on success. The returned error is the reason the replace
/// call itself failed.
pub fn exec_replace(shell: &str, command: &str) -> LaunchError {
    debug!(shell, "replacing process image");
    LaunchError::Replace(shell_command(shell, command).exec())
}

/// Run `shell -c command` as a child with inherited stdio and wait for it.
///
/// # Errors
///
/// [`LaunchError::Spawn`] if the shell cannot start, [`LaunchError::Failed`]
/// if it exits unsuccessfully.
pub fn run_subprocess(shell: &str, command: &str) -> Result<(), LaunchError> {
    debug!(shell, "running command as subprocess");
    let status = shell_command(shell, command)
        .status()
        .map_err(LaunchError::Spawn)?;
    if status.success() {
        Ok(())
    } else {
        Err(LaunchError::Failed {
            code: status.code(),
        })
    }
}

/// Print `Executing: <command>` to `out` when the compiled command was
/// rewritten from its input.
///
/// Best effort: a closed stdout must not stop the connection.
pub fn announce(compiled: &CompiledCommand, out: &mut impl Write) {
    if compiled.should_echo() {
        let _ = writeln!(out, "Executing: {}", compiled.command);
        let _ = out.flush();
    }
}

/// Run a compiled command: echo it if needed, replace the process, and fall
/// back to a subprocess if replacement fails.
///
/// Returns only when the replacement failed; the result is then the
/// subprocess's.
pub fn run_direct(
    shell: &str,
    compiled: &CompiledCommand,
    out: &mut impl Write,
) -> Result<(), LaunchError> {
    announce(compiled, out);

    let err = exec_replace(shell, &compiled.command);
    warn!("exec failed, running as subprocess: {err}");
    run_subprocess(shell, &compiled.command)
}
