//! Error types for sshhop

use crate::vault::StoreError;
use thiserror::Error;

/// Errors raised while validating a host's command list.
///
/// These are caller errors: the command list handed to the launcher did not
/// pass the minimal sanity checks, so nothing was executed.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    /// The command list was empty.
    #[error("no commands specified")]
    Empty,

    /// One entry of the command list was an empty string.
    #[error("empty command in command list (entry {index})")]
    EmptyEntry {
        /// Zero-based position of the empty entry.
        index: usize,
    },

    /// No entry mentions `ssh`.
    ///
    /// For a single command the command itself must contain `ssh`; for a
    /// list at least one entry must.
    #[error("at least one command must contain 'ssh'")]
    MissingSsh,
}

/// Errors from the non-interactive execution back ends.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// Replacing the current process image failed.
    ///
    /// Only returned when the replace call itself fails; a successful replace
    /// never returns.
    #[error("failed to replace process with shell: {0}")]
    Replace(std::io::Error),

    /// The shell could not be started as a child process.
    #[error("failed to start shell: {0}")]
    Spawn(std::io::Error),

    /// The child shell ran but exited unsuccessfully.
    #[error("command exited with status {}", code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
    Failed {
        /// Exit code, or `None` when the child was terminated by a signal.
        code: Option<i32>,
    },
}

/// Errors that abort an interactive session before or during setup.
///
/// Failures inside a single automation directive are *not* reported through
/// this type: they stop the automation but leave the session attached, and
/// are surfaced in [`SessionOutcome`](crate::SessionOutcome) instead.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The directive list contains no `Exec` entry to launch.
    #[error("no executable command found")]
    NoSeedCommand,

    /// Pseudo-terminal allocation or manipulation failed.
    #[error("PTY error: {0}")]
    Pty(String),

    /// The seed command could not be spawned under the PTY.
    #[error("failed to spawn seed command: {0}")]
    Spawn(String),

    /// The local terminal could not be switched to raw mode.
    #[error("failed to set raw mode: {0}")]
    TerminalMode(std::io::Error),

    /// The script injects stored secrets but no unlocked store was supplied.
    #[error("credential store required by SENDPASS is not loaded")]
    CredentialsRequired,

    /// The credential store could not be opened or unlocked.
    #[error("credential store: {0}")]
    Credentials(#[from] StoreError),

    /// I/O error while forwarding session bytes.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
