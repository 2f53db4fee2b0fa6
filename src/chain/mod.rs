//! Command-chain compilation for the non-interactive path.
//!
//! A host's command list is reduced to one string for `$SHELL -c`. The first
//! entry mentioning `ssh` becomes the tunnel: everything after it is sent as
//! that SSH session's remote command, and the final hop `exec`s so the
//! intermediate shell does not linger.
//!
//! ```
//! use sshhop::ChainCompiler;
//!
//! let compiled = ChainCompiler::new().compile(&[
//!     "ssh jumphost@bastion",
//!     "sleep 2",
//!     "ssh user@internal-server",
//! ])?;
//! assert_eq!(
//!     compiled.command,
//!     "ssh -tt jumphost@bastion 'sleep 2; exec ssh user@internal-server'"
//! );
//! # Ok::<(), sshhop::CommandError>(())
//! ```

mod exec;

pub use exec::{announce, exec_replace, run_direct, run_subprocess};

use crate::result::CommandError;
use tracing::debug;

/// How a command list was turned into a single command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStrategy {
    /// One entry, passed through untouched.
    Single,
    /// No entry mentions `ssh`; entries are chained with `&&`.
    Sequential,
    /// The first SSH entry is the last entry; only that entry runs unless
    /// [`ChainCompiler::keep_pre_steps`] is set.
    FinalHop,
    /// Entries after the first SSH entry were embedded as its remote command.
    Tunneled,
}

/// A compiled command and the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledCommand {
    /// The shell-executable command.
    pub command: String,
    /// How `command` was produced.
    pub strategy: ChainStrategy,
}

impl CompiledCommand {
    /// Whether the command should be echoed before it runs.
    ///
    /// Only tunnelled chains are rewritten beyond recognition, so only they
    /// are echoed.
    pub fn should_echo(&self) -> bool {
        self.strategy == ChainStrategy::Tunneled
    }
}

/// Compiler for multi-step command lists.
#[derive(Debug, Clone, Default)]
pub struct ChainCompiler {
    keep_pre_steps: bool,
}

impl ChainCompiler {
    /// A compiler with default behaviour.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep steps that precede an SSH entry which is itself the last entry.
    ///
    /// By default such pre-steps are dropped and only the SSH entry runs.
    /// When enabled they are chained in front of it with ` && `, just as they
    /// would be in front of a tunnelled chain.
    pub fn keep_pre_steps(mut self, keep: bool) -> Self {
        self.keep_pre_steps = keep;
        self
    }

    /// Compile a command list into one shell command.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Empty`] for an empty list. No other validation
    /// happens here; see [`validate_commands`].
    pub fn compile<S: AsRef<str>>(&self, commands: &[S]) -> Result<CompiledCommand, CommandError> {
        let commands: Vec<&str> = commands.iter().map(AsRef::as_ref).collect();

        let compiled = match commands.as_slice() {
            [] => return Err(CommandError::Empty),
            [only] => CompiledCommand {
                command: only.to_string(),
                strategy: ChainStrategy::Single,
            },
            _ => match commands.iter().position(|c| c.contains("ssh")) {
                None => CompiledCommand {
                    command: commands.join(" && "),
                    strategy: ChainStrategy::Sequential,
                },
                Some(i) if i == commands.len() - 1 => {
                    let command = if self.keep_pre_steps {
                        commands.join(" && ")
                    } else {
                        commands[i].to_string()
                    };
                    CompiledCommand {
                        command,
                        strategy: ChainStrategy::FinalHop,
                    }
                }
                Some(i) => CompiledCommand {
                    command: tunnel(&commands[..i], commands[i], &commands[i + 1..]),
                    strategy: ChainStrategy::Tunneled,
                },
            },
        };

        debug!(strategy = ?compiled.strategy, "compiled command chain");
        Ok(compiled)
    }
}

/// Embed `remote` as the remote command of `ssh`, prefixed by `pre`.
fn tunnel(pre: &[&str], ssh: &str, remote: &[&str]) -> String {
    let last = remote.len() - 1;
    let script = remote
        .iter()
        .enumerate()
        .map(|(idx, cmd)| {
            if idx == last && cmd.contains("ssh") {
                format!("exec {cmd}")
            } else {
                cmd.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("; ");

    let mut command = format!("{} {}", force_tty(ssh), single_quote(&script));
    if !pre.is_empty() {
        command = format!("{} && {}", pre.join(" && "), command);
    }
    command
}

/// Insert `-tt` after the first `ssh ` unless a TTY flag is already present.
fn force_tty(ssh: &str) -> String {
    if ssh.contains(" -tt") || ssh.contains(" -t ") {
        ssh.to_string()
    } else {
        ssh.replacen("ssh ", "ssh -tt ", 1)
    }
}

/// Wrap `text` in single quotes so a POSIX shell reads it back verbatim.
pub(crate) fn single_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r#"'"'"'"#))
}

/// Minimal sanity check of a host's command list.
///
/// A single command must be non-empty and mention `ssh`. A longer list must
/// have no empty entries and at least one entry mentioning `ssh`.
pub fn validate_commands<S: AsRef<str>>(commands: &[S]) -> Result<(), CommandError> {
    if commands.is_empty() {
        return Err(CommandError::Empty);
    }
    if let Some(index) = commands.iter().position(|c| c.as_ref().is_empty()) {
        return Err(CommandError::EmptyEntry { index });
    }
    if !commands.iter().any(|c| c.as_ref().contains("ssh")) {
        return Err(CommandError::MissingSsh);
    }
    Ok(())
}
