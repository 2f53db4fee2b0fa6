//! Directive parsing for host command lists.
//!
//! Every entry of a host's command list is classified into one
//! [`Directive`]. Most entries are plain shell commands ([`Directive::Exec`]);
//! a handful of prefixes turn an entry into an automation step that is played
//! back into a live pseudo-terminal:
//!
//! | Entry            | Directive                    |
//! |------------------|------------------------------|
//! | `SEND:text`      | `Send("text")`               |
//! | `SENDPASS:id`    | `SendPass("id")`             |
//! | `WAIT:3`         | `Wait("3")`                  |
//! | `INTERACT`       | `Interact`                   |
//! | `INTERACTIVE`    | `Interact`                   |
//! | anything else    | `Exec(entry)`                |
//!
//! # Example
//!
//! ```
//! use sshhop::{Directive, Script};
//!
//! let commands = vec![
//!     "ssh admin@bastion".to_string(),
//!     "SENDPASS:bastion".to_string(),
//!     "INTERACT".to_string(),
//! ];
//! let script = Script::parse(&commands)?;
//!
//! assert!(script.is_interactive());
//! assert!(script.needs_credentials());
//! assert_eq!(script.directives()[1], Directive::SendPass("bastion".into()));
//! # Ok::<(), sshhop::CommandError>(())
//! ```

use crate::result::CommandError;
use std::fmt;
use std::time::Duration;

const SEND_PREFIX: &str = "SEND:";
const SEND_PASS_PREFIX: &str = "SENDPASS:";
const WAIT_PREFIX: &str = "WAIT:";

/// The kind of a [`Directive`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    /// A command to run, or to type into a live session.
    Exec,
    /// Literal text to type, followed by a newline.
    Send,
    /// A credential ID whose stored secret is typed, followed by a newline.
    SendPass,
    /// A pause, in whole seconds.
    Wait,
    /// Hand the keyboard to the user.
    Interact,
}

/// One classified entry of a command list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `entry`: run it, or type it into the session once one is live.
    Exec(String),
    /// `SEND:text`
    Send(String),
    /// `SENDPASS:id`. The payload is a credential ID, never a secret.
    SendPass(String),
    /// `WAIT:seconds`, kept raw; see [`Directive::wait_duration`].
    Wait(String),
    /// `INTERACT` / `INTERACTIVE`
    Interact,
}

impl Directive {
    /// Classify a single command-list entry.
    ///
    /// Prefixes are case-sensitive and checked in priority order, so an
    /// entry is never classified twice.
    pub fn parse(entry: &str) -> Self {
        if let Some(text) = entry.strip_prefix(SEND_PREFIX) {
            Directive::Send(text.to_string())
        } else if let Some(id) = entry.strip_prefix(SEND_PASS_PREFIX) {
            Directive::SendPass(id.to_string())
        } else if let Some(seconds) = entry.strip_prefix(WAIT_PREFIX) {
            Directive::Wait(seconds.to_string())
        } else if entry == "INTERACT" || entry == "INTERACTIVE" {
            Directive::Interact
        } else {
            Directive::Exec(entry.to_string())
        }
    }

    /// The directive's kind.
    pub fn kind(&self) -> DirectiveKind {
        match self {
            Directive::Exec(_) => DirectiveKind::Exec,
            Directive::Send(_) => DirectiveKind::Send,
            Directive::SendPass(_) => DirectiveKind::SendPass,
            Directive::Wait(_) => DirectiveKind::Wait,
            Directive::Interact => DirectiveKind::Interact,
        }
    }

    /// The directive's payload (`""` for `Interact`).
    pub fn value(&self) -> &str {
        match self {
            Directive::Exec(v) | Directive::Send(v) | Directive::SendPass(v) | Directive::Wait(v) => v,
            Directive::Interact => "",
        }
    }

    /// Whether this directive only makes sense inside a live PTY session.
    pub fn is_interactive(&self) -> bool {
        !matches!(self, Directive::Exec(_))
    }

    /// How long a `Wait` directive pauses.
    ///
    /// Leading whitespace and one optional `+` are skipped, then the leading
    /// run of decimal digits is read as seconds. Anything else (no digits, a minus sign, an overflowing
    /// number) means no pause at all. Non-`Wait` directives return zero.
    pub fn wait_duration(&self) -> Duration {
        match self {
            Directive::Wait(raw) => Duration::from_secs(parse_seconds(raw)),
            _ => Duration::ZERO,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Exec(cmd) => write!(f, "exec {cmd}"),
            Directive::Send(text) => write!(f, "send {text:?}"),
            Directive::SendPass(id) => write!(f, "send secret '{id}'"),
            Directive::Wait(_) => write!(f, "wait {}s", self.wait_duration().as_secs()),
            Directive::Interact => write!(f, "interact"),
        }
    }
}

fn parse_seconds(raw: &str) -> u64 {
    let trimmed = raw.trim_start();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits: String = unsigned
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

/// Classify every entry of a command list, preserving order.
pub fn parse_commands<S: AsRef<str>>(commands: &[S]) -> Vec<Directive> {
    commands.iter().map(|c| Directive::parse(c.as_ref())).collect()
}

/// An ordered, non-empty list of directives for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    directives: Vec<Directive>,
}

impl Script {
    /// Parse a host's command list.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Empty`] for an empty list.
    pub fn parse<S: AsRef<str>>(commands: &[S]) -> Result<Self, CommandError> {
        if commands.is_empty() {
            return Err(CommandError::Empty);
        }
        Ok(Self {
            directives: parse_commands(commands),
        })
    }

    /// All directives, in list order.
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// Whether any directive requires a live PTY session.
    pub fn is_interactive(&self) -> bool {
        self.directives.iter().any(Directive::is_interactive)
    }

    /// Whether any directive injects a stored secret.
    pub fn needs_credentials(&self) -> bool {
        self.directives
            .iter()
            .any(|d| d.kind() == DirectiveKind::SendPass)
    }

    /// Split off the seed command and the automation that follows it.
    ///
    /// The seed is the first `Exec` directive; directives before it are not
    /// used. Returns `None` when the script has no `Exec` directive at all.
    pub fn seed(&self) -> Option<(&str, &[Directive])> {
        let idx = self
            .directives
            .iter()
            .position(|d| d.kind() == DirectiveKind::Exec)?;
        Some((self.directives[idx].value(), &self.directives[idx + 1..]))
    }
}
