//! Session builder for configuration

use crate::config;
use crate::directive::Script;
use crate::result::SessionError;
use crate::session::{Session, Settings};
use crate::terminal;
use crate::vault::CredentialStore;
use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Delay before the first directive is replayed (in milliseconds)
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 500;

/// Pause after every line written by automation (in milliseconds)
pub const DEFAULT_SEND_PAUSE_MS: u64 = 100;

/// PTY rows used when the controlling terminal size is unknown
pub const DEFAULT_PTY_ROWS: u16 = 24;

/// PTY columns used when the controlling terminal size is unknown
pub const DEFAULT_PTY_COLS: u16 = 80;

/// Builder for configuring and spawning interactive sessions.
///
/// # Defaults
///
/// - Settle delay: 500 ms
/// - Pause after each automated line: 100 ms
/// - PTY size: the controlling terminal's size, else 24 rows × 80 columns
/// - Shell: `$SHELL`, else `/bin/bash`
/// - Raw mode and resize forwarding: enabled
/// - Credential store: none
///
/// # Examples
///
/// ```no_run
/// use sshhop::{Script, Session};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let script = Script::parse(&["ssh admin@bastion", "WAIT:2", "SEND:uptime", "INTERACT"])?;
/// let _outcome = Session::builder()
///     .settle_delay(Duration::from_secs(1))
///     .shell("/bin/sh")
///     .spawn(&script)?
///     .run()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    settle_delay: Duration,
    send_pause: Duration,
    pty_size: Option<PtySize>,
    shell: String,
    raw_mode: bool,
    forward_resize: bool,
    credentials: Option<Arc<CredentialStore>>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    /// Create a new session builder with default configuration.
    ///
    /// See the [`SessionBuilder`] documentation for default values.
    pub fn new() -> Self {
        Self {
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
            send_pause: Duration::from_millis(DEFAULT_SEND_PAUSE_MS),
            pty_size: None,
            shell: config::login_shell(),
            raw_mode: true,
            forward_resize: true,
            credentials: None,
        }
    }

    /// Set how long to let the seed command start before automation begins.
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the pause after each line written by `SEND`, `SENDPASS` or a
    /// trailing command.
    pub fn send_pause(mut self, pause: Duration) -> Self {
        self.send_pause = pause;
        self
    }

    /// Set a fixed PTY size instead of copying the controlling terminal's.
    ///
    /// # Arguments
    ///
    /// * `rows` - Number of rows
    /// * `cols` - Number of columns
    pub fn pty_size(mut self, rows: u16, cols: u16) -> Self {
        self.pty_size = Some(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        });
        self
    }

    /// Set the shell used to run the seed command (`<shell> -c <seed>`).
    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Enable or disable switching the local terminal to raw mode.
    ///
    /// Disable when stdin is not a terminal, e.g. in tests.
    pub fn raw_mode(mut self, enabled: bool) -> Self {
        self.raw_mode = enabled;
        self
    }

    /// Enable or disable forwarding `SIGWINCH` size changes to the PTY.
    pub fn forward_resize(mut self, enabled: bool) -> Self {
        self.forward_resize = enabled;
        self
    }

    /// Provide an unlocked credential store for `SENDPASS` directives.
    pub fn credentials(mut self, store: Arc<CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    /// Launch the script's seed command under a new PTY.
    ///
    /// The seed is the first `Exec` directive; everything after it becomes
    /// the automation script and everything before it is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The script has no `Exec` directive
    /// - The script uses `SENDPASS` but no credential store was provided
    /// - The PTY cannot be created
    /// - The shell cannot be spawned
    pub fn spawn(self, script: &Script) -> Result<Session, SessionError> {
        let (seed, steps) = script.seed().ok_or(SessionError::NoSeedCommand)?;
        if script.needs_credentials() && self.credentials.is_none() {
            return Err(SessionError::CredentialsRequired);
        }

        let size = self
            .pty_size
            .or_else(terminal::current_size)
            .unwrap_or(PtySize {
                rows: DEFAULT_PTY_ROWS,
                cols: DEFAULT_PTY_COLS,
                pixel_width: 0,
                pixel_height: 0,
            });

        let pair = native_pty_system()
            .openpty(size)
            .map_err(|e| SessionError::Pty(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&self.shell);
        cmd.arg("-c");
        cmd.arg(seed);
        if let Ok(cwd) = std::env::current_dir() {
            cmd.cwd(cwd);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| SessionError::Spawn(e.to_string()))?;
        // The child holds the only slave handle now; its exit closes the PTY.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| SessionError::Pty(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| SessionError::Pty(e.to_string()))?;

        debug!(
            seed,
            steps = steps.len(),
            rows = size.rows,
            cols = size.cols,
            "seed command spawned"
        );

        Ok(Session {
            master: Arc::new(Mutex::new(pair.master)),
            child,
            reader,
            writer: Arc::new(tokio::sync::Mutex::new(writer)),
            steps: steps.to_vec(),
            credentials: self.credentials,
            settings: Settings {
                settle_delay: self.settle_delay,
                send_pause: self.send_pause,
                raw_mode: self.raw_mode,
                forward_resize: self.forward_resize,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_seed_command() {
        let script = Script::parse(&["SEND:x", "INTERACT"]).unwrap();
        let err = SessionBuilder::new().spawn(&script).unwrap_err();
        assert!(matches!(err, SessionError::NoSeedCommand));
    }

    #[test]
    fn test_sendpass_requires_store() {
        let script = Script::parse(&["ssh host", "SENDPASS:db"]).unwrap();
        let err = SessionBuilder::new()
            .shell("/bin/sh")
            .spawn(&script)
            .unwrap_err();
        assert!(matches!(err, SessionError::CredentialsRequired));
    }

    #[test]
    fn test_defaults() {
        let builder = SessionBuilder::new();
        assert_eq!(builder.settle_delay, Duration::from_millis(500));
        assert_eq!(builder.send_pause, Duration::from_millis(100));
        assert!(builder.raw_mode);
        assert!(builder.forward_resize);
        assert!(builder.pty_size.is_none());
    }
}
