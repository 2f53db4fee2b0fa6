//! Scripted interactive sessions over a PTY

mod automation;
mod builder;
mod input;

pub use builder::{
    SessionBuilder, DEFAULT_PTY_COLS, DEFAULT_PTY_ROWS, DEFAULT_SEND_PAUSE_MS,
    DEFAULT_SETTLE_DELAY_MS,
};
pub use input::SessionInput;

use crate::directive::Directive;
use crate::filter::OutputFilter;
use crate::result::{SessionError, SessionOutcome};
use crate::terminal::{self, RawModeGuard, SharedMaster};
use crate::vault::CredentialStore;
use automation::{Automation, SharedWriter};
use portable_pty::{Child, ChildKiller};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::AsFd;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::{debug, warn};

/// How long to keep draining PTY output after the seed process exited.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub(crate) struct Settings {
    pub settle_delay: Duration,
    pub send_pause: Duration,
    pub raw_mode: bool,
    pub forward_resize: bool,
}

/// A seed command running under a PTY, with its automation script pending.
///
/// Created by [`SessionBuilder::spawn`]; nothing is replayed or forwarded
/// until [`run`](Session::run) is awaited.
///
/// While running, three activities share the PTY:
///
/// - a resize listener pushing the local terminal size on `SIGWINCH`
/// - the automation task, which replays directives in order and then hands
///   the local input stream to the PTY
/// - the output pump, which copies PTY output through an [`OutputFilter`]
///
/// The session ends when the seed process exits. The listener and the
/// automation task, including its input forwarding, are then signalled and
/// joined, so no local input is read once [`run`](Session::run) returns.
///
/// # Examples
///
/// ```no_run
/// use sshhop::{Script, Session};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let script = Script::parse(&["ssh -tt bastion", "WAIT:1", "SEND:cd /srv", "INTERACT"])?;
/// let outcome = Session::builder().spawn(&script)?.run().await?;
/// println!("exit code {}", outcome.exit_code);
/// # Ok(())
/// # }
/// ```
pub struct Session {
    master: SharedMaster,
    child: Box<dyn Child + Send + Sync>,
    reader: Box<dyn Read + Send>,
    writer: SharedWriter,
    steps: Vec<Directive>,
    credentials: Option<Arc<CredentialStore>>,
    settings: Settings,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("pid", &self.child.process_id())
            .field("steps", &self.steps.len())
            .field("settings", &self.settings)
            .finish()
    }
}

impl Session {
    /// Create a new session builder.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// The directives replayed after the seed command.
    pub fn steps(&self) -> &[Directive] {
        &self.steps
    }

    /// Run the session against the process's own stdin and stdout.
    ///
    /// Input is read from a duplicate of the stdin descriptor, bypassing the
    /// standard library's stdin buffer.
    pub async fn run(mut self) -> Result<SessionOutcome, SessionError> {
        let stdin = match io::stdin().as_fd().try_clone_to_owned() {
            Ok(fd) => File::from(fd),
            Err(e) => {
                abort_child(self.child.as_mut());
                return Err(e.into());
            }
        };
        self.run_with_io(stdin, io::stdout()).await
    }

    /// Run the session with explicit input and output streams.
    ///
    /// `input` is only read once automation has handed off; `output`
    /// receives the filtered PTY output.
    ///
    /// # Errors
    ///
    /// [`SessionError::TerminalMode`] if raw mode cannot be engaged,
    /// [`SessionError::Io`] if the output thread cannot start or waiting
    /// for the seed process fails. The seed process is killed and reaped
    /// before a setup error is returned. Automation failures are reported
    /// in the returned [`SessionOutcome`] instead.
    pub async fn run_with_io<I, O>(self, input: I, output: O) -> Result<SessionOutcome, SessionError>
    where
        I: SessionInput,
        O: Write + Send + 'static,
    {
        let Session {
            master,
            mut child,
            reader,
            writer,
            steps,
            credentials,
            settings,
        } = self;

        let _raw_mode = if settings.raw_mode {
            match RawModeGuard::enter() {
                Ok(guard) => Some(guard),
                Err(e) => {
                    abort_child(child.as_mut());
                    return Err(SessionError::TerminalMode(e));
                }
            }
        } else {
            None
        };

        let output_done = match spawn_output_pump(reader, output) {
            Ok(done) => done,
            Err(e) => {
                abort_child(child.as_mut());
                return Err(e.into());
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let resize = settings
            .forward_resize
            .then(|| terminal::forward_resizes(master.clone(), shutdown_rx.clone()));

        let automation = tokio::spawn(
            Automation {
                steps,
                writer,
                credentials,
                settle_delay: settings.settle_delay,
                send_pause: settings.send_pause,
                input,
            }
            .run(shutdown_rx),
        );

        let status = tokio::task::spawn_blocking(move || child.wait()).await;

        // Receivers may already be gone; nothing to signal then.
        let _ = shutdown_tx.send(true);

        let automation_error = match automation.await {
            Ok(failure) => failure,
            Err(e) => Some(format!("automation task failed: {e}")),
        };
        if let Some(resize) = resize {
            if let Err(e) = resize.await {
                warn!("resize listener failed: {e}");
            }
        }
        if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, output_done)
            .await
            .is_err()
        {
            debug!("output still open after the seed command exited");
        }

        let status = status.map_err(io::Error::other)??;
        debug!(code = status.exit_code(), "seed command exited");
        Ok(SessionOutcome {
            exit_code: status.exit_code(),
            success: status.success(),
            automation_error,
        })
    }
}

/// Kill the seed process and reap it.
fn abort_child(child: &mut (dyn Child + Send + Sync)) {
    if let Err(e) = child.kill() {
        warn!("failed to stop seed command: {e}");
    }
    if let Err(e) = child.wait() {
        warn!("failed to reap seed command: {e}");
    }
}

/// Copy filtered PTY output to `output` on its own thread.
///
/// The returned receiver completes once the PTY reports end of stream (or
/// `output` stops accepting bytes).
fn spawn_output_pump<O>(mut reader: Box<dyn Read + Send>, mut output: O) -> io::Result<oneshot::Receiver<()>>
where
    O: Write + Send + 'static,
{
    let (done_tx, done_rx) = oneshot::channel();
    thread::Builder::new()
        .name("sshhop-output".to_string())
        .spawn(move || {
            let mut filter = OutputFilter::new();
            let mut buf = [0u8; 8192];
            loop {
                let n = match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    // Linux reports EIO once the slave side is closed.
                    Err(e) => {
                        debug!("pty read ended: {e}");
                        break;
                    }
                };
                let shown = filter.feed(&buf[..n]);
                if let Err(e) = output.write_all(&shown).and_then(|()| output.flush()) {
                    warn!("failed to write session output: {e}");
                    let _ = done_tx.send(());
                    return;
                }
            }
            let rest = filter.finish();
            if let Err(e) = output.write_all(&rest).and_then(|()| output.flush()) {
                warn!("failed to write session output: {e}");
            }
            let _ = done_tx.send(());
        })?;
    Ok(done_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use portable_pty::{native_pty_system, CommandBuilder, PtySize};
    use std::path::Path;

    #[test]
    fn test_abort_child_reaps_process() {
        let pair = native_pty_system()
            .openpty(PtySize {
                rows: 24,
                cols: 80,
                pixel_width: 0,
                pixel_height: 0,
            })
            .unwrap();
        let mut cmd = CommandBuilder::new("sleep");
        cmd.arg("30");
        let mut child = pair.slave.spawn_command(cmd).unwrap();
        let pid = child.process_id().unwrap();

        abort_child(child.as_mut());

        assert!(child.try_wait().unwrap().is_some());
        assert!(!Path::new(&format!("/proc/{pid}")).exists());
    }
}
