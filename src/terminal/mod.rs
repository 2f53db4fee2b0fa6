//! Local terminal control for interactive sessions

use crossterm::terminal::{disable_raw_mode, enable_raw_mode, is_raw_mode_enabled};
use portable_pty::PtySize;
use tracing::{debug, warn};

/// RAII guard that holds the controlling terminal in raw mode.
///
/// Raw mode turns off echo, canonical line buffering and signal-generating
/// control characters, so every keystroke (including Ctrl-C) reaches the
/// remote side. The previous line-discipline attributes are restored when
/// the guard is dropped, on every exit path.
#[derive(Debug)]
pub struct RawModeGuard {
    restore: bool,
}

impl RawModeGuard {
    /// Switch the controlling terminal to raw mode.
    ///
    /// If the terminal is already raw, the guard leaves it as it found it.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the terminal attributes cannot be
    /// read or written (e.g. stdin is not a TTY).
    pub fn enter() -> std::io::Result<Self> {
        let already_raw = is_raw_mode_enabled().unwrap_or(false);
        if !already_raw {
            enable_raw_mode()?;
            debug!("terminal switched to raw mode");
        }
        Ok(Self {
            restore: !already_raw,
        })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.restore {
            if let Err(e) = disable_raw_mode() {
                warn!("failed to restore terminal mode: {e}");
            } else {
                debug!("terminal mode restored");
            }
        }
    }
}

/// Current size of the controlling terminal, if there is one.
pub fn current_size() -> Option<PtySize> {
    let (cols, rows) = crossterm::terminal::size().ok()?;
    if cols == 0 || rows == 0 {
        return None;
    }
    Some(PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    })
}

/// Shared handle to the master side of a PTY.
pub type SharedMaster = std::sync::Arc<std::sync::Mutex<Box<dyn portable_pty::MasterPty + Send>>>;

/// Forward window-size changes of the controlling terminal to `master`.
///
/// The current size is pushed immediately, then again on every `SIGWINCH`,
/// until `shutdown` flips to `true` or its sender is dropped.
pub fn forward_resizes(
    master: SharedMaster,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        // Subscribe first so a resize racing the initial push is not lost.
        let mut winch = match signal(SignalKind::window_change()) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!("cannot listen for window resizes: {e}");
                None
            }
        };

        apply_size(&master);

        let Some(winch) = winch.as_mut() else {
            return;
        };
        loop {
            tokio::select! {
                received = winch.recv() => {
                    if received.is_none() {
                        break;
                    }
                    apply_size(&master);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("resize listener stopped");
    })
}

fn apply_size(master: &SharedMaster) {
    let Some(size) = current_size() else {
        return;
    };
    let Ok(master) = master.lock() else {
        return;
    };
    match master.resize(size) {
        Ok(()) => debug!(rows = size.rows, cols = size.cols, "pty resized"),
        Err(e) => warn!("failed to resize pty: {e}"),
    }
}
