//! Directive replay and input hand-off

use super::input::SessionInput;
use crate::directive::Directive;
use crate::vault::CredentialStore;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// How long the input pump waits for a keystroke before rechecking shutdown.
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Shared writer into the PTY's input side.
pub(crate) type SharedWriter = Arc<tokio::sync::Mutex<Box<dyn Write + Send>>>;

/// How a replay ended.
#[derive(Debug, PartialEq, Eq)]
enum Replay {
    /// Every directive was applied.
    Exhausted,
    /// An `INTERACT` directive was reached.
    HandOff,
    /// A directive failed; the rest were skipped.
    Failed(String),
    /// The session ended first.
    Cancelled,
}

/// The automation task of one session.
pub(crate) struct Automation<I> {
    pub steps: Vec<Directive>,
    pub writer: SharedWriter,
    pub credentials: Option<Arc<CredentialStore>>,
    pub settle_delay: Duration,
    pub send_pause: Duration,
    pub input: I,
}

impl<I: SessionInput> Automation<I> {
    /// Replay the directives, then forward the input stream to the PTY until
    /// the session ends or the input closes.
    ///
    /// Returns the reason automation stopped early, if it did.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Option<String> {
        let Automation {
            steps,
            writer,
            credentials,
            settle_delay,
            send_pause,
            input,
        } = self;

        let replay = replay(
            &steps,
            &writer,
            credentials.as_deref(),
            settle_delay,
            send_pause,
            &mut shutdown,
        )
        .await;
        debug!(?replay, "automation finished");

        let failure = match replay {
            Replay::Cancelled => return None,
            Replay::Failed(reason) => {
                warn!("automation stopped: {reason}");
                Some(reason)
            }
            Replay::Exhausted | Replay::HandOff => None,
        };

        let pump = tokio::task::spawn_blocking(move || pump_input(input, &writer, &shutdown));
        match pump.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("input forwarding stopped: {e}"),
            Err(e) => warn!("input pump failed: {e}"),
        }
        failure
    }
}

async fn replay(
    steps: &[Directive],
    writer: &SharedWriter,
    credentials: Option<&CredentialStore>,
    settle_delay: Duration,
    send_pause: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> Replay {
    if !pause(settle_delay, shutdown).await {
        return Replay::Cancelled;
    }

    for step in steps {
        let line = match step {
            Directive::Interact => return Replay::HandOff,
            Directive::Wait(_) => {
                if !pause(step.wait_duration(), shutdown).await {
                    return Replay::Cancelled;
                }
                continue;
            }
            Directive::Send(text) | Directive::Exec(text) => Zeroizing::new(format!("{text}\n")),
            Directive::SendPass(id) => {
                let Some(store) = credentials else {
                    return Replay::Failed("credential store not loaded".to_string());
                };
                match store.get(id) {
                    Ok(secret) => Zeroizing::new(format!("{secret}\n")),
                    Err(e) => return Replay::Failed(e.to_string()),
                }
            }
        };

        debug!(directive = %step, "replaying directive");
        if let Err(e) = write_line(writer, line).await {
            return Replay::Failed(format!("failed to write to session: {e}"));
        }
        if !pause(send_pause, shutdown).await {
            return Replay::Cancelled;
        }
    }
    Replay::Exhausted
}

/// Sleep for `duration`; `false` if the session ended meanwhile.
async fn pause(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = shutdown.changed() => false,
    }
}

async fn write_line(writer: &SharedWriter, line: Zeroizing<String>) -> io::Result<()> {
    let writer = writer.clone();
    tokio::task::spawn_blocking(move || {
        let mut writer = writer.blocking_lock();
        writer.write_all(line.as_bytes())?;
        writer.flush()
    })
    .await
    .map_err(io::Error::other)?
}

/// Copy `input` into the PTY until EOF, a PTY write error, or shutdown.
///
/// Blocks the calling thread. Shutdown is noticed within one poll interval,
/// and bytes that arrive after it are left unread.
fn pump_input<I: SessionInput>(
    mut input: I,
    writer: &SharedWriter,
    shutdown: &watch::Receiver<bool>,
) -> io::Result<()> {
    debug!("input handed to the session");
    let mut buf = [0u8; 1024];
    loop {
        if *shutdown.borrow() {
            return Ok(());
        }
        if !input.poll_readable(INPUT_POLL_INTERVAL)? || *shutdown.borrow() {
            continue;
        }
        let n = match input.read(&mut buf) {
            Ok(0) => {
                debug!("input closed");
                return Ok(());
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let mut writer = writer.blocking_lock();
        if let Err(e) = writer.write_all(&buf[..n]).and_then(|()| writer.flush()) {
            debug!("session stopped accepting input: {e}");
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn shared(capture: &Capture) -> SharedWriter {
        Arc::new(tokio::sync::Mutex::new(Box::new(capture.clone())))
    }

    fn steps(raw: &[&str]) -> Vec<Directive> {
        raw.iter().map(|s| Directive::parse(s)).collect()
    }

    #[tokio::test]
    async fn test_replay_writes_in_order() {
        let capture = Capture::default();
        let (_tx, mut rx) = watch::channel(false);
        let result = replay(
            &steps(&["SEND:one", "WAIT:0", "uname -a", "SEND:"]),
            &shared(&capture),
            None,
            Duration::ZERO,
            Duration::ZERO,
            &mut rx,
        )
        .await;

        assert_eq!(result, Replay::Exhausted);
        assert_eq!(capture.0.lock().unwrap().as_slice(), b"one\nuname -a\n\n");
    }

    #[tokio::test]
    async fn test_interact_stops_replay() {
        let capture = Capture::default();
        let (_tx, mut rx) = watch::channel(false);
        let result = replay(
            &steps(&["SEND:a", "INTERACT", "SEND:b"]),
            &shared(&capture),
            None,
            Duration::ZERO,
            Duration::ZERO,
            &mut rx,
        )
        .await;

        assert_eq!(result, Replay::HandOff);
        assert_eq!(capture.0.lock().unwrap().as_slice(), b"a\n");
    }

    #[tokio::test]
    async fn test_sendpass_resolves_secret() {
        let mut store = CredentialStore::new("unused.enc");
        store.add("db", "", "hunter2").unwrap();
        let capture = Capture::default();
        let (_tx, mut rx) = watch::channel(false);
        let result = replay(
            &steps(&["SENDPASS:db"]),
            &shared(&capture),
            Some(&store),
            Duration::ZERO,
            Duration::ZERO,
            &mut rx,
        )
        .await;

        assert_eq!(result, Replay::Exhausted);
        assert_eq!(capture.0.lock().unwrap().as_slice(), b"hunter2\n");
    }

    #[tokio::test]
    async fn test_unknown_credential_aborts() {
        let store = CredentialStore::new("unused.enc");
        let capture = Capture::default();
        let (_tx, mut rx) = watch::channel(false);
        let result = replay(
            &steps(&["SEND:before", "SENDPASS:missing", "SEND:after"]),
            &shared(&capture),
            Some(&store),
            Duration::ZERO,
            Duration::ZERO,
            &mut rx,
        )
        .await;

        assert!(matches!(result, Replay::Failed(reason) if reason.contains("missing")));
        assert_eq!(capture.0.lock().unwrap().as_slice(), b"before\n");
    }

    #[tokio::test]
    async fn test_shutdown_cancels_wait() {
        let capture = Capture::default();
        let (tx, mut rx) = watch::channel(false);
        let writer = shared(&capture);
        let task = tokio::spawn(async move {
            replay(
                &steps(&["WAIT:3600", "SEND:late"]),
                &writer,
                None,
                Duration::ZERO,
                Duration::ZERO,
                &mut rx,
            )
            .await
        });

        tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Replay::Cancelled);
        assert!(capture.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_input_pump_copies_until_eof() {
        let capture = Capture::default();
        let (_tx, rx) = watch::channel(false);
        pump_input(io::Cursor::new(b"typed\n".to_vec()), &shared(&capture), &rx).unwrap();
        assert_eq!(capture.0.lock().unwrap().as_slice(), b"typed\n");
    }

    #[test]
    fn test_input_pump_stops_on_shutdown_without_reading() {
        let capture = Capture::default();
        let writer = shared(&capture);
        let (mut host, mut keyboard) = io::pipe().unwrap();
        let input = host.try_clone().unwrap();
        let (tx, rx) = watch::channel(false);
        let pump = std::thread::spawn(move || pump_input(input, &writer, &rx));

        keyboard.write_all(b"typed\n").unwrap();
        for _ in 0..100 {
            if capture.0.lock().unwrap().as_slice() == b"typed\n" {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(capture.0.lock().unwrap().as_slice(), b"typed\n");

        // The pipe stays open, so only the shutdown signal can end the pump.
        tx.send(true).unwrap();
        pump.join().unwrap().unwrap();

        keyboard.write_all(b"after").unwrap();
        drop(keyboard);
        let mut left = Vec::new();
        host.read_to_end(&mut left).unwrap();
        assert_eq!(left, b"after");
        assert_eq!(capture.0.lock().unwrap().as_slice(), b"typed\n");
    }

    #[tokio::test]
    async fn test_run_forwards_input_after_script() {
        let capture = Capture::default();
        let (_tx, rx) = watch::channel(false);
        let failure = Automation {
            steps: steps(&["SEND:scripted"]),
            writer: shared(&capture),
            credentials: None,
            settle_delay: Duration::ZERO,
            send_pause: Duration::ZERO,
            input: io::Cursor::new(b"typed\n".to_vec()),
        }
        .run(rx)
        .await;

        assert_eq!(failure, None);
        assert_eq!(capture.0.lock().unwrap().as_slice(), b"scripted\ntyped\n");
    }
}
