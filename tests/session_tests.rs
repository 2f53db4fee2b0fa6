//! Integration tests for scripted PTY sessions

use sshhop::{CredentialStore, Script, Session, SessionBuilder, SessionError};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Output sink the test can inspect after the session consumed it.
#[derive(Clone, Default)]
struct Screen(Arc<Mutex<Vec<u8>>>);

impl Screen {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for Screen {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn builder() -> SessionBuilder {
    Session::builder()
        .shell("/bin/sh")
        .raw_mode(false)
        .forward_resize(false)
        .pty_size(24, 80)
        .settle_delay(Duration::from_millis(200))
        .send_pause(Duration::from_millis(50))
}

#[tokio::test]
async fn test_send_directives_drive_the_shell() {
    let script = Script::parse(&["sh", "SEND:echo $((40+2))", "SEND:exit"]).unwrap();
    let screen = Screen::default();
    let session = builder().spawn(&script).expect("Failed to spawn");
    assert_eq!(session.steps().len(), 2);

    let outcome = tokio::time::timeout(
        Duration::from_secs(20),
        session.run_with_io(io::empty(), screen.clone()),
    )
    .await
    .expect("session did not finish")
    .expect("session failed");

    assert!(screen.text().contains("42"), "output: {:?}", screen.text());
    assert_eq!(outcome.exit_code, 0);
    assert!(outcome.success);
    assert_eq!(outcome.automation_error, None);
}

#[tokio::test]
async fn test_non_zero_exit_is_an_outcome() {
    let script = Script::parse(&["sh", "SEND:exit 3"]).unwrap();

    let outcome = tokio::time::timeout(
        Duration::from_secs(20),
        builder()
            .spawn(&script)
            .expect("Failed to spawn")
            .run_with_io(io::empty(), io::sink()),
    )
    .await
    .expect("session did not finish")
    .expect("session failed");

    assert_eq!(outcome.exit_code, 3);
    assert!(!outcome.success);
}

#[tokio::test]
async fn test_sendpass_types_stored_secret() {
    let mut store = CredentialStore::new("unused.enc");
    store.add("db", "test database", "secret1").unwrap();

    let script = Script::parse(&[
        "sh",
        "SEND:read v; echo got-$v",
        "SENDPASS:db",
        "SEND:exit",
    ])
    .unwrap();
    let screen = Screen::default();

    let outcome = tokio::time::timeout(
        Duration::from_secs(20),
        builder()
            .credentials(Arc::new(store))
            .spawn(&script)
            .expect("Failed to spawn")
            .run_with_io(io::empty(), screen.clone()),
    )
    .await
    .expect("session did not finish")
    .expect("session failed");

    assert!(screen.text().contains("got-secret1"), "output: {:?}", screen.text());
    assert_eq!(outcome.automation_error, None);
}

#[tokio::test]
async fn test_unknown_credential_still_hands_off_input() {
    let store = CredentialStore::new("unused.enc");
    let script = Script::parse(&["sh", "SENDPASS:nope", "SEND:echo never-sent"]).unwrap();
    let screen = Screen::default();

    // The automation fails, so the typed input is what ends the shell.
    let typed = io::Cursor::new(b"echo from-user\nexit\n".to_vec());
    let outcome = tokio::time::timeout(
        Duration::from_secs(20),
        builder()
            .credentials(Arc::new(store))
            .spawn(&script)
            .expect("Failed to spawn")
            .run_with_io(typed, screen.clone()),
    )
    .await
    .expect("session did not finish")
    .expect("session failed");

    let reason = outcome.automation_error.expect("automation should fail");
    assert!(reason.contains("nope"), "reason: {reason}");
    assert!(screen.text().contains("from-user"));
    assert!(!screen.text().contains("never-sent"));
}

#[tokio::test]
async fn test_input_follows_finished_script() {
    let script = Script::parse(&["sh", "SEND:echo a"]).unwrap();
    let screen = Screen::default();

    let typed = io::Cursor::new(b"echo typed-by-user\nexit\n");
    let outcome = tokio::time::timeout(
        Duration::from_secs(20),
        builder()
            .spawn(&script)
            .expect("Failed to spawn")
            .run_with_io(typed, screen.clone()),
    )
    .await
    .expect("session did not finish")
    .expect("session failed");

    assert!(screen.text().contains("typed-by-user"), "output: {:?}", screen.text());
    assert!(outcome.success);
    assert_eq!(outcome.automation_error, None);
}

#[tokio::test]
async fn test_interact_hands_off_before_later_steps() {
    let script = Script::parse(&["sh", "INTERACT", "SEND:echo never"]).unwrap();
    let screen = Screen::default();

    let typed = io::Cursor::new(b"echo typed-by-user\nexit\n");
    tokio::time::timeout(
        Duration::from_secs(20),
        builder()
            .spawn(&script)
            .expect("Failed to spawn")
            .run_with_io(typed, screen.clone()),
    )
    .await
    .expect("session did not finish")
    .expect("session failed");

    let text = screen.text();
    assert!(text.contains("typed-by-user"), "output: {text:?}");
    assert!(!text.contains("never"), "output: {text:?}");
}

#[tokio::test]
async fn test_input_left_unread_after_session_ends() {
    let script = Script::parse(&["sh -c 'sleep 1'", "INTERACT"]).unwrap();
    let (mut host, mut keyboard) = io::pipe().unwrap();
    let input = host.try_clone().unwrap();

    // The keyboard stays open, so forwarding can only stop at session end.
    let outcome = tokio::time::timeout(
        Duration::from_secs(20),
        builder()
            .spawn(&script)
            .expect("Failed to spawn")
            .run_with_io(input, io::sink()),
    )
    .await
    .expect("input forwarding was not stopped")
    .expect("session failed");
    assert!(outcome.success);

    keyboard.write_all(b"host-keystroke").unwrap();
    drop(keyboard);
    let mut left = Vec::new();
    host.read_to_end(&mut left).unwrap();
    assert_eq!(left, b"host-keystroke");
}

#[tokio::test]
async fn test_wait_delays_next_step() {
    let script = Script::parse(&["sh", "WAIT:1", "SEND:exit"]).unwrap();
    let started = std::time::Instant::now();

    tokio::time::timeout(
        Duration::from_secs(20),
        builder()
            .spawn(&script)
            .expect("Failed to spawn")
            .run_with_io(io::empty(), io::sink()),
    )
    .await
    .expect("session did not finish")
    .expect("session failed");

    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_session_ends_when_seed_exits_mid_script() {
    let script = Script::parse(&["sh -c 'exit 0'", "WAIT:3600", "SEND:late"]).unwrap();

    let outcome = tokio::time::timeout(
        Duration::from_secs(20),
        builder()
            .spawn(&script)
            .expect("Failed to spawn")
            .run_with_io(io::empty(), io::sink()),
    )
    .await
    .expect("background tasks were not stopped")
    .expect("session failed");

    assert!(outcome.success);
    assert_eq!(outcome.automation_error, None);
}

#[test]
fn test_missing_seed_rejected() {
    let script = Script::parse(&["WAIT:1", "INTERACT"]).unwrap();
    let err = builder().spawn(&script).unwrap_err();
    assert!(matches!(err, SessionError::NoSeedCommand));
}

#[test]
fn test_sendpass_without_store_rejected() {
    let script = Script::parse(&["sh", "SENDPASS:db"]).unwrap();
    let err = builder().spawn(&script).unwrap_err();
    assert!(matches!(err, SessionError::CredentialsRequired));
}
