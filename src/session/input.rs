//! Local input streams handed to a session

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::fs::File;
use std::io::{self, Cursor, Empty, PipeReader, Read};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::time::Duration;

/// A byte stream the user types into once automation hands off.
///
/// The input pump waits on [`poll_readable`](SessionInput::poll_readable)
/// between reads so it can notice the session ending without blocking in
/// `read`. Streams backed by a file descriptor poll it; in-memory streams
/// are always ready.
pub trait SessionInput: Read + Send + 'static {
    /// Wait up to `timeout` for bytes (or end of stream) to be readable.
    ///
    /// Returns `Ok(false)` when the timeout elapsed first.
    fn poll_readable(&mut self, _timeout: Duration) -> io::Result<bool> {
        Ok(true)
    }
}

impl SessionInput for File {
    fn poll_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        poll_fd(self.as_fd(), timeout)
    }
}

impl SessionInput for PipeReader {
    fn poll_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        poll_fd(self.as_fd(), timeout)
    }
}

impl SessionInput for UnixStream {
    fn poll_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        poll_fd(self.as_fd(), timeout)
    }
}

impl<T: AsRef<[u8]> + Send + 'static> SessionInput for Cursor<T> {}

impl SessionInput for Empty {}

/// Wait for `fd` to become readable; hang-ups count as readable.
fn poll_fd(fd: BorrowedFd<'_>, timeout: Duration) -> io::Result<bool> {
    let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
    let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
    match poll(&mut fds, PollTimeout::from(millis)) {
        Ok(ready) => Ok(ready > 0),
        Err(Errno::EINTR) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_pipe_ready_only_with_data() {
        let (mut reader, mut writer) = io::pipe().unwrap();
        assert!(!reader.poll_readable(Duration::from_millis(20)).unwrap());

        writer.write_all(b"x").unwrap();
        assert!(reader.poll_readable(Duration::from_millis(20)).unwrap());
    }

    #[test]
    fn test_closed_pipe_is_readable() {
        let (mut reader, writer) = io::pipe().unwrap();
        drop(writer);
        assert!(reader.poll_readable(Duration::from_millis(20)).unwrap());
        assert_eq!(reader.read(&mut [0u8; 4]).unwrap(), 0);
    }

    #[test]
    fn test_memory_input_always_ready() {
        assert!(Cursor::new(b"abc").poll_readable(Duration::ZERO).unwrap());
        assert!(io::empty().poll_readable(Duration::ZERO).unwrap());
    }
}
