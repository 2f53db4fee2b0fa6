//! Terminal query-response filtering for PTY output.
//!
//! Remote programs send the terminal control queries (cursor position,
//! device attributes, device status). When those replies are echoed back by
//! the remote side they show up on screen as garbage like `^[[24;80R`.
//! [`OutputFilter`] drops the reply sequences and passes every display
//! sequence (colours, cursor movement, ...) through untouched.

use bytes::{Buf, BytesMut};

const ESC: u8 = 0x1b;

/// Stateful filter over the PTY-to-screen byte stream.
///
/// Escape sequences may straddle read boundaries, so an unterminated
/// sequence at the end of one [`feed`](OutputFilter::feed) call is held back
/// and completed by the next.
///
/// # Examples
///
/// ```
/// use sshhop::OutputFilter;
///
/// let mut filter = OutputFilter::new();
/// // A cursor-position report split across two reads disappears.
/// assert_eq!(filter.feed(b"ok\x1b[24;"), b"ok");
/// assert_eq!(filter.feed(b"80R$ "), b"$ ");
/// // Colours survive.
/// assert_eq!(filter.feed(b"\x1b[1;31mred"), b"\x1b[1;31mred");
/// ```
#[derive(Debug, Default)]
pub struct OutputFilter {
    pending: BytesMut,
}

impl OutputFilter {
    /// Create a filter with nothing held back.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter the next chunk of output, returning the bytes to display.
    pub fn feed(&mut self, data: &[u8]) -> Vec<u8> {
        self.pending.extend_from_slice(data);

        let buf = &self.pending[..];
        let mut out = Vec::with_capacity(buf.len());
        let mut i = 0;

        while i < buf.len() {
            if buf[i] == ESC {
                if i + 1 == buf.len() {
                    // Possibly the start of a CSI; wait for more.
                    break;
                }
                if buf[i + 1] == b'[' {
                    let end = scan_params(buf, i + 2);
                    if end == buf.len() {
                        // Unterminated; hold back from the ESC onwards.
                        break;
                    }
                    match buf[end] {
                        b'R' | b'c' | b'n' => {
                            i = end + 1;
                            continue;
                        }
                        0x40..=0x7e => {
                            out.extend_from_slice(&buf[i..=end]);
                            i = end + 1;
                            continue;
                        }
                        // Not a sequence we recognise; emit the ESC as text.
                        _ => {}
                    }
                }
            } else if buf[i] == b';' {
                if let Some(end) = bare_report_end(buf, i) {
                    i = end + 1;
                    continue;
                }
            }

            out.push(buf[i]);
            i += 1;
        }

        self.pending.advance(i);
        out
    }

    /// Flush whatever is held back, e.g. when the stream ends.
    pub fn finish(&mut self) -> Vec<u8> {
        self.pending.split().to_vec()
    }

    /// Number of bytes currently held back.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

fn is_param(byte: u8) -> bool {
    byte.is_ascii_digit() || matches!(byte, b';' | b'?' | b'=' | b'>' | b'!' | b' ')
}

/// Index of the first non-parameter byte at or after `from`.
fn scan_params(buf: &[u8], from: usize) -> usize {
    buf[from..]
        .iter()
        .position(|&b| !is_param(b))
        .map_or(buf.len(), |p| from + p)
}

/// For a `;<digits>R` or `;<digits>c` fragment starting at `start`, the
/// index of its final byte.
fn bare_report_end(buf: &[u8], start: usize) -> Option<usize> {
    let digits = buf[start + 1..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    let end = start + 1 + digits;
    (digits > 0 && matches!(buf.get(end), Some(b'R' | b'c'))).then_some(end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_once(input: &[u8]) -> Vec<u8> {
        let mut f = OutputFilter::new();
        let mut out = f.feed(input);
        out.extend(f.finish());
        out
    }

    #[test]
    fn test_plain_text_passes() {
        assert_eq!(filter_once(b"Hello world\r\n"), b"Hello world\r\n");
    }

    #[test]
    fn test_device_status_report_dropped() {
        assert_eq!(filter_once(b"\x1b[5n"), b"");
        assert_eq!(filter_once(b"a\x1b[0nb"), b"ab");
    }

    #[test]
    fn test_cursor_position_report_dropped() {
        assert_eq!(filter_once(b"\x1b[24;80R$ "), b"$ ");
    }

    #[test]
    fn test_device_attributes_dropped() {
        assert_eq!(filter_once(b"\x1b[?1;2c"), b"");
        assert_eq!(filter_once(b"\x1b[>0;276;0c"), b"");
    }

    #[test]
    fn test_display_sequences_kept() {
        let input = b"\x1b[1;31mred\x1b[0m \x1b[2J\x1b[H\x1b[?25l";
        assert_eq!(filter_once(input), input);
    }

    #[test]
    fn test_split_sequence_across_feeds() {
        let mut f = OutputFilter::new();
        assert_eq!(f.feed(b"x\x1b[3"), b"x");
        assert_eq!(f.pending(), 3);
        assert_eq!(f.feed(b"1mred"), b"\x1b[31mred");
        assert_eq!(f.pending(), 0);
    }

    #[test]
    fn test_split_report_dropped() {
        let mut f = OutputFilter::new();
        assert_eq!(f.feed(b"\x1b"), b"");
        assert_eq!(f.feed(b"[12;4"), b"");
        assert_eq!(f.feed(b"0R>"), b">");
    }

    #[test]
    fn test_bare_fragment_dropped() {
        assert_eq!(filter_once(b"prompt;45R$ "), b"prompt$ ");
        assert_eq!(filter_once(b";1c"), b"");
    }

    #[test]
    fn test_semicolons_in_text_kept() {
        assert_eq!(filter_once(b"a; b;c ;12x ;R"), b"a; b;c ;12x ;R");
    }

    #[test]
    fn test_unknown_byte_after_csi_emitted() {
        assert_eq!(filter_once(b"\x1b[1\x07z"), b"\x1b[1\x07z");
    }

    #[test]
    fn test_other_escapes_untouched() {
        let input = b"\x1b]0;title\x07\x1b(B";
        assert_eq!(filter_once(input), input);
    }

    #[test]
    fn test_finish_flushes_partial() {
        let mut f = OutputFilter::new();
        assert_eq!(f.feed(b"end\x1b[1;"), b"end");
        assert_eq!(f.finish(), b"\x1b[1;");
        assert_eq!(f.pending(), 0);
    }
}
