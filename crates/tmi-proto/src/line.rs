//! Line-based codec for tokio.
//!
//! Reads LF-terminated lines (a preceding CR is stripped) and writes lines
//! terminated by CR-LF.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::error;
use crate::{CRLF, DEFAULT_MAX_LINE_LEN};

/// Line-based codec for the chat connection.
///
/// Inbound lines are decoded lossily as UTF-8 and never fail the stream:
/// an over-long line is discarded up to its terminator and blank lines are
/// skipped, so a single bad line cannot end the read loop.
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    /// Maximum line length, terminator included
    max_len: usize,
    /// Set while skipping the remainder of an over-long line
    discarding: bool,
    /// Number of over-long lines dropped so far
    discarded: u64,
}

impl LineCodec {
    /// Create a new codec with the default max line length.
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE_LEN)
    }

    /// Create a new codec with custom max line length.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarding: false,
            discarded: 0,
        }
    }

    /// Number of over-long lines dropped by this codec.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Truncate outgoing data at the first line break.
    ///
    /// Stops a caller-supplied chat message from smuggling a second
    /// protocol line onto the wire.
    pub fn sanitize(line: &str) -> &str {
        match line.find(['\r', '\n']) {
            Some(pos) => &line[..pos],
            None => line,
        }
    }

    fn drop_overlong(&mut self, len: usize) {
        self.discarded += 1;
        warn!(len, limit = self.max_len, "Discarding over-long inbound line");
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = error::ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                if self.discarding {
                    src.clear();
                    self.next_index = 0;
                } else if src.len() > self.max_len {
                    self.drop_overlong(src.len());
                    self.discarding = true;
                    src.clear();
                    self.next_index = 0;
                } else {
                    // No complete line yet - remember where we stopped
                    self.next_index = src.len();
                }
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if self.discarding {
                // Tail of a line we already reported
                self.discarding = false;
                continue;
            }
            if line.len() > self.max_len {
                self.drop_overlong(line.len());
                continue;
            }

            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\r', '\n']);
            if text.is_empty() {
                continue;
            }
            return Ok(Some(text.to_string()));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }

        // Unterminated final line
        let rest = src.split();
        self.next_index = 0;
        if self.discarding {
            self.discarding = false;
            return Ok(None);
        }
        let text = String::from_utf8_lossy(&rest);
        let text = text.trim_end_matches('\r');
        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(text.to_string()))
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = error::ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> error::Result<()> {
        self.encode(line.as_str(), dst)
    }
}

impl Encoder<&str> for LineCodec {
    type Error = error::ProtocolError;

    fn encode(&mut self, line: &str, dst: &mut BytesMut) -> error::Result<()> {
        let line = Self::sanitize(line);
        dst.reserve(line.len() + CRLF.len());
        dst.extend_from_slice(line.as_bytes());
        dst.extend_from_slice(CRLF.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_complete_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PING :tmi.twitch.tv\r\n");

        let result = codec.decode(&mut buf).unwrap();
        assert_eq!(result, Some("PING :tmi.twitch.tv".to_string()));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_bare_lf() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("RECONNECT\n");

        assert_eq!(codec.decode(&mut buf).unwrap(), Some("RECONNECT".to_string()));
    }

    #[test]
    fn test_decode_partial_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PING :");

        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"abc\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("PING :abc".to_string()));
    }

    #[test]
    fn test_decode_two_lines_in_one_read() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PING :a\r\nPING :b\r\n");

        assert_eq!(codec.decode(&mut buf).unwrap(), Some("PING :a".to_string()));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("PING :b".to_string()));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_decode_skips_blank_lines() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("\r\n\r\nRECONNECT\r\n");

        assert_eq!(codec.decode(&mut buf).unwrap(), Some("RECONNECT".to_string()));
    }

    #[test]
    fn test_decode_discards_too_long_and_recovers() {
        let mut codec = LineCodec::with_max_len(10);
        let mut buf = BytesMut::from("this is way too long\r\nPING :x\r\n");

        assert_eq!(codec.decode(&mut buf).unwrap(), Some("PING :x".to_string()));
        assert_eq!(codec.discarded(), 1);
    }

    #[test]
    fn test_decode_discards_too_long_across_reads() {
        let mut codec = LineCodec::with_max_len(10);
        let mut buf = BytesMut::from("0123456789abcdef");

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(codec.discarded(), 1);

        buf.extend_from_slice(b"still the same line\r\nPING :y\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("PING :y".to_string()));
        assert_eq!(codec.discarded(), 1);
    }

    #[test]
    fn test_decode_invalid_utf8_is_lossy() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"PRIVMSG #c :caf\xff\r\n"[..]);

        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert!(line.starts_with("PRIVMSG #c :caf"));
    }

    #[test]
    fn test_decode_eof_returns_unterminated_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("RECONNECT");

        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some("RECONNECT".to_string()));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_encode_appends_crlf() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();

        codec.encode("PONG :test", &mut buf).unwrap();
        assert_eq!(&buf[..], b"PONG :test\r\n");
    }

    #[test]
    fn test_encode_truncates_embedded_line_break() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();

        codec
            .encode("PRIVMSG #c :hi\r\nQUIT".to_string(), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"PRIVMSG #c :hi\r\n");
    }
}
