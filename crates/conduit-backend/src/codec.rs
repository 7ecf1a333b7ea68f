//! Newline framing for backend stdout.
//!
//! Shaped like `tokio_util::codec::LinesCodec`, except that an oversized or
//! non-UTF-8 line is yielded as an item instead of an error. `FramedRead`
//! stops after the first decoder error, and one bad line must not end the
//! session.

use std::io;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

/// One framed stdout line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawLine {
    Text(String),
    /// Longer than the configured maximum; content discarded
    Oversized,
    InvalidUtf8,
}

#[derive(Debug, Clone)]
pub struct BackendLineCodec {
    max_length: usize,
    // Index of the next byte to scan for '\n'
    next_index: usize,
    discarding: bool,
}

impl BackendLineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }

    fn frame(line: &[u8]) -> RawLine {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        match std::str::from_utf8(line) {
            Ok(text) => RawLine::Text(text.to_string()),
            Err(_) => RawLine::InvalidUtf8,
        }
    }
}

impl Decoder for BackendLineCodec {
    type Item = RawLine;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<RawLine>> {
        loop {
            let read_to = std::cmp::min(self.max_length.saturating_add(1), buf.len());
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    buf.advance(offset + self.next_index + 1);
                    self.discarding = false;
                    self.next_index = 0;
                    return Ok(Some(RawLine::Oversized));
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let newline_index = offset + self.next_index;
                    self.next_index = 0;
                    let line = buf.split_to(newline_index + 1);
                    return Ok(Some(Self::frame(&line[..line.len() - 1])));
                }
                (false, None) if buf.len() > self.max_length => {
                    self.discarding = true;
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> io::Result<Option<RawLine>> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        if self.discarding {
            buf.clear();
            self.discarding = false;
            return Ok(Some(RawLine::Oversized));
        }
        if buf.is_empty() || &buf[..] == b"\r" {
            buf.clear();
            return Ok(None);
        }
        let line = buf.split_to(buf.len());
        Ok(Some(Self::frame(&line)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut BackendLineCodec, input: &[u8]) -> Vec<RawLine> {
        let mut buf = BytesMut::from(input);
        let mut out = Vec::new();
        while let Some(line) = codec.decode(&mut buf).unwrap() {
            out.push(line);
        }
        while let Some(line) = codec.decode_eof(&mut buf).unwrap() {
            out.push(line);
        }
        out
    }

    #[test]
    fn test_splits_lines_and_strips_carriage_return() {
        let mut codec = BackendLineCodec::new(64);
        let lines = decode_all(&mut codec, b"{\"a\":1}\r\n\n{\"b\":2}\ntrailing");
        assert_eq!(
            lines,
            vec![
                RawLine::Text("{\"a\":1}".into()),
                RawLine::Text(String::new()),
                RawLine::Text("{\"b\":2}".into()),
                RawLine::Text("trailing".into()),
            ]
        );
    }

    #[test]
    fn test_oversized_line_is_skipped_not_fatal() {
        let mut codec = BackendLineCodec::new(8);
        let lines = decode_all(&mut codec, b"0123456789abcdef\nok\n");
        assert_eq!(lines, vec![RawLine::Oversized, RawLine::Text("ok".into())]);
    }

    #[test]
    fn test_oversized_line_across_reads() {
        let mut codec = BackendLineCodec::new(4);
        let mut buf = BytesMut::from(&b"abcdefgh"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());

        buf.extend_from_slice(b"ijk\nfine\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(RawLine::Oversized));
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(RawLine::Text("fine".into()))
        );
    }

    #[test]
    fn test_partial_line_waits_for_newline() {
        let mut codec = BackendLineCodec::new(64);
        let mut buf = BytesMut::from(&b"{\"type\":"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"\"ping\"}\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(RawLine::Text("{\"type\":\"ping\"}".into()))
        );
    }

    #[test]
    fn test_invalid_utf8_is_reported() {
        let mut codec = BackendLineCodec::new(64);
        let lines = decode_all(&mut codec, b"\xff\xfe\nok\n");
        assert_eq!(lines, vec![RawLine::InvalidUtf8, RawLine::Text("ok".into())]);
    }
}
