//! Line framing of the inbound byte stream.
//!
//! Lines end with `\r\n` or a bare `\n`. Bytes after the last terminator stay
//! in the buffer until more data arrives, so a terminator split across two
//! reads is handled like one received in a single read.
//!
//! No maximum line length is enforced: a peer that never sends a terminator
//! makes the buffer grow without bound.

use bytes::{Buf, Bytes, BytesMut};

/// Splits a byte buffer into protocol lines, terminators removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineFramer {
    /// Bytes of the buffer already scanned for `\n` without success.
    scanned: usize,
}

impl LineFramer {
    /// Creates a framer with no scan progress.
    #[must_use]
    pub const fn new() -> Self {
        Self { scanned: 0 }
    }

    /// Takes the next complete line out of `buf`.
    ///
    /// Returns `None` when `buf` holds no terminator; the partial line is
    /// left in place.
    pub fn next_line(&mut self, buf: &mut BytesMut) -> Option<Bytes> {
        let start = self.scanned.min(buf.len());
        let newline = buf[start..].iter().position(|&b| b == b'\n');

        let Some(offset) = newline else {
            self.scanned = buf.len();
            return None;
        };

        let end = start + offset;
        self.scanned = 0;

        let mut line = buf.split_to(end);
        buf.advance(1);

        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }

        Some(line.freeze())
    }
}
