// SPDX-License-Identifier: MIT
//
// Output buffering and stateful run writing.
//
// Two components work together to minimize terminal I/O:
//
//   OutputBuffer: accumulates all bytes of a frame in memory so the frame
//   reaches the backend in a single write. Reused across frames.
//
//   CellWriter: remembers where the terminal cursor is and which colors
//   are active, and skips escape sequences that would change nothing. A
//   run of same-attribute cells costs one cursor move, at most one color
//   change, and the text itself.

use std::io::{self, Write};

use crate::ansi;
use crate::cell::Attribute;

// ─── OutputBuffer ────────────────────────────────────────────────────────────

/// A byte buffer that accumulates one frame of output.
///
/// Default capacity: 16 KB, enough for most frames without reallocation.
#[derive(Debug)]
pub struct OutputBuffer {
    buf: Vec<u8>,
}

const DEFAULT_CAPACITY: usize = 16_384;

impl OutputBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The accumulated bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Append a character as UTF-8.
    pub fn push_char(&mut self, ch: char) {
        let mut enc = [0u8; 4];
        self.buf.extend_from_slice(ch.encode_utf8(&mut enc).as_bytes());
    }

    /// Clear the buffer for reuse (keeps allocated capacity).
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Write accumulated output to `w` and clear the buffer.
    ///
    /// The buffer is cleared even when the write fails: a half-written
    /// frame is never retried byte for byte, the caller redraws instead.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn flush_to(&mut self, w: &mut (impl Write + ?Sized)) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let result = w.write_all(&self.buf).and_then(|()| w.flush());
        self.buf.clear();
        result
    }
}

impl Write for OutputBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Intentionally a no-op. Real flushing via flush_to().
        Ok(())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── CellWriter ──────────────────────────────────────────────────────────────

/// Tracks the terminal's cursor and colors to skip redundant escapes.
///
/// - **Cursor**: a move is emitted only when the next run does not start
///   where the previous text left the cursor.
/// - **Colors**: emitted only when the attribute differs from the last one
///   written. Both colors go out in one SGR sequence.
///
/// State is unknown at startup and after [`reset_state`](Self::reset_state);
/// the first run then always emits both.
#[allow(clippy::struct_field_names)] // The `last_` prefix IS the semantic grouping.
#[derive(Debug, Clone, Default)]
pub struct CellWriter {
    last_pos: Option<(u16, u16)>,
    last_attr: Option<Attribute>,
}

impl CellWriter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_pos: None,
            last_attr: None,
        }
    }

    /// Forget everything. Call after a failed write or a screen clear.
    pub const fn reset_state(&mut self) {
        self.last_pos = None;
        self.last_attr = None;
    }

    /// Put the cursor at `(row, col)` unless it is already there.
    pub fn move_to(&mut self, out: &mut impl Write, row: u16, col: u16) -> io::Result<()> {
        if self.last_pos != Some((row, col)) {
            ansi::cursor_to(out, row, col)?;
            self.last_pos = Some((row, col));
        }
        Ok(())
    }

    /// Switch colors unless `attr` is already active.
    pub fn set_attr(&mut self, out: &mut impl Write, attr: Attribute) -> io::Result<()> {
        let changed = self
            .last_attr
            .is_none_or(|last| last.fg != attr.fg || last.bg != attr.bg);
        if changed {
            ansi::colors(out, attr.fg, attr.bg)?;
        }
        self.last_attr = Some(attr);
        Ok(())
    }

    /// Record that `width` columns of text were written at the cursor.
    pub fn advance(&mut self, width: u16) {
        if let Some((row, col)) = self.last_pos {
            self.last_pos = Some((row, col.saturating_add(width)));
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use pretty_assertions::assert_eq;

    #[test]
    fn output_buffer_write_trait() {
        let mut buf = OutputBuffer::new();
        write!(buf, "hello {}", 42).unwrap();
        assert_eq!(buf.as_bytes(), b"hello 42");
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn push_char_encodes_utf8() {
        let mut buf = OutputBuffer::new();
        buf.push_char('A');
        buf.push_char('中');
        buf.push_char('🔥');
        assert_eq!(buf.as_bytes(), "A中🔥".as_bytes());
    }

    #[test]
    fn flush_to_moves_bytes_and_clears() {
        let mut buf = OutputBuffer::new();
        buf.push_char('x');
        let mut sink = Vec::new();
        buf.flush_to(&mut sink).unwrap();
        assert_eq!(sink, b"x");
        assert!(buf.is_empty());
    }

    #[test]
    fn failed_flush_still_clears() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let mut buf = OutputBuffer::new();
        buf.push_char('x');
        assert!(buf.flush_to(&mut Broken).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn writer_skips_redundant_moves() {
        let mut w = CellWriter::new();
        let mut out = Vec::new();
        w.move_to(&mut out, 0, 0).unwrap();
        out.push(b'a');
        w.advance(1);
        w.move_to(&mut out, 0, 1).unwrap();
        assert_eq!(out, b"\x1b[1;1Ha");
    }

    #[test]
    fn writer_skips_redundant_colors() {
        let mut w = CellWriter::new();
        let mut out = Vec::new();
        let red = Attribute::new(Color::RED, Color::Default, 0);
        w.set_attr(&mut out, red).unwrap();
        w.set_attr(&mut out, red).unwrap();
        assert_eq!(out, b"\x1b[31;49m");

        w.reset_state();
        w.set_attr(&mut out, red).unwrap();
        assert_eq!(out, b"\x1b[31;49m\x1b[31;49m");
    }
}
