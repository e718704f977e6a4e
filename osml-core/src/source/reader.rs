//! Byte-to-codepoint source reader
//!
//! [`CharReader`] turns a UTF-8 buffer into a stream of code points with
//! peek/consume semantics, byte-offset tracking, and line/column bookkeeping.
//!
//! Contract:
//!
//! - `peek` never advances the read cursor; repeated calls walk a separate
//!   peek cursor forward so lookahead of arbitrary depth is possible.
//! - `consume_peek` commits everything peeked so far; `reset_peek` discards it.
//! - `read` resets the peek cursor, returns the next code point, and advances.
//! - Linebreaks are normalized: `\r\n`, `\r` and `\n` are all reported as
//!   `\n` (a `\r\n` pair consumes two bytes).
//! - Columns are measured in code points, not bytes; a tab counts as one.
//! - `fork` produces an independent cursor over the same buffer, which is how
//!   multiple cursors coexist.

use crate::source::range::SourcePosition;

#[derive(Debug, Clone, Copy)]
struct Cursor {
    off: usize,
    line: usize,
    column: usize,
}

impl Cursor {
    fn start() -> Self {
        Cursor {
            off: 0,
            line: 1,
            column: 1,
        }
    }
}

/// A peekable code point reader over a shared source buffer.
#[derive(Debug, Clone)]
pub struct CharReader<'a> {
    buf: &'a str,
    /// Bias added to all reported offsets, for readers over sub-slices.
    base: usize,
    cursor: Cursor,
    peek_cursor: Cursor,
}

impl<'a> CharReader<'a> {
    pub fn new(buf: &'a str) -> Self {
        Self::with_base(buf, 0)
    }

    /// Reader over a sub-slice of a larger buffer; `base` is the byte offset
    /// of the slice within the full buffer so reported ranges stay absolute.
    pub fn with_base(buf: &'a str, base: usize) -> Self {
        CharReader {
            buf,
            base,
            cursor: Cursor::start(),
            peek_cursor: Cursor::start(),
        }
    }

    /// Decode the code point at `off`, normalizing linebreaks.
    fn decode(&self, off: usize) -> Option<(char, usize)> {
        if off >= self.buf.len() {
            return None;
        }
        let c = self.buf[off..].chars().next()?;
        if c == '\r' {
            let mut next = off + 1;
            if self.buf[next..].starts_with('\n') {
                next += 1;
            }
            Some(('\n', next))
        } else {
            Some((c, off + c.len_utf8()))
        }
    }

    fn advance(cursor: &mut Cursor, c: char, next: usize) {
        cursor.off = next;
        if c == '\n' {
            cursor.line += 1;
            cursor.column = 1;
        } else {
            cursor.column += 1;
        }
    }

    /// Look at the next not-yet-peeked code point without committing it.
    pub fn peek(&mut self) -> Option<char> {
        let (c, next) = self.decode(self.peek_cursor.off)?;
        Self::advance(&mut self.peek_cursor, c, next);
        Some(c)
    }

    /// Commit everything peeked so far.
    pub fn consume_peek(&mut self) {
        self.cursor = self.peek_cursor;
    }

    /// Discard the peek state.
    pub fn reset_peek(&mut self) {
        self.peek_cursor = self.cursor;
    }

    /// Read and consume the next code point.
    pub fn read(&mut self) -> Option<char> {
        self.reset_peek();
        let (c, next) = self.decode(self.cursor.off)?;
        Self::advance(&mut self.cursor, c, next);
        self.peek_cursor = self.cursor;
        Some(c)
    }

    /// Consume up to `n` code points; returns the number actually consumed.
    pub fn consume(&mut self, n: usize) -> usize {
        let mut consumed = 0;
        while consumed < n && self.read().is_some() {
            consumed += 1;
        }
        consumed
    }

    pub fn at_end(&self) -> bool {
        self.cursor.off >= self.buf.len()
    }

    /// Byte offset of the read cursor (absolute, including the base bias).
    pub fn offset(&self) -> usize {
        self.base + self.cursor.off
    }

    /// Byte offset of the peek cursor (absolute).
    pub fn peek_offset(&self) -> usize {
        self.base + self.peek_cursor.off
    }

    pub fn line(&self) -> usize {
        self.cursor.line
    }

    pub fn column(&self) -> usize {
        self.cursor.column
    }

    pub fn position(&self) -> SourcePosition {
        SourcePosition::new(self.cursor.line, self.cursor.column)
    }

    /// An independent cursor over the same buffer.
    pub fn fork(&self) -> CharReader<'a> {
        self.clone()
    }
}
