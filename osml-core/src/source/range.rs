//! Position and range tracking for source locations
//!
//! This module defines the data structures for representing positions and
//! byte ranges in source text.
//!
//! ## Types
//!
//! - [`SourcePosition`] - A line:column position in source text
//! - [`SourceRange`] - A closed-open byte range
//!
//! ## Key Design
//!
//! - **Byte ranges are primary**: every token and diagnostic carries exact
//!   closed-open byte offsets; line:column pairs are derived on demand by the
//!   [`SourceContextReader`](crate::source::SourceContextReader).
//! - **1-based positions**: both line and column are 1-based; columns are
//!   measured in code points, a tab counts as one column.

use serde::Serialize;
use std::fmt;
use std::ops::Range as ByteRange;

/// A line:column position in source text (both 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
}

impl SourcePosition {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl Default for SourcePosition {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// A closed-open byte range into a source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SourceRange {
    pub start: usize,
    pub end: usize,
}

impl SourceRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// A zero-width range at the given offset.
    pub fn at(offset: usize) -> Self {
        Self::new(offset, offset)
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }

    /// The smallest range covering both `self` and `other`.
    pub fn cover(&self, other: SourceRange) -> SourceRange {
        SourceRange::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl Default for SourceRange {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl From<ByteRange<usize>> for SourceRange {
    fn from(r: ByteRange<usize>) -> Self {
        Self::new(r.start, r.end)
    }
}

impl From<SourceRange> for ByteRange<usize> {
    fn from(r: SourceRange) -> Self {
        r.start..r.end
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
