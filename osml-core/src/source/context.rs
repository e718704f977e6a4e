//! On-demand source context resolution
//!
//! [`SourceContextReader`] maps byte offsets and ranges back to line/column
//! positions and to the surrounding text line, clipped to a maximum width.
//! It is a pure function of the byte buffer plus a lazily-built line-offset
//! index, so constructing one is free until the first lookup.

use crate::source::range::{SourcePosition, SourceRange};
use once_cell::unsync::OnceCell;
use serde::Serialize;

/// The text surrounding a source range, with the range located inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceContext {
    /// The enclosing line (or multi-line slice), possibly clipped.
    pub text: String,
    /// Byte offset of the range start within `text`.
    pub relative_offset: usize,
    /// Byte length of the range within `text` (clipped to the slice).
    pub relative_length: usize,
    pub start: SourcePosition,
    pub end: SourcePosition,
    /// True if text before the slice was clipped away.
    pub truncated_start: bool,
    /// True if text after the slice was clipped away.
    pub truncated_end: bool,
}

/// Clamp a byte offset down to the nearest char boundary of `s`.
pub(crate) fn floor_char_boundary(s: &str, offset: usize) -> usize {
    let mut offset = offset.min(s.len());
    while offset > 0 && !s.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Resolves byte offsets to positions and context slices.
pub struct SourceContextReader<'a> {
    source: &'a str,
    line_starts: OnceCell<Vec<usize>>,
}

impl<'a> SourceContextReader<'a> {
    pub fn new(source: &'a str) -> Self {
        SourceContextReader {
            source,
            line_starts: OnceCell::new(),
        }
    }

    fn line_starts(&self) -> &[usize] {
        self.line_starts.get_or_init(|| {
            let mut starts = vec![0];
            for (pos, b) in self.source.bytes().enumerate() {
                if b == b'\n' {
                    starts.push(pos + 1);
                }
            }
            starts
        })
    }

    /// Convert a byte offset to a 1-based line/column position.
    ///
    /// Columns count code points, not bytes.
    pub fn position(&self, offset: usize) -> SourcePosition {
        let offset = floor_char_boundary(self.source, offset);
        let starts = self.line_starts();
        let line = starts
            .binary_search(&offset)
            .unwrap_or_else(|i| i - 1);
        let line_start = starts[line];
        let column = self.source[line_start..offset].chars().count();
        SourcePosition::new(line + 1, column + 1)
    }

    /// Byte range of the line containing `offset`, without the trailing newline.
    fn line_bounds(&self, offset: usize) -> SourceRange {
        let offset = offset.min(self.source.len());
        let starts = self.line_starts();
        let line = starts
            .binary_search(&offset)
            .unwrap_or_else(|i| i - 1);
        let start = starts[line];
        let end = starts
            .get(line + 1)
            .map(|next| next - 1)
            .unwrap_or(self.source.len());
        SourceRange::new(start, end)
    }

    /// The enclosing line text (or multi-line slice for spanning ranges),
    /// clipped to `max_width` bytes around the range.
    pub fn context(&self, range: SourceRange, max_width: usize) -> SourceContext {
        let start = self.position(range.start);
        let end = self.position(range.end);

        let first = self.line_bounds(range.start);
        let last = self.line_bounds(range.end.saturating_sub(1).max(range.start));
        let slice = SourceRange::new(first.start, last.end.max(first.end));

        // Range located within the slice, clipped to it.
        let r0 = range.start.saturating_sub(slice.start).min(slice.len());
        let r1 = range.end.saturating_sub(slice.start).min(slice.len());

        let (win_start, win_end, trunc_start, trunc_end) = if slice.len() <= max_width {
            (0, slice.len(), false, false)
        } else {
            let spare = max_width.saturating_sub((r1 - r0).min(max_width));
            let mut ws = r0.saturating_sub(spare / 2);
            if ws + max_width > slice.len() {
                ws = slice.len() - max_width;
            }
            let we = ws + max_width;
            // Stay on char boundaries.
            let text = &self.source[slice.start..slice.end];
            let mut ws = ws;
            while ws < text.len() && !text.is_char_boundary(ws) {
                ws += 1;
            }
            let mut we = we.min(text.len());
            while we > ws && !text.is_char_boundary(we) {
                we -= 1;
            }
            (ws, we, ws > 0, we < slice.len())
        };

        let text = self.source[slice.start + win_start..slice.start + win_end].to_string();
        let relative_offset = floor_char_boundary(&text, r0.saturating_sub(win_start));
        let relative_length = floor_char_boundary(&text, r1.saturating_sub(win_start))
            .saturating_sub(relative_offset);

        SourceContext {
            text,
            relative_offset,
            relative_length,
            start,
            end,
            truncated_start: trunc_start,
            truncated_end: trunc_end || r1 > win_end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_first_line() {
        let r = SourceContextReader::new("hello\nworld");
        assert_eq!(r.position(0), SourcePosition::new(1, 1));
        assert_eq!(r.position(4), SourcePosition::new(1, 5));
    }

    #[test]
    fn test_position_later_lines() {
        let r = SourceContextReader::new("hello\nworld\nmore");
        assert_eq!(r.position(6), SourcePosition::new(2, 1));
        assert_eq!(r.position(12), SourcePosition::new(3, 1));
        assert_eq!(r.position(15), SourcePosition::new(3, 4));
    }

    #[test]
    fn test_position_counts_code_points() {
        let r = SourceContextReader::new("wörld");
        // 'ö' occupies bytes 1..3; byte 3 is the third character
        assert_eq!(r.position(3), SourcePosition::new(1, 3));
    }

    #[test]
    fn test_position_clamps_into_code_point() {
        let r = SourceContextReader::new("wörld");
        // byte 2 sits inside 'ö'; clamp down to its start
        assert_eq!(r.position(2), SourcePosition::new(1, 2));
    }

    #[test]
    fn test_context_range_clamped_to_char_boundaries() {
        let r = SourceContextReader::new("naïve");
        let ctx = r.context(SourceRange::new(3, 5), 80);
        assert_eq!(ctx.text, "naïve");
        assert_eq!(ctx.relative_offset, 2);
        assert_eq!(ctx.relative_length, 3);
    }

    #[test]
    fn test_context_single_line() {
        let r = SourceContextReader::new("first\nsecond line\nthird");
        let ctx = r.context(SourceRange::new(13, 17), 80);
        assert_eq!(ctx.text, "second line");
        assert_eq!(ctx.relative_offset, 7);
        assert_eq!(ctx.relative_length, 4);
        assert_eq!(ctx.start, SourcePosition::new(2, 8));
        assert!(!ctx.truncated_start);
        assert!(!ctx.truncated_end);
    }

    #[test]
    fn test_context_multiline_range() {
        let r = SourceContextReader::new("aa\nbb\ncc\ndd");
        let ctx = r.context(SourceRange::new(4, 7), 80);
        assert_eq!(ctx.text, "bb\ncc");
        assert_eq!(ctx.relative_offset, 1);
        assert_eq!(ctx.relative_length, 3);
    }

    #[test]
    fn test_context_truncation() {
        let long = "x".repeat(200);
        let r = SourceContextReader::new(&long);
        let ctx = r.context(SourceRange::new(100, 104), 40);
        assert_eq!(ctx.text.len(), 40);
        assert!(ctx.truncated_start);
        assert!(ctx.truncated_end);
        assert_eq!(&ctx.text[ctx.relative_offset..ctx.relative_offset + 4], "xxxx");
    }

    #[test]
    fn test_context_truncation_at_line_start() {
        let long = format!("{}tail", "y".repeat(100));
        let r = SourceContextReader::new(&long);
        let ctx = r.context(SourceRange::new(0, 4), 20);
        assert!(!ctx.truncated_start);
        assert!(ctx.truncated_end);
        assert_eq!(ctx.relative_offset, 0);
    }

    #[test]
    fn test_context_empty_range() {
        let r = SourceContextReader::new("one\ntwo");
        let ctx = r.context(SourceRange::at(4), 80);
        assert_eq!(ctx.text, "two");
        assert_eq!(ctx.relative_offset, 0);
        assert_eq!(ctx.relative_length, 0);
    }
}
