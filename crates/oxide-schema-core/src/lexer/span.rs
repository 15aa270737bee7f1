//! Source location tracking for tokens and AST nodes.

use serde::Serialize;

/// A region of the declaration source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
    /// 1-based line of `start`.
    pub line: usize,
    /// 1-based column of `start`, counted in characters.
    pub column: usize,
}

impl Span {
    /// Creates a new span.
    #[must_use]
    pub const fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Returns the length of the span in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if the span is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Merges two spans into one that covers both. Position data comes from
    /// whichever span starts first.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        let (first, end) = if self.start <= other.start {
            (self, other.end)
        } else {
            (other, self.end)
        };
        let end = if first.end > end { first.end } else { end };
        Self {
            start: first.start,
            end,
            line: first.line,
            column: first.column,
        }
    }

    /// Returns the full text of the line this span starts on.
    #[must_use]
    pub fn line_text<'a>(&self, source: &'a str) -> &'a str {
        source.lines().nth(self.line.saturating_sub(1)).unwrap_or("")
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::new(0, 0, 1, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_len() {
        let span = Span::new(5, 10, 1, 6);
        assert_eq!(span.len(), 5);
        assert!(!span.is_empty());
        assert!(Span::new(3, 3, 1, 4).is_empty());
    }

    #[test]
    fn test_span_merge_keeps_first_position() {
        let a = Span::new(12, 20, 2, 3);
        let b = Span::new(4, 8, 1, 5);
        let merged = a.merge(b);
        assert_eq!(merged.start, 4);
        assert_eq!(merged.end, 20);
        assert_eq!(merged.line, 1);
        assert_eq!(merged.column, 5);
    }

    #[test]
    fn test_line_text() {
        let source = "model User {\n  id Int @id\n}";
        let span = Span::new(15, 17, 2, 3);
        assert_eq!(span.line_text(source), "  id Int @id");
        assert_eq!(Span::new(0, 0, 9, 1).line_text(source), "");
    }
}
