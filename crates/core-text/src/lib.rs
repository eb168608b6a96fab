//! Line-oriented text model: positions, styled lines and the line buffer.
//!
//! The buffer is an owned `Vec<Line>`; every line carries its own style runs,
//! position-anchored marks and the tokenizer state cached after it. Callers
//! outside the edit coordinator only ever see `&Line` views.
//!
//! Invariants (hold after every public call):
//! * A buffer contains at least one line (an empty document is one empty line).
//! * For every line, the style run lengths sum to the byte length of its text.
//! * Marks are sorted by `from` and never start at or past the end of their line.
//! * Positions handed back to callers are clipped into the buffer.

use std::fmt;

pub mod brackets;
mod buffer;
mod eol;
mod line;
pub mod search;
mod state;
mod style;

pub use brackets::{BracketMatch, match_bracket};
pub use buffer::{Buffer, Splice, split_text};
pub use eol::{LineEnding, NormalizedText, normalize_line_endings};
pub use line::{Line, MarkId, MarkedSpan};
pub use search::SearchCursor;
pub use state::{ModeState, OpaqueState};
pub use style::{Fragments, StyleRun, StyleRuns, StyleTag};

/// A position inside a buffer expressed as (line index, byte offset within that line).
///
/// Ordering is document order: by line, then by byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub ch: usize,
}

impl Position {
    pub const fn new(line: usize, ch: usize) -> Self {
        Self { line, ch }
    }

    pub const fn origin() -> Self {
        Self { line: 0, ch: 0 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.ch)
    }
}

/// Errors raised by range operations on the buffer.
///
/// These indicate a caller bug (out-of-range positions are clamped, never
/// reported), so they are surfaced instead of being repaired.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextError {
    #[error("unordered range: {from} is after {to}")]
    UnorderedRange { from: Position, to: Position },
}

/// Order two positions so the first is not after the second.
pub fn ordered(a: Position, b: Position) -> (Position, Position) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Visual column of byte offset `end` within `text`, expanding tabs to `tab_size` stops.
pub fn count_column(text: &str, end: usize, tab_size: usize) -> usize {
    use unicode_width::UnicodeWidthChar;
    let tab_size = tab_size.max(1);
    let mut col = 0;
    for (idx, ch) in text.char_indices() {
        if idx >= end {
            break;
        }
        if ch == '\t' {
            col += tab_size - col % tab_size;
        } else {
            col += ch.width().unwrap_or(0);
        }
    }
    col
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_order_by_line_then_ch() {
        assert!(Position::new(0, 9) < Position::new(1, 0));
        assert!(Position::new(2, 1) < Position::new(2, 3));
        assert_eq!(
            ordered(Position::new(3, 0), Position::new(1, 4)),
            (Position::new(1, 4), Position::new(3, 0))
        );
    }

    #[test]
    fn column_expands_tabs() {
        assert_eq!(count_column("\tab", 1, 4), 4);
        assert_eq!(count_column("a\tb", 2, 4), 4);
        assert_eq!(count_column("ab\t\tc", 4, 4), 8);
        assert_eq!(count_column("abc", 10, 4), 3);
    }

    #[test]
    fn column_counts_wide_chars() {
        assert_eq!(count_column("漢字x", "漢字".len(), 4), 4);
    }
}
