//! The line buffer: an owned, non-empty sequence of styled lines.
//!
//! `splice` is the only structural mutation used by editing; `replace_lines`
//! exists for history replay, which works on whole lines.

use crate::eol::normalize_line_endings;
use crate::line::Line;
use crate::{Position, TextError};
use std::ops::Range;
use tracing::trace;

/// Split text on any line break (`\n`, `\r\n`, `\r`). Always yields at least one line.
pub fn split_text(text: &str) -> Vec<String> {
    normalize_line_endings(text)
        .normalized
        .split('\n')
        .map(str::to_owned)
        .collect()
}

/// Description of an applied splice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    /// First line touched by the edit.
    pub from_line: usize,
    /// Number of pre-edit lines the edit spanned (`to.line - from.line + 1`).
    pub removed: usize,
    /// Number of lines the replacement occupies.
    pub added: usize,
    /// Exact pre-edit text of every spanned line.
    pub replaced: Vec<String>,
    /// Position just after the inserted text.
    pub end: Position,
    /// Clipped start of the replaced range.
    pub from: Position,
    /// Clipped end of the replaced range (pre-edit coordinates).
    pub to: Position,
}

impl Splice {
    /// Post-edit line range whose content changed.
    pub fn dirty(&self) -> Range<usize> {
        self.from_line..self.from_line + self.added
    }

    /// Net number of lines added (negative when lines were removed).
    pub fn line_delta(&self) -> isize {
        self.added as isize - self.removed as isize
    }
}

#[derive(Debug, Clone)]
pub struct Buffer {
    lines: Vec<Line>,
}

impl Default for Buffer {
    fn default() -> Self {
        Self {
            lines: vec![Line::default()],
        }
    }
}

impl Buffer {
    /// Build a buffer from text, splitting on any line break.
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: split_text(text).into_iter().map(Line::new).collect(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, idx: usize) -> Option<&Line> {
        self.lines.get(idx)
    }

    /// Mutable access for owners that maintain per-line metadata (styles, marks).
    pub fn line_mut(&mut self, idx: usize) -> Option<&mut Line> {
        self.lines.get_mut(idx)
    }

    pub fn lines(&self) -> impl ExactSizeIterator<Item = &Line> {
        self.lines.iter()
    }

    pub fn lines_mut(&mut self) -> impl ExactSizeIterator<Item = &mut Line> {
        self.lines.iter_mut()
    }

    /// Byte length of a line, 0 for out-of-range indices.
    pub fn line_len(&self, idx: usize) -> usize {
        self.lines.get(idx).map_or(0, Line::len)
    }

    /// Position after the last character of the document.
    pub fn end(&self) -> Position {
        let last = self.lines.len() - 1;
        Position::new(last, self.lines[last].len())
    }

    /// Clamp a position into the buffer: line into `[0, line_count)`, byte offset into
    /// `[0, line_len]`, snapped down to a char boundary.
    pub fn clip_pos(&self, pos: Position) -> Position {
        let line = pos.line.min(self.lines.len() - 1);
        let text = self.lines[line].text();
        let mut ch = pos.ch.min(text.len());
        while !text.is_char_boundary(ch) {
            ch -= 1;
        }
        Position::new(line, ch)
    }

    /// Whole document joined with `\n`.
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(self.lines.iter().map(|l| l.len() + 1).sum());
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(line.text());
        }
        out
    }

    /// Text between two positions, lines joined with `\n`.
    pub fn get_range(&self, from: Position, to: Position) -> Result<String, TextError> {
        if from > to {
            return Err(TextError::UnorderedRange { from, to });
        }
        let from = self.clip_pos(from);
        let to = self.clip_pos(to);
        if from.line == to.line {
            return Ok(self.lines[from.line].text()[from.ch..to.ch].to_owned());
        }
        let mut out = String::from(&self.lines[from.line].text()[from.ch..]);
        for line in &self.lines[from.line + 1..to.line] {
            out.push('\n');
            out.push_str(line.text());
        }
        out.push('\n');
        out.push_str(&self.lines[to.line].text()[..to.ch]);
        Ok(out)
    }

    /// Replace the text between `from` (inclusive) and `to` (exclusive) with
    /// `new_lines`, the replacement already split on line breaks.
    ///
    /// Boundary lines are split and merged so style runs and marks outside the
    /// edited character range survive; the new text is unstyled. An empty
    /// `new_lines` slice is treated as a single empty line.
    pub fn splice<S: AsRef<str>>(
        &mut self,
        from: Position,
        to: Position,
        new_lines: &[S],
    ) -> Result<Splice, TextError> {
        if from > to {
            return Err(TextError::UnorderedRange { from, to });
        }
        let from = self.clip_pos(from);
        let to = self.clip_pos(to);
        let mut new: Vec<&str> = new_lines.iter().map(AsRef::as_ref).collect();
        if new.is_empty() {
            new.push("");
        }
        let added = new.len();
        let replaced: Vec<String> = self.lines[from.line..=to.line]
            .iter()
            .map(|l| l.text().to_owned())
            .collect();

        let end = if from.line == to.line && added == 1 {
            self.lines[from.line].replace_range(from.ch, to.ch, new[0]);
            Position::new(from.line, from.ch + new[0].len())
        } else {
            let tail = self.lines[to.line].split_off(to.ch);
            self.lines.drain(from.line + 1..=to.line);
            let first = &mut self.lines[from.line];
            first.split_off(from.ch);
            first.push_plain(new[0]);
            if added == 1 {
                first.append(tail);
                Position::new(from.line, from.ch + new[0].len())
            } else {
                let mut inserted: Vec<Line> = new[1..added - 1].iter().map(|t| Line::new(*t)).collect();
                let mut last = Line::new(new[added - 1]);
                let end_ch = last.len();
                last.append(tail);
                inserted.push(last);
                self.lines.splice(from.line + 1..from.line + 1, inserted);
                Position::new(from.line + added - 1, end_ch)
            }
        };

        let splice = Splice {
            from_line: from.line,
            removed: to.line - from.line + 1,
            added,
            replaced,
            end,
            from,
            to,
        };
        trace!(
            target: "text.buffer",
            from_line = splice.from_line,
            removed = splice.removed,
            added = splice.added,
            lines = self.lines.len(),
            "splice"
        );
        Ok(splice)
    }

    /// Replace `count` whole lines starting at `start` with `texts` (unstyled),
    /// returning the texts that were removed.
    pub fn replace_lines<S: AsRef<str>>(&mut self, start: usize, count: usize, texts: &[S]) -> Vec<String> {
        let start = start.min(self.lines.len());
        let end = (start + count).min(self.lines.len());
        let removed: Vec<String> = self
            .lines
            .splice(start..end, texts.iter().map(|t| Line::new(t.as_ref())))
            .map(|l| l.text().to_owned())
            .collect();
        if self.lines.is_empty() {
            self.lines.push(Line::default());
        }
        trace!(target: "text.buffer", start, count, added = texts.len(), "replace_lines");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::{MarkId, MarkedSpan};
    use pretty_assertions::assert_eq;
    use std::borrow::Cow;

    fn texts(buf: &Buffer) -> Vec<&str> {
        buf.lines().map(Line::text).collect()
    }

    #[test]
    fn empty_document_has_one_line() {
        let buf = Buffer::from_text("");
        assert_eq!(buf.line_count(), 1);
        assert_eq!(buf.end(), Position::origin());
    }

    #[test]
    fn replace_within_line_reports_dirty_range() {
        let mut buf = Buffer::from_text("a\nbb\nccc");
        let s = buf
            .splice(Position::new(1, 0), Position::new(1, 2), &["X"])
            .unwrap();
        assert_eq!(texts(&buf), vec!["a", "X", "ccc"]);
        assert_eq!(s.dirty(), 1..2);
        assert_eq!(s.replaced, vec!["bb".to_string()]);
        assert_eq!(s.end, Position::new(1, 1));
    }

    #[test]
    fn insert_newline_splits_line() {
        let mut buf = Buffer::from_text("ab");
        let s = buf
            .splice(Position::new(0, 1), Position::new(0, 1), &["", ""])
            .unwrap();
        assert_eq!(texts(&buf), vec!["a", "b"]);
        assert_eq!(s.end, Position::new(1, 0));
        assert_eq!(s.line_delta(), 1);
    }

    #[test]
    fn multi_line_delete_merges_boundaries() {
        let mut buf = Buffer::from_text("one\ntwo\nthree\nfour");
        let s = buf
            .splice(Position::new(0, 2), Position::new(2, 3), &[""])
            .unwrap();
        assert_eq!(texts(&buf), vec!["onee", "four"]);
        assert_eq!(s.removed, 3);
        assert_eq!(s.added, 1);
        assert_eq!(s.replaced, vec!["one", "two", "three"]);
    }

    #[test]
    fn multi_line_insert_preserves_boundary_styles() {
        let mut buf = Buffer::from_text("let x;");
        buf.line_mut(0).unwrap().set_styles(
            [
                (3, Some(Cow::Borrowed("keyword"))),
                (1, None),
                (1, Some(Cow::Borrowed("variable"))),
                (1, None),
            ]
            .into_iter()
            .collect(),
        );
        buf.splice(Position::new(0, 4), Position::new(0, 5), &["a", "b", "c"])
            .unwrap();
        assert_eq!(texts(&buf), vec!["let a", "b", "c;"]);
        let first: Vec<_> = buf.line(0).unwrap().fragments().collect();
        assert_eq!(first, vec![("let", Some("keyword")), (" a", None)]);
        let last: Vec<_> = buf.line(2).unwrap().fragments().collect();
        assert_eq!(last, vec![("c;", None)]);
        assert!(buf.lines().all(Line::is_consistent));
    }

    #[test]
    fn splice_moves_marks_onto_new_last_line() {
        let mut buf = Buffer::from_text("abc def");
        buf.line_mut(0).unwrap().add_mark(MarkedSpan {
            from: 4,
            to: Some(7),
            style: "hl".into(),
            id: MarkId(1),
        });
        buf.splice(Position::new(0, 1), Position::new(0, 2), &["X", "YY"])
            .unwrap();
        assert_eq!(texts(&buf), vec!["aX", "YYc def"]);
        assert!(buf.line(0).unwrap().marks().is_empty());
        let m = &buf.line(1).unwrap().marks()[0];
        assert_eq!((m.from, m.to), (4, Some(7)));
    }

    #[test]
    fn unordered_positions_are_rejected() {
        let mut buf = Buffer::from_text("abc\ndef");
        let err = buf
            .splice(Position::new(1, 0), Position::new(0, 1), &["x"])
            .unwrap_err();
        assert!(matches!(err, TextError::UnorderedRange { .. }));
        assert!(buf.get_range(Position::new(1, 1), Position::new(1, 0)).is_err());
    }

    #[test]
    fn out_of_range_positions_are_clamped() {
        let mut buf = Buffer::from_text("héllo\nx");
        assert_eq!(buf.clip_pos(Position::new(9, 9)), Position::new(1, 1));
        // byte 2 falls inside 'é'; snapped down to its start
        assert_eq!(buf.clip_pos(Position::new(0, 2)), Position::new(0, 1));
        buf.splice(Position::new(1, 0), Position::new(7, 9), &["y"]).unwrap();
        assert_eq!(texts(&buf), vec!["héllo", "y"]);
    }

    #[test]
    fn get_range_spans_lines() {
        let buf = Buffer::from_text("one\ntwo\nthree");
        let s = buf.get_range(Position::new(0, 1), Position::new(2, 2)).unwrap();
        assert_eq!(s, "ne\ntwo\nth");
        assert_eq!(buf.text(), "one\ntwo\nthree");
    }

    #[test]
    fn replace_lines_returns_removed_text() {
        let mut buf = Buffer::from_text("a\nb\nc");
        let removed = buf.replace_lines(1, 2, &["x"]);
        assert_eq!(removed, vec!["b", "c"]);
        assert_eq!(texts(&buf), vec!["a", "x"]);
    }

    #[test]
    fn split_text_handles_all_breaks() {
        assert_eq!(split_text("a\r\nb\rc\nd"), vec!["a", "b", "c", "d"]);
        assert_eq!(split_text(""), vec![""]);
        assert_eq!(split_text("x\n"), vec!["x", ""]);
    }
}
