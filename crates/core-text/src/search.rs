//! Literal text search over a buffer.
//!
//! Queries may span lines. Case folding is ASCII-only so byte offsets in the
//! folded text line up with the original.

use crate::buffer::{Buffer, split_text};
use crate::Position;

#[derive(Debug, Clone)]
pub struct SearchCursor {
    query: Vec<String>,
    fold_case: bool,
    pos: Position,
    found: Option<(Position, Position)>,
}

impl SearchCursor {
    /// A cursor searching for `query` starting at `start`.
    pub fn new(query: &str, start: Position, fold_case: bool) -> Self {
        let mut query = split_text(query);
        if fold_case {
            query.iter_mut().for_each(|q| q.make_ascii_lowercase());
        }
        Self {
            query,
            fold_case,
            pos: start,
            found: None,
        }
    }

    /// Start of the current match.
    pub fn from(&self) -> Option<Position> {
        self.found.map(|(f, _)| f)
    }

    /// End of the current match.
    pub fn to(&self) -> Option<Position> {
        self.found.map(|(_, t)| t)
    }

    /// Move the cursor without searching; clears the current match.
    pub fn seek(&mut self, pos: Position) {
        self.pos = pos;
        self.found = None;
    }

    fn fold<'a>(&self, text: &'a str) -> std::borrow::Cow<'a, str> {
        if self.fold_case {
            text.to_ascii_lowercase().into()
        } else {
            text.into()
        }
    }

    fn is_empty_query(&self) -> bool {
        self.query.len() == 1 && self.query[0].is_empty()
    }

    /// Advance to the next match at or after the cursor.
    pub fn find_next(&mut self, buf: &Buffer) -> Option<(Position, Position)> {
        if self.is_empty_query() {
            self.found = None;
            return None;
        }
        let start = match self.found {
            Some((_, to)) => to,
            None => buf.clip_pos(self.pos),
        };
        self.found = if self.query.len() == 1 {
            self.next_single(buf, start)
        } else {
            self.next_multi(buf, start)
        };
        if let Some((_, to)) = self.found {
            self.pos = to;
        }
        self.found
    }

    /// Step back to the closest match ending at or before the cursor.
    pub fn find_previous(&mut self, buf: &Buffer) -> Option<(Position, Position)> {
        if self.is_empty_query() {
            self.found = None;
            return None;
        }
        let end = match self.found {
            Some((from, _)) => from,
            None => buf.clip_pos(self.pos),
        };
        self.found = if self.query.len() == 1 {
            self.prev_single(buf, end)
        } else {
            self.prev_multi(buf, end)
        };
        if let Some((from, _)) = self.found {
            self.pos = from;
        }
        self.found
    }

    fn next_single(&self, buf: &Buffer, start: Position) -> Option<(Position, Position)> {
        let q = &self.query[0];
        for (idx, line) in buf.lines().enumerate().skip(start.line) {
            let text = self.fold(line.text());
            let from_ch = if idx == start.line { start.ch } else { 0 };
            if let Some(off) = text.get(from_ch..).and_then(|t| t.find(q.as_str())) {
                let ch = from_ch + off;
                return Some((Position::new(idx, ch), Position::new(idx, ch + q.len())));
            }
        }
        None
    }

    fn prev_single(&self, buf: &Buffer, end: Position) -> Option<(Position, Position)> {
        let q = &self.query[0];
        for idx in (0..=end.line.min(buf.line_count() - 1)).rev() {
            let line = buf.line(idx)?;
            let text = self.fold(line.text());
            let to_ch = if idx == end.line { end.ch.min(text.len()) } else { text.len() };
            if let Some(ch) = text.get(..to_ch).and_then(|t| t.rfind(q.as_str())) {
                return Some((Position::new(idx, ch), Position::new(idx, ch + q.len())));
            }
        }
        None
    }

    /// A multi-line match starting on `first`: the first query line is a suffix
    /// of that line, inner lines match whole, the last query line is a prefix.
    fn match_at(&self, buf: &Buffer, first: usize) -> Option<(Position, Position)> {
        let n = self.query.len();
        if first + n > buf.line_count() {
            return None;
        }
        let head = self.fold(buf.line(first)?.text());
        if !head.ends_with(self.query[0].as_str()) {
            return None;
        }
        for (i, q) in self.query[1..n - 1].iter().enumerate() {
            if self.fold(buf.line(first + 1 + i)?.text()) != q.as_str() {
                return None;
            }
        }
        let last_q = &self.query[n - 1];
        if !self.fold(buf.line(first + n - 1)?.text()).starts_with(last_q.as_str()) {
            return None;
        }
        Some((
            Position::new(first, head.len() - self.query[0].len()),
            Position::new(first + n - 1, last_q.len()),
        ))
    }

    fn next_multi(&self, buf: &Buffer, start: Position) -> Option<(Position, Position)> {
        (start.line..buf.line_count())
            .filter_map(|l| self.match_at(buf, l))
            .find(|(from, _)| *from >= start)
    }

    fn prev_multi(&self, buf: &Buffer, end: Position) -> Option<(Position, Position)> {
        (0..=end.line.min(buf.line_count() - 1))
            .rev()
            .filter_map(|l| self.match_at(buf, l))
            .find(|(_, to)| *to <= end)
    }
}
