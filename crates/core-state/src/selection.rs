use core_text::{Buffer, Position, Splice, ordered};
use std::ops::Range;
use tracing::trace;

/// A selection: `anchor` is where it started, `head` where the cursor is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Selection {
    pub anchor: Position,
    pub head: Position,
}

impl Selection {
    pub fn new(anchor: Position, head: Position) -> Self {
        Self { anchor, head }
    }

    /// A collapsed selection at `pos`.
    pub fn cursor(pos: Position) -> Self {
        Self {
            anchor: pos,
            head: pos,
        }
    }

    pub fn from(&self) -> Position {
        self.anchor.min(self.head)
    }

    pub fn to(&self) -> Position {
        self.anchor.max(self.head)
    }

    /// The head sits before the anchor.
    pub fn inverted(&self) -> bool {
        self.head < self.anchor
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    /// Position the caret is drawn at.
    pub fn caret(&self) -> Position {
        self.head
    }
}

/// Effect of a selection update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChange {
    pub old: Selection,
    pub new: Selection,
    /// Line ranges whose selected-ness changed.
    pub dirty: Vec<Range<usize>>,
}

impl SelectionChange {
    pub fn moved(&self) -> bool {
        self.old != self.new
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Line ranges whose selection highlight differs between two selections.
///
/// Only the lines between the moved endpoints are reported; a selection
/// growing by one character on line 500 reports line 500 alone.
fn changed_lines(old: &Selection, new: &Selection) -> Vec<Range<usize>> {
    let (old_from, old_to) = (old.from(), old.to());
    let (from, to) = (new.from(), new.to());
    let mut dirty = Vec::new();
    if from == to {
        if old_from != old_to {
            dirty.push(old_from.line..old_to.line + 1);
        }
    } else if old_from == old_to {
        dirty.push(from.line..to.line + 1);
    } else {
        if from != old_from {
            if from.line < old_from.line {
                dirty.push(from.line..to.line.min(old_from.line) + 1);
            } else {
                dirty.push(old_from.line..old_to.line.min(from.line) + 1);
            }
        }
        if to != old_to {
            if to.line < old_to.line {
                dirty.push(old_from.line.max(from.line)..old_to.line + 1);
            } else {
                dirty.push(from.line.max(old_to.line)..to.line + 1);
            }
        }
    }
    dirty
}

/// Owner of the current selection.
#[derive(Debug, Clone, Default)]
pub struct SelectionModel {
    sel: Selection,
}

impl SelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Selection {
        self.sel
    }

    /// Select from `anchor` to `head`. With `extend`, the current anchor is kept
    /// and only the head moves. Both ends are clipped into the buffer.
    pub fn set(&mut self, buf: &Buffer, anchor: Position, head: Position, extend: bool) -> SelectionChange {
        let anchor = if extend { self.sel.anchor } else { anchor };
        let new = Selection::new(buf.clip_pos(anchor), buf.clip_pos(head));
        let old = std::mem::replace(&mut self.sel, new);
        let dirty = changed_lines(&old, &new);
        if old != new {
            trace!(
                target: "state.selection",
                from = %new.from(),
                to = %new.to(),
                inverted = new.inverted(),
                dirty = dirty.len(),
                "selection_set"
            );
        }
        SelectionChange { old, new, dirty }
    }

    /// Select the word around `pos`, or collapse at `pos` when no word char is adjacent.
    pub fn select_word_at(&mut self, buf: &Buffer, pos: Position) -> SelectionChange {
        let pos = buf.clip_pos(pos);
        let text = buf.line(pos.line).map_or("", |l| l.text());
        let start = text[..pos.ch]
            .char_indices()
            .rev()
            .take_while(|(_, c)| is_word_char(*c))
            .last()
            .map_or(pos.ch, |(i, _)| i);
        let end = text[pos.ch..]
            .char_indices()
            .find(|(_, c)| !is_word_char(*c))
            .map_or(text.len(), |(i, _)| pos.ch + i);
        self.set(
            buf,
            Position::new(pos.line, start),
            Position::new(pos.line, end),
            false,
        )
    }

    /// Carry the selection across an applied splice.
    pub fn map_through(&mut self, splice: &Splice) {
        self.sel = Selection::new(
            map_pos(self.sel.anchor, splice),
            map_pos(self.sel.head, splice),
        );
    }

    /// Clamp both ends into the buffer. Returns whether anything moved.
    pub fn clip(&mut self, buf: &Buffer) -> bool {
        let clipped = Selection::new(buf.clip_pos(self.sel.anchor), buf.clip_pos(self.sel.head));
        let moved = clipped != self.sel;
        self.sel = clipped;
        moved
    }

    /// Ordered ends, for callers that do not care about direction.
    pub fn range(&self) -> (Position, Position) {
        ordered(self.sel.anchor, self.sel.head)
    }
}

/// Map a pre-edit position to its post-edit equivalent.
///
/// Positions before the edit are unchanged, positions after it shift with the
/// text, positions inside it move to the end of the inserted text.
pub fn map_pos(pos: Position, splice: &Splice) -> Position {
    if pos < splice.from {
        return pos;
    }
    if pos >= splice.to {
        if pos.line == splice.to.line {
            return Position::new(splice.end.line, splice.end.ch + (pos.ch - splice.to.ch));
        }
        let line = (pos.line + splice.added).saturating_sub(splice.removed);
        return Position::new(line, pos.ch);
    }
    splice.end
}
