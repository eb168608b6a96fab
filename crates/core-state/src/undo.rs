use crate::selection::Selection;
use core_text::{Buffer, Position, Splice};
use std::time::{Duration, Instant};
use tracing::trace;

/// Default number of units retained.
pub const UNDO_DEPTH_DEFAULT: usize = 40;
/// Default coalescing window.
pub const COALESCE_WINDOW_DEFAULT: Duration = Duration::from_millis(400);

/// Line-granular description of one change.
///
/// Applying the change turned the `replaced.len()` lines starting at `start`
/// into `added` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRecord {
    pub start: usize,
    pub added: usize,
    pub replaced: Vec<String>,
}

impl From<&Splice> for EditRecord {
    fn from(splice: &Splice) -> Self {
        Self {
            start: splice.from_line,
            added: splice.added,
            replaced: splice.replaced.clone(),
        }
    }
}

impl EditRecord {
    /// Whether `next`, applied after this record, touches or overlaps its span.
    fn touches(&self, next: &EditRecord) -> bool {
        let (a, na) = (self.start, self.added);
        let (b, rb) = (next.start, next.replaced.len());
        b <= a + na && b + rb >= a
    }

    /// Fold `next` into this record so it describes both edits as one.
    fn absorb(&mut self, next: EditRecord) {
        let (a, na) = (self.start, self.added);
        let (b, nb, lb) = (next.start, next.added, next.replaced.len());
        let end_before = (a + na).max(b + lb);
        let mut replaced = Vec::with_capacity(self.replaced.len() + lb);
        if b < a {
            replaced.extend_from_slice(&next.replaced[..a - b]);
        }
        replaced.append(&mut self.replaced);
        if b + lb > a + na {
            replaced.extend_from_slice(&next.replaced[a + na - b..]);
        }
        let start = a.min(b);
        self.start = start;
        self.added = end_before + nb - lb - start;
        self.replaced = replaced;
    }
}

#[derive(Debug, Clone)]
struct UndoUnit {
    record: EditRecord,
    selection_before: Selection,
    selection_after: Selection,
}

/// Result of an undo or redo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoOutcome {
    /// First line changed.
    pub start: usize,
    /// Lines removed from the buffer.
    pub removed: usize,
    /// Text of the removed lines.
    pub removed_text: Vec<String>,
    /// Lines put back in their place.
    pub added: usize,
    /// End of the restored text.
    pub cursor: Position,
    /// Selection to restore.
    pub selection: Selection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistorySize {
    pub undo: usize,
    pub redo: usize,
}

pub struct History {
    done: Vec<UndoUnit>,
    undone: Vec<UndoUnit>,
    max_depth: usize,
    coalesce_window: Duration,
    last_edit: Option<Instant>,
    units_coalesced: u64,
}

impl Default for History {
    fn default() -> Self {
        Self::new(UNDO_DEPTH_DEFAULT, COALESCE_WINDOW_DEFAULT)
    }
}

impl std::fmt::Debug for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History")
            .field("size", &self.size())
            .field("max_depth", &self.max_depth)
            .field("coalesce_window", &self.coalesce_window)
            .finish_non_exhaustive()
    }
}

impl History {
    pub fn new(max_depth: usize, coalesce_window: Duration) -> Self {
        Self {
            done: Vec::new(),
            undone: Vec::new(),
            max_depth,
            coalesce_window,
            last_edit: None,
            units_coalesced: 0,
        }
    }

    pub fn size(&self) -> HistorySize {
        HistorySize {
            undo: self.done.len(),
            redo: self.undone.len(),
        }
    }

    /// Number of edits folded into an existing unit so far.
    pub fn units_coalesced(&self) -> u64 {
        self.units_coalesced
    }

    pub fn clear(&mut self) {
        self.done.clear();
        self.undone.clear();
        self.last_edit = None;
        trace!(target: "state.undo", "history_cleared");
    }

    pub fn set_max_depth(&mut self, depth: usize) {
        self.max_depth = depth;
        self.trim();
    }

    pub fn set_coalesce_window(&mut self, window: Duration) {
        self.coalesce_window = window;
    }

    /// Force the next edit into a fresh unit.
    pub fn break_coalescing(&mut self) {
        self.last_edit = None;
    }

    fn trim(&mut self) {
        if self.done.len() > self.max_depth {
            let excess = self.done.len() - self.max_depth;
            self.done.drain(..excess);
            trace!(target: "state.undo", excess, undo_depth = self.done.len(), "undo_stack_trimmed");
        }
    }

    /// Record an applied edit. Clears the redo stack.
    pub fn record_edit(&mut self, record: EditRecord, selection_before: Selection, selection_after: Selection, now: Instant) {
        if !self.undone.is_empty() {
            self.undone.clear();
            trace!(target: "state.undo", "redo_stack_cleared_on_new_edit");
        }
        let within = self
            .last_edit
            .is_some_and(|last| now.saturating_duration_since(last) <= self.coalesce_window);
        self.last_edit = Some(now);
        if within
            && let Some(last) = self.done.last_mut()
            && last.record.touches(&record)
        {
            last.record.absorb(record);
            last.selection_after = selection_after;
            self.units_coalesced += 1;
            trace!(
                target: "state.undo",
                start = last.record.start,
                added = last.record.added,
                replaced = last.record.replaced.len(),
                "coalesce_edit"
            );
            return;
        }
        self.done.push(UndoUnit {
            record,
            selection_before,
            selection_after,
        });
        trace!(target: "state.undo", undo_depth = self.done.len(), "push_unit");
        self.trim();
    }

    fn apply(buf: &mut Buffer, unit: &UndoUnit, restore: Selection) -> (UndoOutcome, EditRecord) {
        let EditRecord { start, added, replaced } = &unit.record;
        let removed = buf.replace_lines(*start, *added, replaced);
        let last = (*start + replaced.len()).saturating_sub(1).min(buf.line_count() - 1);
        let outcome = UndoOutcome {
            start: *start,
            removed: removed.len(),
            removed_text: removed.clone(),
            added: replaced.len(),
            cursor: Position::new(last, buf.line_len(last)),
            selection: restore,
        };
        let inverse = EditRecord {
            start: *start,
            added: replaced.len(),
            replaced: removed,
        };
        (outcome, inverse)
    }

    /// Revert the most recent unit. `None` when there is nothing to undo.
    pub fn undo(&mut self, buf: &mut Buffer) -> Option<UndoOutcome> {
        let unit = self.done.pop()?;
        let (outcome, inverse) = Self::apply(buf, &unit, unit.selection_before);
        self.undone.push(UndoUnit { record: inverse, ..unit });
        self.last_edit = None;
        trace!(target: "state.undo", undo_depth = self.done.len(), redo_depth = self.undone.len(), "undo_pop");
        Some(outcome)
    }

    /// Re-apply the most recently undone unit. `None` when there is nothing to redo.
    pub fn redo(&mut self, buf: &mut Buffer) -> Option<UndoOutcome> {
        let unit = self.undone.pop()?;
        let (outcome, inverse) = Self::apply(buf, &unit, unit.selection_after);
        self.done.push(UndoUnit { record: inverse, ..unit });
        self.last_edit = None;
        trace!(target: "state.undo", undo_depth = self.done.len(), redo_depth = self.undone.len(), "redo_pop");
        Some(outcome)
    }
}
