//! The edit coordinator.
//!
//! `EditorModel` is the one context object owning everything an editor
//! instance mutates: the line buffer, undo history, selection, incremental
//! highlighter, render change log, display record and timers. Hosts talk to
//! it through edit intents (`insert_text`, `delete_range`, `set_selection`,
//! `undo`, ...) and drive background work with `tick`.
//!
//! Core invariants (must hold whenever no operation is open):
//! * The buffer has at least one line.
//! * The selection lies inside the buffer.
//! * The display record holds exactly one row per line of its window, and
//!   every row equals a fresh rendering of its line.
//! * Each finished operation queued at most one display patch and notified
//!   each observer at most once per round.
//!
//! Scheduling:
//! * Edits invalidate highlighter state and queue lines; nothing is
//!   re-tokenized synchronously.
//! * Finishing an operation that left work queued arms a debounced
//!   `TimerKind::Highlight` timer (`resume_delay`). Further edits push it back.
//! * `tick` runs due timers. A highlight pass runs within the time budget and,
//!   if work remains, re-arms the timer.
//! * Time comes from the `Clock` handed to `new`, so tests use a `ManualClock`.
//!
//! Read-only editors ignore text-changing intents (logged at debug). Replacing
//! the whole document with `set_value` is still allowed.

mod display;
mod indent;
mod operation;

pub use display::{DisplayPatch, RowPatch, render_row, selection_on_line};
pub use indent::{IndentMode, indent_string};
pub use operation::{Activity, ChangeObserver, ChangeSet, ChangeSpan, MAX_OBSERVER_ROUNDS};

use core_config::EditorOptions;
use core_events::{Clock, TimerQueue};
use core_render::{LineChange, PlannerOptions, RenderError, RenderScheduler};
use core_state::{EditRecord, History, HistorySize, Selection, SelectionChange, SelectionModel};
use core_syntax::{HighlightError, HighlightOptions, Highlighter, ModeConfig, ModeRegistry, PassReport, Token};
use core_text::{
    BracketMatch, Buffer, Line, LineEnding, MarkId, MarkedSpan, Position, SearchCursor, Splice, TextError,
    match_bracket, normalize_line_endings, ordered, split_text,
};
use display::Display;
use operation::OperationState;
use std::ops::Range;
use std::rc::Rc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, trace};

/// Lines scanned in each direction when looking for a matching bracket.
pub const BRACKET_SCAN_LINES: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error(transparent)]
    Text(#[from] TextError),
    #[error(transparent)]
    Highlight(#[from] HighlightError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Highlight,
}

/// Where the selection goes after an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    /// Map the current selection through the edit.
    Keep,
    /// Collapse at the start of the replaced range.
    Start,
    /// Collapse after the inserted text.
    End,
    /// Select the inserted text.
    Around,
}

/// Selection after `replace_selection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectAfter {
    Start,
    #[default]
    End,
    Around,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub passes: usize,
    pub lines_tokenized: usize,
    /// Highlighter queue empty after the tick.
    pub idle: bool,
}

pub struct EditorModel {
    buffer: Buffer,
    line_ending: LineEnding,
    selection: SelectionModel,
    history: History,
    highlighter: Highlighter,
    registry: ModeRegistry,
    options: EditorOptions,
    clock: Rc<dyn Clock>,
    timers: TimerQueue<TimerKind>,
    scheduler: RenderScheduler,
    display: Display,
    op: OperationState,
    observers: Vec<Box<dyn ChangeObserver>>,
    next_mark: u64,
}

impl std::fmt::Debug for EditorModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorModel")
            .field("lines", &self.buffer.line_count())
            .field("selection", &self.selection.get())
            .field("history", &self.history)
            .field("highlighter", &self.highlighter)
            .field("showing", &self.display.showing())
            .finish()
    }
}

fn planner_options(options: &EditorOptions) -> PlannerOptions {
    PlannerOptions {
        overscan: options.overscan,
        full_repaint_ratio: options.full_repaint_ratio,
        full_repaint_margin: options.full_repaint_margin,
    }
}

fn highlight_options(options: &EditorOptions) -> HighlightOptions {
    HighlightOptions {
        time_budget: options.time_budget,
        line_ceiling: options.line_ceiling,
        lookback: options.lookback,
    }
}

fn mode_config(options: &EditorOptions) -> ModeConfig {
    ModeConfig {
        indent_unit: options.indent_unit,
        tab_size: options.tab_size,
    }
}

impl EditorModel {
    /// A model holding `text`, rendered once and with highlighting armed.
    pub fn new(
        text: &str,
        options: EditorOptions,
        registry: ModeRegistry,
        clock: Rc<dyn Clock>,
    ) -> Result<Self, EditorError> {
        let normalized = normalize_line_endings(text);
        if normalized.mixed {
            debug!(target: "text.buffer", dominant = ?normalized.original, "mixed_line_endings_normalized");
        }
        let mode = registry.get(&options.mode);
        let mut model = Self {
            buffer: Buffer::from_text(&normalized.normalized),
            line_ending: normalized.original,
            selection: SelectionModel::new(),
            history: History::new(options.undo_depth, options.coalesce_window),
            highlighter: Highlighter::new(mode, mode_config(&options), highlight_options(&options)),
            registry,
            display: Display::new(planner_options(&options)),
            options,
            clock,
            timers: TimerQueue::new(),
            scheduler: RenderScheduler::new(),
            op: OperationState::default(),
            observers: Vec::new(),
            next_mark: 1,
        };
        model.render_full()?;
        Ok(model)
    }

    // ---------------------------------------------------------------------
    // Read-only views
    // ---------------------------------------------------------------------

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn value(&self) -> String {
        self.buffer.text()
    }

    /// Dominant line ending of the text the editor was created with.
    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn get_range(&self, from: Position, to: Position) -> Result<String, EditorError> {
        Ok(self.buffer.get_range(from, to)?)
    }

    pub fn line(&self, n: usize) -> Option<&Line> {
        self.buffer.line(n)
    }

    pub fn line_count(&self) -> usize {
        self.buffer.line_count()
    }

    pub fn selection(&self) -> Selection {
        self.selection.get()
    }

    pub fn cursor(&self) -> Position {
        self.selection.get().head
    }

    pub fn options(&self) -> &EditorOptions {
        &self.options
    }

    pub fn history_size(&self) -> HistorySize {
        self.history.size()
    }

    pub fn highlighter(&self) -> &Highlighter {
        &self.highlighter
    }

    pub fn render_scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    /// Line window of the rows the view holds.
    pub fn showing(&self) -> Range<usize> {
        self.display.showing()
    }

    /// Current rows of the view, one per line of `showing()`.
    pub fn rows(&self) -> &[String] {
        self.display.rows()
    }

    pub fn take_display_patches(&mut self) -> Vec<DisplayPatch> {
        self.display.take_patches()
    }

    pub fn search_cursor(&self, query: &str, start: Position, fold_case: bool) -> SearchCursor {
        SearchCursor::new(query, self.buffer.clip_pos(start), fold_case)
    }

    /// The bracket next to the cursor and its partner.
    pub fn match_brackets(&self) -> Option<BracketMatch> {
        match_bracket(&self.buffer, self.cursor(), BRACKET_SCAN_LINES)
    }

    /// The token ending at or covering `pos`. May fill tokenizer state caches.
    pub fn token_at(&mut self, pos: Position) -> Result<Token, EditorError> {
        self.operation(|ed| {
            let token = ed.highlighter.token_at(&mut ed.buffer, pos);
            ed.note_cache_restyles();
            Ok(token?)
        })
    }

    // ---------------------------------------------------------------------
    // Edit intents
    // ---------------------------------------------------------------------

    pub(crate) fn read_only_blocks(&self, intent: &'static str) -> bool {
        if self.options.read_only {
            debug!(target: "model.operation", intent, "read_only_ignored");
        }
        self.options.read_only
    }

    /// Insert `text` at `pos` and put the cursor after it. Typing a mode's
    /// electric character re-indents the line.
    pub fn insert_text(&mut self, pos: Position, text: &str) -> Result<(), EditorError> {
        if self.read_only_blocks("insert_text") {
            return Ok(());
        }
        self.operation(|ed| {
            let splice = ed.apply_edit(pos, pos, text, Placement::End)?;
            let mut chars = text.chars();
            if let (Some(c), None) = (chars.next(), chars.next())
                && ed.options.electric_chars
                && ed.highlighter.mode().electric_chars().contains(c)
            {
                ed.indent_line_inner(splice.end.line, IndentMode::Smart)?;
            }
            Ok(())
        })
    }

    /// Delete `[from, to)` and collapse the cursor at `from`.
    pub fn delete_range(&mut self, from: Position, to: Position) -> Result<(), EditorError> {
        if self.read_only_blocks("delete_range") {
            return Ok(());
        }
        self.operation(|ed| ed.apply_edit(from, to, "", Placement::Start).map(drop))
    }

    /// Replace `[from, to)` with `text`; the selection is carried across the edit.
    pub fn replace_range(&mut self, text: &str, from: Position, to: Position) -> Result<(), EditorError> {
        if self.read_only_blocks("replace_range") {
            return Ok(());
        }
        self.operation(|ed| ed.apply_edit(from, to, text, Placement::Keep).map(drop))
    }

    /// Replace the selected text with `text`.
    pub fn replace_selection(&mut self, text: &str, after: SelectAfter) -> Result<(), EditorError> {
        if self.read_only_blocks("replace_selection") {
            return Ok(());
        }
        self.operation(|ed| {
            let (from, to) = ed.selection.range();
            let placement = match after {
                SelectAfter::Start => Placement::Start,
                SelectAfter::End => Placement::End,
                SelectAfter::Around => Placement::Around,
            };
            ed.apply_edit(from, to, text, placement).map(drop)
        })
    }

    /// Select from `anchor` to `head`. With `extend`, the current anchor is kept.
    pub fn set_selection(&mut self, anchor: Position, head: Position, extend: bool) -> Result<(), EditorError> {
        self.operation(|ed| {
            let change = ed.selection.set(&ed.buffer, anchor, head, extend);
            ed.note_selection(&change);
            Ok(())
        })
    }

    pub fn select_word_at(&mut self, pos: Position) -> Result<(), EditorError> {
        self.operation(|ed| {
            let change = ed.selection.select_word_at(&ed.buffer, pos);
            ed.note_selection(&change);
            Ok(())
        })
    }

    pub fn undo(&mut self) -> Result<(), EditorError> {
        if self.read_only_blocks("undo") {
            return Ok(());
        }
        self.operation(|ed| {
            let outcome = ed.history.undo(&mut ed.buffer);
            ed.apply_history_outcome(outcome);
            Ok(())
        })
    }

    pub fn redo(&mut self) -> Result<(), EditorError> {
        if self.read_only_blocks("redo") {
            return Ok(());
        }
        self.operation(|ed| {
            let outcome = ed.history.redo(&mut ed.buffer);
            ed.apply_history_outcome(outcome);
            Ok(())
        })
    }

    /// Replace the whole document. Clears history, restarts highlighting and
    /// collapses the selection at the origin.
    pub fn set_value(&mut self, text: &str) -> Result<(), EditorError> {
        self.operation(|ed| {
            let old_end = ed.buffer.end();
            let normalized = normalize_line_endings(text);
            ed.buffer = Buffer::from_text(&normalized.normalized);
            ed.line_ending = normalized.original;
            ed.history.clear();
            ed.highlighter.reset(&mut ed.buffer);
            let change = ed.selection.set(&ed.buffer, Position::origin(), Position::origin(), false);
            ed.note_selection(&change);
            ed.scheduler.mark_full();
            ed.op.spans.push(ChangeSpan {
                from: Position::origin(),
                to: old_end,
                text: split_text(&normalized.normalized),
            });
            ed.op.activity |= Activity::TEXT;
            debug!(target: "model.operation", lines = ed.buffer.line_count(), "set_value");
            Ok(())
        })
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    // ---------------------------------------------------------------------
    // Decorations
    // ---------------------------------------------------------------------

    /// Decorate `[from, to)` with `style`. The range may span lines.
    pub fn mark_text(&mut self, from: Position, to: Position, style: &str) -> Result<MarkId, EditorError> {
        self.operation(|ed| {
            let (from, to) = ordered(ed.buffer.clip_pos(from), ed.buffer.clip_pos(to));
            let id = MarkId(ed.next_mark);
            ed.next_mark += 1;
            for n in from.line..=to.line {
                let Some(line) = ed.buffer.line_mut(n) else { break };
                line.add_mark(MarkedSpan {
                    from: if n == from.line { from.ch } else { 0 },
                    to: (n == to.line).then_some(to.ch),
                    style: style.to_owned(),
                    id,
                });
            }
            ed.mark_restyle(from.line..to.line + 1);
            trace!(target: "model.operation", id = id.0, %from, %to, style, "mark_text");
            Ok(id)
        })
    }

    /// Remove every span of mark `id`. Returns whether it was present.
    pub fn clear_mark(&mut self, id: MarkId) -> Result<bool, EditorError> {
        self.operation(|ed| {
            let mut touched: Option<Range<usize>> = None;
            for (n, line) in ed.buffer.lines_mut().enumerate() {
                if line.remove_mark(id) {
                    touched = Some(touched.map_or(n..n + 1, |r| r.start..n + 1));
                }
            }
            if let Some(lines) = touched.clone() {
                ed.mark_restyle(lines);
            }
            Ok(touched.is_some())
        })
    }

    /// Current extent of mark `id`.
    pub fn find_mark(&self, id: MarkId) -> Option<(Position, Position)> {
        let mut found = None;
        for (n, line) in self.buffer.lines().enumerate() {
            if let Some(span) = line.marks().iter().find(|m| m.id == id) {
                let end = Position::new(n, span.end(line.len()));
                found = Some(match found {
                    Some((start, _)) => (start, end),
                    None => (Position::new(n, span.from), end),
                });
            }
        }
        found
    }

    pub fn set_line_class(&mut self, n: usize, class: Option<String>) -> Result<bool, EditorError> {
        self.operation(|ed| {
            let Some(line) = ed.buffer.line_mut(n) else {
                return Ok(false);
            };
            line.set_line_class(class);
            ed.mark_restyle(n..n + 1);
            Ok(true)
        })
    }

    pub fn set_gutter_marker(&mut self, n: usize, text: &str) -> Result<bool, EditorError> {
        self.gutter_marker(n, Some(text.to_owned()))
    }

    pub fn clear_gutter_marker(&mut self, n: usize) -> Result<bool, EditorError> {
        self.gutter_marker(n, None)
    }

    fn gutter_marker(&mut self, n: usize, marker: Option<String>) -> Result<bool, EditorError> {
        self.operation(|ed| {
            let Some(line) = ed.buffer.line_mut(n) else {
                return Ok(false);
            };
            line.set_gutter_marker(marker);
            ed.mark_restyle(n..n + 1);
            Ok(true)
        })
    }

    // ---------------------------------------------------------------------
    // Settings
    // ---------------------------------------------------------------------

    /// Switch tokenizer. Unknown names fall back to plain text.
    pub fn set_mode(&mut self, name: &str) -> Result<(), EditorError> {
        self.operation(|ed| {
            let mode = ed.registry.get(name);
            ed.options.mode = name.to_owned();
            ed.highlighter.set_mode(mode, &mut ed.buffer);
            Ok(())
        })
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.options.read_only = read_only;
    }

    /// Tell the model which lines the view wants to show.
    pub fn set_viewport(&mut self, visible: Range<usize>) -> Result<(), EditorError> {
        self.operation(|ed| {
            if ed.display.set_visible(visible) {
                ed.op.activity |= Activity::VIEWPORT;
            }
            Ok(())
        })
    }

    pub fn viewport(&self) -> Range<usize> {
        self.display.visible()
    }

    /// Repaint every visible row.
    pub fn render_full(&mut self) -> Result<(), EditorError> {
        self.operation(|ed| {
            ed.scheduler.mark_full();
            Ok(())
        })
    }

    // ---------------------------------------------------------------------
    // Scheduling
    // ---------------------------------------------------------------------

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Run every timer that is due.
    pub fn tick(&mut self) -> Result<TickReport, EditorError> {
        let mut report = TickReport::default();
        for kind in self.timers.take_due(self.clock.now()) {
            match kind {
                TimerKind::Highlight => {
                    let pass = self.highlight_pass()?;
                    report.passes += 1;
                    report.lines_tokenized += pass.lines_tokenized;
                }
            }
        }
        report.idle = self.highlighter.is_idle();
        Ok(report)
    }

    /// Highlight until the work queue is empty, ignoring the resume delay.
    /// Returns the number of passes run.
    pub fn highlight_until_idle(&mut self) -> Result<usize, EditorError> {
        let mut passes = 0;
        while !self.highlighter.is_idle() {
            self.highlight_pass()?;
            passes += 1;
        }
        self.timers.cancel(TimerKind::Highlight);
        Ok(passes)
    }

    fn highlight_pass(&mut self) -> Result<PassReport, EditorError> {
        self.operation(|ed| {
            let pass = ed.highlighter.highlight_pass(&mut ed.buffer, &*ed.clock)?;
            if let Some(lines) = pass.restyled.clone() {
                ed.mark_restyle(lines);
                ed.op.activity |= Activity::STYLES;
            }
            Ok(pass)
        })
    }

    // ---------------------------------------------------------------------
    // Primitives (callers hold an open operation)
    // ---------------------------------------------------------------------

    /// Splice the buffer and bring every dependent structure along.
    pub(crate) fn apply_edit(
        &mut self,
        from: Position,
        to: Position,
        text: &str,
        placement: Placement,
    ) -> Result<Splice, EditorError> {
        let lines = split_text(text);
        let before = self.selection.get();
        let splice = self.buffer.splice(from, to, &lines)?;
        self.highlighter.invalidate(&splice);
        self.scheduler.mark(LineChange::edit(
            splice.from_line,
            splice.from_line + splice.removed,
            splice.line_delta(),
        ));
        self.selection.map_through(&splice);
        let target = match placement {
            Placement::Keep => None,
            Placement::Start => Some(Selection::cursor(splice.from)),
            Placement::End => Some(Selection::cursor(splice.end)),
            Placement::Around => Some(Selection::new(splice.from, splice.end)),
        };
        if let Some(target) = target {
            let change = self.selection.set(&self.buffer, target.anchor, target.head, false);
            self.note_selection(&change);
        }
        self.history
            .record_edit(EditRecord::from(&splice), before, self.selection.get(), self.clock.now());
        self.op.spans.push(ChangeSpan {
            from: splice.from,
            to: splice.to,
            text: lines,
        });
        self.op.activity |= Activity::TEXT;
        Ok(splice)
    }

    fn apply_history_outcome(&mut self, outcome: Option<core_state::UndoOutcome>) {
        let Some(outcome) = outcome else {
            trace!(target: "model.operation", "history_empty");
            return;
        };
        let start = outcome.start;
        self.highlighter.invalidate_lines(start, outcome.removed, outcome.added);
        self.scheduler.mark(LineChange::edit(
            start,
            start + outcome.removed,
            outcome.added as isize - outcome.removed as isize,
        ));
        let last_removed = outcome.removed_text.last().map_or(0, String::len);
        let text = (start..start + outcome.added)
            .filter_map(|n| self.buffer.line(n).map(|l| l.text().to_owned()))
            .collect();
        self.op.spans.push(ChangeSpan {
            from: Position::new(start, 0),
            to: Position::new(start + outcome.removed.saturating_sub(1), last_removed),
            text,
        });
        self.op.activity |= Activity::TEXT;
        // Bring the old selection into post-undo lines so its dirty rows are the ones it painted.
        let end = match outcome.added {
            0 => Position::new(start, 0),
            added => {
                let last = start + added - 1;
                Position::new(last, self.buffer.line(last).map_or(0, Line::len))
            }
        };
        self.selection.map_through(&Splice {
            from_line: start,
            removed: outcome.removed,
            added: outcome.added,
            replaced: Vec::new(),
            end,
            from: Position::new(start, 0),
            to: Position::new(start + outcome.removed.saturating_sub(1), last_removed),
        });
        let change = self
            .selection
            .set(&self.buffer, outcome.selection.anchor, outcome.selection.head, false);
        self.note_selection(&change);
    }

    fn note_selection(&mut self, change: &SelectionChange) {
        if !change.moved() {
            return;
        }
        self.op.activity |= Activity::SELECTION;
        for lines in &change.dirty {
            self.mark_restyle(lines.clone());
        }
    }

    /// Repaint lines the highlighter styled while filling states on demand.
    pub(crate) fn note_cache_restyles(&mut self) {
        if let Some(lines) = self.highlighter.take_restyled() {
            self.mark_restyle(lines);
            self.op.activity |= Activity::STYLES;
        }
    }

    fn mark_restyle(&mut self, lines: Range<usize>) {
        let end = lines.end.min(self.buffer.line_count());
        if lines.start < end {
            self.scheduler.mark(LineChange::restyle(lines.start..end));
        }
    }
}
