//! Operation boundaries and change notification.
//!
//! Every mutation of the model runs inside an operation. Operations nest; only
//! the outermost one finishes, and finishing does, in order:
//! 1. re-clip the selection against the buffer,
//! 2. hand the render change log to the planner and queue a display patch,
//! 3. arm the highlight timer if the work queue is non-empty,
//! 4. notify observers once with everything that changed.
//!
//! Observers get `&mut EditorModel` and may edit. Those edits run inside the
//! still-open operation and are finished and reported in a follow-up round.
//! Rounds are bounded; an observer that keeps editing in response to its own
//! edits is cut off with a warning.

use crate::{EditorError, EditorModel, TimerKind};
use bitflags::bitflags;
use core_state::Selection;
use core_text::Position;
use tracing::{trace, warn};

/// Follow-up notification rounds allowed per outermost operation.
pub const MAX_OBSERVER_ROUNDS: usize = 8;

bitflags! {
    /// What an operation touched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Activity: u8 {
        const TEXT = 1;
        const SELECTION = 1 << 1;
        const STYLES = 1 << 2;
        const VIEWPORT = 1 << 3;
    }
}

/// One primitive text change: `[from, to)` (pre-change coordinates) was
/// replaced by `text`, already split into lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSpan {
    pub from: Position,
    pub to: Position,
    pub text: Vec<String>,
}

/// Everything one operation changed, in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub spans: Vec<ChangeSpan>,
    pub activity: Activity,
    /// Selection once the operation finished.
    pub selection: Selection,
}

/// Receiver of per-operation notifications. Every hook is a no-op by default.
pub trait ChangeObserver {
    fn on_change(&mut self, _editor: &mut EditorModel, _changes: &ChangeSet) {}

    fn on_cursor_activity(&mut self, _editor: &mut EditorModel, _selection: Selection) {}
}

#[derive(Debug, Default)]
pub(crate) struct OperationState {
    pub(crate) depth: usize,
    pub(crate) spans: Vec<ChangeSpan>,
    pub(crate) activity: Activity,
    selection_at_start: Option<Selection>,
}

impl EditorModel {
    /// Run `f` as one atomic operation.
    ///
    /// The operation is finished even when `f` fails; `f`'s error wins over a
    /// failure while finishing.
    pub fn operation<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R, EditorError>) -> Result<R, EditorError> {
        self.begin_operation();
        let result = f(self);
        let finished = self.end_operation();
        let value = result?;
        finished?;
        Ok(value)
    }

    /// Whether an operation is currently open.
    pub fn in_operation(&self) -> bool {
        self.op.depth > 0
    }

    fn begin_operation(&mut self) {
        if self.op.depth == 0 {
            self.op.selection_at_start = Some(self.selection.get());
        }
        self.op.depth += 1;
    }

    fn end_operation(&mut self) -> Result<(), EditorError> {
        self.op.depth = self.op.depth.saturating_sub(1);
        if self.op.depth > 0 {
            return Ok(());
        }
        let mut round = 0;
        loop {
            self.finish_round()?;
            let spans = std::mem::take(&mut self.op.spans);
            let activity = std::mem::take(&mut self.op.activity);
            let before = self.op.selection_at_start.take();
            let selection = self.selection.get();
            let cursor_moved = before.is_some_and(|b| b != selection);
            trace!(
                target: "model.operation",
                round,
                spans = spans.len(),
                ?activity,
                cursor_moved,
                "operation_end"
            );
            if (spans.is_empty() && !cursor_moved) || self.observers.is_empty() {
                break;
            }
            round += 1;
            if round > MAX_OBSERVER_ROUNDS {
                warn!(target: "model.operation", rounds = MAX_OBSERVER_ROUNDS, dropped = spans.len(), "observer_rounds_exhausted");
                break;
            }
            let changes = ChangeSet {
                spans,
                activity,
                selection,
            };
            self.op.depth += 1;
            self.op.selection_at_start = Some(selection);
            let mut observers = std::mem::take(&mut self.observers);
            for observer in observers.iter_mut() {
                if !changes.spans.is_empty() {
                    observer.on_change(self, &changes);
                }
                if cursor_moved {
                    observer.on_cursor_activity(self, selection);
                }
            }
            // keep observers registered during notification
            observers.append(&mut self.observers);
            self.observers = observers;
            self.op.depth -= 1;
        }
        self.op.selection_at_start = None;
        Ok(())
    }

    fn finish_round(&mut self) -> Result<(), EditorError> {
        if self.selection.clip(&self.buffer) {
            self.op.activity |= Activity::SELECTION;
        }
        let batch = self.scheduler.consume();
        self.display.update(batch, &self.buffer, self.selection.get())?;
        if !self.highlighter.is_idle()
            && (self.op.activity.contains(Activity::TEXT) || self.timers.pending(TimerKind::Highlight).is_none())
        {
            self.timers
                .schedule(TimerKind::Highlight, self.options.resume_delay, self.clock.now());
        }
        Ok(())
    }

    pub fn add_observer(&mut self, observer: Box<dyn ChangeObserver>) {
        self.observers.push(observer);
    }
}
