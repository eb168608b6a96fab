//! Editor state that lives next to the buffer: undo history and selection.
//!
//! History:
//! - Every buffer splice is recorded as an [`EditRecord`]: the first line it
//!   touched, how many lines the result occupies, and the exact text of the
//!   lines it replaced. Undo swaps those lines back in; the swapped-out lines
//!   become the redo record.
//! - Consecutive edits coalesce into one unit when they arrive within the
//!   coalescing window (measured from the previous edit) and touch or overlap
//!   the unit's current line span. Typing a word undoes as one step; an edit
//!   elsewhere in the document, or after a pause, starts a new unit.
//! - Units remember the selection before and after, so undo restores the
//!   selection the user had when the unit began.
//!
//! Selection:
//! - `anchor` stays put while `head` moves; `from`/`to` are the ordered ends.
//! - Selection changes report the minimal line ranges whose selected-ness
//!   changed so the renderer can restyle only those rows.

pub mod selection;
pub mod undo;

pub use selection::{Selection, SelectionChange, SelectionModel};
pub use undo::{EditRecord, History, HistorySize, UndoOutcome};
