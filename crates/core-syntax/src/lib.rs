//! Syntax highlighting: the mode contract, built-in modes and the incremental
//! highlighter that keeps per-line style runs up to date in budgeted slices.

mod highlighter;
mod mode;
pub mod modes;
mod registry;
mod stream;
mod work_queue;

pub use highlighter::{HighlightOptions, Highlighter, PassReport, Token};
pub use mode::{DynMode, Mode, ModeConfig};
pub use registry::ModeRegistry;
pub use stream::{CharPattern, StringStream};
pub use work_queue::WorkQueue;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HighlightError {
    /// A mode returned from `token` without consuming input.
    #[error("mode `{mode}` made no progress on line {line} at byte {offset}")]
    Stalled {
        mode: String,
        line: usize,
        offset: usize,
    },
}
