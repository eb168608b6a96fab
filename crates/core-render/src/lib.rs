//! Rendering side of the editing engine.
//!
//! The engine never draws anything itself. It records which lines changed
//! (`scheduler`), decides which rendered rows can be reused and which must be
//! replaced (`planner`), produces per-line markup (`markup`) and applies plans
//! to whatever holds the rows (`apply`).
//!
//! Pipeline per operation:
//! 1. Buffer splices and highlighter restyles are marked on the `RenderScheduler`.
//! 2. The coordinator consumes the batch and asks `planner::plan` for a
//!    `RenderPlan` against the window the view currently shows.
//! 3. `apply::apply_plan` renders only the lines named by the plan and checks
//!    that the sink ends up with one row per line of the new window.
//!
//! A row-count mismatch after applying a plan means the planner or the change
//! log is wrong; it is reported as `RenderError::RowCountMismatch`, never
//! repaired.

pub mod apply;
pub mod markup;
pub mod planner;
pub mod scheduler;

pub use apply::{RowBuffer, RowSink, apply_plan};
pub use markup::line_markup;
pub use planner::{PlanKind, PlannerOptions, RenderPlan, RowUpdate, plan, plan_full};
pub use scheduler::{ChangeBatch, ChangeLogMetricsSnapshot, LineChange, RenderScheduler};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("view holds {actual} rows after patching, expected {expected}")]
    RowCountMismatch { expected: usize, actual: usize },
    #[error("patch removes rows {start}..{} but the view holds {rows}", .start + .remove)]
    MalformedPatch { start: usize, remove: usize, rows: usize },
}
