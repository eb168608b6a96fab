use crate::RenderError;
use crate::planner::{PlanKind, RenderPlan};

/// Destination for rendered rows (a DOM container, a terminal region, a test buffer).
pub trait RowSink {
    fn row_count(&self) -> usize;

    /// Replace `remove` rows starting at `start` with `rows`.
    fn splice_rows(&mut self, start: usize, remove: usize, rows: Vec<String>) -> Result<(), RenderError>;

    fn replace_all(&mut self, rows: Vec<String>);
}

/// In-memory sink holding one markup string per row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowBuffer {
    rows: Vec<String>,
}

impl RowBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }
}

impl RowSink for RowBuffer {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn splice_rows(&mut self, start: usize, remove: usize, rows: Vec<String>) -> Result<(), RenderError> {
        if start + remove > self.rows.len() {
            return Err(RenderError::MalformedPatch {
                start,
                remove,
                rows: self.rows.len(),
            });
        }
        self.rows.splice(start..start + remove, rows);
        Ok(())
    }

    fn replace_all(&mut self, rows: Vec<String>) {
        self.rows = rows;
    }
}

/// Apply `plan` to `sink`, rendering each needed line with `render_line`.
///
/// Updates are applied in order; each one shifts the rows behind it by the
/// difference between lines inserted and rows removed. The sink must end up
/// with exactly `plan.showing.len()` rows.
pub fn apply_plan<S, F>(plan: &RenderPlan, sink: &mut S, mut render_line: F) -> Result<(), RenderError>
where
    S: RowSink + ?Sized,
    F: FnMut(usize) -> String,
{
    match &plan.kind {
        PlanKind::Unchanged => {}
        PlanKind::Full => sink.replace_all(plan.showing.clone().map(&mut render_line).collect()),
        PlanKind::Patch(updates) => {
            let mut offset: isize = 0;
            for update in updates {
                let start = update.slice_start as isize + offset;
                if start < 0 {
                    tracing::error!(target: "render.planner", ?update, offset, "patch_before_first_row");
                    return Err(RenderError::MalformedPatch {
                        start: update.slice_start,
                        remove: update.slice_size,
                        rows: sink.row_count(),
                    });
                }
                let rows: Vec<String> = update.lines().map(&mut render_line).collect();
                offset += rows.len() as isize - update.slice_size as isize;
                sink.splice_rows(start as usize, update.slice_size, rows)?;
            }
        }
    }
    let actual = sink.row_count();
    let expected = plan.showing.len();
    if actual != expected {
        tracing::error!(target: "render.planner", expected, actual, showing = ?plan.showing, "row_count_mismatch");
        return Err(RenderError::RowCountMismatch { expected, actual });
    }
    Ok(())
}
