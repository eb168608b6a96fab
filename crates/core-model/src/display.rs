use core_render::{
    ChangeBatch, PlanKind, PlannerOptions, RenderError, RowBuffer, RowSink, apply_plan, line_markup, plan,
};
use core_state::Selection;
use core_text::Buffer;
use std::ops::Range;

/// Rows replacing old rows `[slice_start, slice_start + slice_size)`; the first
/// row renders line `from_line`. Slices refer to the rows before the patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowPatch {
    pub slice_start: usize,
    pub slice_size: usize,
    pub from_line: usize,
    pub rows: Vec<String>,
}

/// What the view must do after an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayPatch {
    /// Rows stay as they are; only the line numbering may have moved.
    Unchanged { showing: Range<usize> },
    Rows { showing: Range<usize>, patches: Vec<RowPatch> },
    Full { showing: Range<usize>, rows: Vec<String> },
}

impl DisplayPatch {
    pub fn showing(&self) -> &Range<usize> {
        match self {
            DisplayPatch::Unchanged { showing }
            | DisplayPatch::Rows { showing, .. }
            | DisplayPatch::Full { showing, .. } => showing,
        }
    }
}

/// Selected byte range of `line`, if the selection touches it.
pub fn selection_on_line(sel: Selection, line: usize) -> Option<(usize, Option<usize>)> {
    let (from, to) = (sel.from(), sel.to());
    if sel.is_empty() || line < from.line || line > to.line {
        return None;
    }
    let start = if line == from.line { from.ch } else { 0 };
    let end = (line == to.line).then_some(to.ch);
    if end == Some(start) {
        return None;
    }
    Some((start, end))
}

pub fn render_row(buf: &Buffer, line: usize, sel: Selection) -> String {
    buf.line(line)
        .map(|l| line_markup(l, selection_on_line(sel, line), true))
        .unwrap_or_default()
}

/// The model's record of what the view shows, kept in step with every patch
/// so the row-count invariant is checked on each operation.
#[derive(Debug)]
pub(crate) struct Display {
    options: PlannerOptions,
    visible: Range<usize>,
    showing: Range<usize>,
    rows: RowBuffer,
    viewport_changed: bool,
    patches: Vec<DisplayPatch>,
}

impl Display {
    pub(crate) fn new(options: PlannerOptions) -> Self {
        Self {
            options,
            visible: 0..0,
            showing: 0..0,
            rows: RowBuffer::new(),
            viewport_changed: false,
            patches: Vec::new(),
        }
    }

    pub(crate) fn visible(&self) -> Range<usize> {
        self.visible.clone()
    }

    pub(crate) fn set_visible(&mut self, visible: Range<usize>) -> bool {
        if visible == self.visible {
            return false;
        }
        self.visible = visible;
        self.viewport_changed = true;
        true
    }

    pub(crate) fn showing(&self) -> Range<usize> {
        self.showing.clone()
    }

    pub(crate) fn rows(&self) -> &[String] {
        self.rows.rows()
    }

    pub(crate) fn take_patches(&mut self) -> Vec<DisplayPatch> {
        std::mem::take(&mut self.patches)
    }

    /// Plan and apply `batch`. Nothing happens when nothing changed and the
    /// viewport stayed put.
    pub(crate) fn update(&mut self, batch: Option<ChangeBatch>, buf: &Buffer, sel: Selection) -> Result<(), RenderError> {
        if batch.is_none() && !std::mem::take(&mut self.viewport_changed) {
            return Ok(());
        }
        self.viewport_changed = false;
        let batch = batch.unwrap_or(ChangeBatch::Lines(Vec::new()));
        let plan = plan(
            self.showing.clone(),
            &batch,
            self.visible.clone(),
            buf.line_count(),
            &self.options,
        );
        let mut rendered = Vec::with_capacity(plan.rendered_lines());
        apply_plan(&plan, &mut self.rows, |n| {
            let row = render_row(buf, n, sel);
            rendered.push(row.clone());
            row
        })?;
        let showing = plan.showing.clone();
        let patch = match plan.kind {
            PlanKind::Unchanged => DisplayPatch::Unchanged { showing },
            PlanKind::Full => DisplayPatch::Full { showing, rows: rendered },
            PlanKind::Patch(updates) => {
                let mut rendered = rendered.into_iter();
                let patches = updates
                    .iter()
                    .map(|u| RowPatch {
                        slice_start: u.slice_start,
                        slice_size: u.slice_size,
                        from_line: u.from_line,
                        rows: rendered.by_ref().take(u.to_line - u.from_line).collect(),
                    })
                    .collect();
                DisplayPatch::Rows { showing, patches }
            }
        };
        tracing::trace!(
            target: "render.planner",
            showing = ?plan.showing,
            rows = self.rows.row_count(),
            "display_updated"
        );
        self.showing = plan.showing;
        self.patches.push(patch);
        Ok(())
    }
}
