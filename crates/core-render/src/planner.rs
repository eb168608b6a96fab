//! Render diff planner.
//!
//! Reconciles the rows a view currently shows with the document after a batch
//! of line changes. Rows whose lines survived untouched ("intact" ranges) are
//! reused; every gap between them becomes a `RowUpdate` that replaces a slice of
//! the old rows with freshly rendered lines.
//!
//! Steps:
//! 1. The previous window is one intact range starting at row 0.
//! 2. Each change, in recording order, punches a hole: ranges after it shift by
//!    its delta, ranges straddling it split into a prefix and a shifted suffix.
//! 3. The new window is the previous one mapped through the changes, widened to
//!    cover the visible lines plus overscan and narrowed to the visible lines
//!    plus the full-repaint margin. Intact ranges are clipped to it.
//! 4. When more than `full_repaint_ratio` of the window would be re-rendered, a
//!    full repaint of the visible lines plus margin is planned instead.
//!
//! Invariant: applying a plan to `showing.len()` old rows leaves exactly
//! `plan.showing.len()` rows.

use crate::scheduler::{ChangeBatch, LineChange};
use std::ops::Range;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannerOptions {
    /// Lines rendered beyond each edge of the visible range.
    pub overscan: usize,
    /// Fraction of the window that may change before patching gives way to a full repaint.
    pub full_repaint_ratio: f64,
    /// Lines kept around the visible range on a full repaint, and the farthest a window may reach.
    pub full_repaint_margin: usize,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            overscan: 3,
            full_repaint_ratio: 0.3,
            full_repaint_margin: 100,
        }
    }
}

/// Replace old rows `[slice_start, slice_start + slice_size)` with lines
/// `[from_line, to_line)`. Slice coordinates refer to the rows as they were
/// before the plan; appliers track the running offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowUpdate {
    pub from_line: usize,
    pub to_line: usize,
    pub slice_start: usize,
    pub slice_size: usize,
}

impl RowUpdate {
    pub fn lines(&self) -> Range<usize> {
        self.from_line..self.to_line
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanKind {
    Unchanged,
    Patch(Vec<RowUpdate>),
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPlan {
    /// Line window the view shows once the plan is applied.
    pub showing: Range<usize>,
    pub kind: PlanKind,
}

impl RenderPlan {
    /// Number of lines that must be rendered to apply this plan.
    pub fn rendered_lines(&self) -> usize {
        match &self.kind {
            PlanKind::Unchanged => 0,
            PlanKind::Patch(updates) => updates.iter().map(|u| u.to_line - u.from_line).sum(),
            PlanKind::Full => self.showing.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Intact {
    from: usize,
    to: usize,
    row: usize,
}

fn shift(pos: usize, delta: isize) -> usize {
    (pos as isize + delta).max(0) as usize
}

fn punch(intact: Vec<Intact>, change: &LineChange) -> Vec<Intact> {
    let mut out = Vec::with_capacity(intact.len() + 1);
    for r in intact {
        if change.to <= r.from {
            out.push(Intact {
                from: shift(r.from, change.delta),
                to: shift(r.to, change.delta),
                row: r.row,
            });
        } else if r.to <= change.from {
            out.push(r);
        } else {
            if change.from > r.from {
                out.push(Intact {
                    from: r.from,
                    to: change.from,
                    row: r.row,
                });
            }
            if change.to < r.to {
                out.push(Intact {
                    from: shift(change.to, change.delta),
                    to: shift(r.to, change.delta),
                    row: r.row + (change.to - r.from),
                });
            }
        }
    }
    out
}

fn map_start(pos: usize, change: &LineChange) -> usize {
    if pos >= change.to {
        shift(pos, change.delta)
    } else if pos > change.from {
        change.from
    } else {
        pos
    }
}

fn map_end(pos: usize, change: &LineChange) -> usize {
    if pos >= change.to {
        shift(pos, change.delta)
    } else if pos > change.from {
        change.new_to()
    } else {
        pos
    }
}

fn full_window(visible: &Range<usize>, line_count: usize, margin: usize) -> Range<usize> {
    visible.start.saturating_sub(margin)..(visible.end + margin).min(line_count)
}

/// A full repaint of the visible lines plus margin.
pub fn plan_full(visible: Range<usize>, line_count: usize, options: &PlannerOptions) -> RenderPlan {
    let visible = clamp_visible(visible, line_count);
    let showing = full_window(&visible, line_count, options.full_repaint_margin);
    trace!(target: "render.planner", ?showing, "plan_full");
    RenderPlan {
        showing,
        kind: PlanKind::Full,
    }
}

fn clamp_visible(visible: Range<usize>, line_count: usize) -> Range<usize> {
    let start = visible.start.min(line_count);
    start..visible.end.clamp(start, line_count)
}

/// Plan the row updates that bring a view showing `showing` in line with the
/// document after `batch`. `visible` and `line_count` are post-change values.
pub fn plan(
    showing: Range<usize>,
    batch: &ChangeBatch,
    visible: Range<usize>,
    line_count: usize,
    options: &PlannerOptions,
) -> RenderPlan {
    let changes = match batch {
        ChangeBatch::Lines(changes) if !showing.is_empty() => changes.as_slice(),
        _ => return plan_full(visible, line_count, options),
    };
    let visible = clamp_visible(visible, line_count);
    let old_rows = showing.len();

    let mut intact = vec![Intact {
        from: showing.start,
        to: showing.end,
        row: 0,
    }];
    let (mut mapped_from, mut mapped_to) = (showing.start, showing.end);
    for change in changes {
        intact = punch(intact, change);
        mapped_from = map_start(mapped_from, change);
        mapped_to = map_end(mapped_to, change);
    }

    let margin = options.full_repaint_margin;
    let from = mapped_from
        .min(visible.start.saturating_sub(options.overscan))
        .max(visible.start.saturating_sub(margin));
    let to = mapped_to
        .max(visible.end + options.overscan)
        .min(line_count)
        .min(visible.end + margin);

    intact.retain_mut(|r| {
        if r.from < from {
            r.row += from - r.from;
            r.from = from;
        }
        r.to = r.to.min(to);
        r.from < r.to
    });
    let intact_lines: usize = intact.iter().map(|r| r.to - r.from).sum();
    let window = to - from;
    let changed = window - intact_lines;

    if changed as f64 > window as f64 * options.full_repaint_ratio {
        trace!(target: "render.planner", changed, window, "patch_escalated_full");
        return plan_full(visible, line_count, options);
    }

    intact.sort_by_key(|r| r.row);
    let mut updates = Vec::new();
    let (mut pos, mut row) = (from, 0);
    for r in &intact {
        if r.row > row || r.from > pos {
            updates.push(RowUpdate {
                from_line: pos,
                to_line: r.from,
                slice_start: row,
                slice_size: r.row - row,
            });
        }
        pos = r.to;
        row = r.row + (r.to - r.from);
    }
    if row != old_rows || pos != to {
        updates.push(RowUpdate {
            from_line: pos,
            to_line: to,
            slice_start: row,
            slice_size: old_rows - row,
        });
    }

    let kind = if updates.is_empty() {
        PlanKind::Unchanged
    } else {
        PlanKind::Patch(updates)
    };
    trace!(
        target: "render.planner",
        showing_from = from,
        showing_to = to,
        intact = intact_lines,
        changed,
        "plan_patch"
    );
    RenderPlan {
        showing: from..to,
        kind,
    }
}
