//! Render change log.
//!
//! Every buffer mutation and every highlighter restyle is recorded here as a
//! `LineChange` in the index space that was current when it happened. At the
//! end of an operation the coordinator consumes the log in one batch and hands
//! it to the planner, which replays the changes in order against the rows the
//! view currently shows.
//!
//! Contract:
//! * `mark` never reorders changes; order is meaningful because each change is
//!   expressed in the coordinates produced by the one before it.
//! * A change that keeps the line count (`delta == 0`) is an in-place restyle,
//!   whether it came from the highlighter or from typing within one line.
//!   Consecutive restyles that overlap or touch are merged; line-count changes
//!   are never merged.
//! * A pending full request absorbs everything recorded in the same batch.
//! * `consume` returns `None` when nothing was recorded since the last call.

use std::ops::Range;

/// One recorded change: lines `[from, to)` were replaced by `to - from + delta` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineChange {
    pub from: usize,
    pub to: usize,
    pub delta: isize,
}

impl LineChange {
    pub fn edit(from: usize, to: usize, delta: isize) -> Self {
        Self { from, to, delta }
    }

    /// Lines whose content or styling changed without changing the line count.
    pub fn restyle(lines: Range<usize>) -> Self {
        Self {
            from: lines.start,
            to: lines.end,
            delta: 0,
        }
    }

    pub fn is_restyle(&self) -> bool {
        self.delta == 0
    }

    /// Post-change end of the replaced region.
    pub fn new_to(&self) -> usize {
        (self.to as isize + self.delta).max(self.from as isize) as usize
    }
}

/// What the planner should reconcile against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeBatch {
    Full,
    Lines(Vec<LineChange>),
}

#[derive(Debug, Default)]
pub struct RenderScheduler {
    pending: Vec<LineChange>,
    full: bool,
    metrics: ChangeLogMetrics,
}

impl RenderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, change: LineChange) {
        if change.is_restyle() {
            self.metrics.restyles += 1;
            if change.from >= change.to {
                return;
            }
            if let Some(last) = self.pending.last_mut()
                && last.is_restyle()
                && change.from <= last.to
                && last.from <= change.to
            {
                last.from = last.from.min(change.from);
                last.to = last.to.max(change.to);
                self.metrics.restyles_merged += 1;
                tracing::trace!(target: "render.scheduler", ?change, "restyle_merged");
                return;
            }
        } else {
            self.metrics.edits += 1;
        }
        tracing::trace!(target: "render.scheduler", ?change, "render_mark");
        self.pending.push(change);
    }

    /// Request a repaint of every visible row (e.g. after `set_value`).
    pub fn mark_full(&mut self) {
        self.metrics.full_requests += 1;
        tracing::trace!(target: "render.scheduler", "render_mark_full");
        self.full = true;
    }

    pub fn has_pending(&self) -> bool {
        self.full || !self.pending.is_empty()
    }

    pub fn consume(&mut self) -> Option<ChangeBatch> {
        if !self.has_pending() {
            return None;
        }
        self.metrics.batches += 1;
        let pending = std::mem::take(&mut self.pending);
        let batch = if std::mem::take(&mut self.full) {
            ChangeBatch::Full
        } else {
            ChangeBatch::Lines(pending)
        };
        tracing::trace!(target: "render.scheduler", ?batch, "render_consume");
        Some(batch)
    }

    pub fn metrics(&self) -> &ChangeLogMetrics {
        &self.metrics
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ChangeLogMetrics {
    edits: u64,
    restyles: u64,
    restyles_merged: u64,
    full_requests: u64,
    batches: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeLogMetricsSnapshot {
    pub edits: u64,
    pub restyles: u64,
    pub restyles_merged: u64,
    pub full_requests: u64,
    pub batches: u64,
}

impl ChangeLogMetrics {
    pub fn snapshot(&self) -> ChangeLogMetricsSnapshot {
        ChangeLogMetricsSnapshot {
            edits: self.edits,
            restyles: self.restyles,
            restyles_merged: self.restyles_merged,
            full_requests: self.full_requests,
            batches: self.batches,
        }
    }
}
