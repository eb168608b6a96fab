//! Line indentation.

use crate::{EditorError, EditorModel, Placement};
use core_text::Position;
use tracing::debug;

/// How `indent_line` picks the new indentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentMode {
    /// Ask the mode; falls back to `Prev` when it has no opinion.
    Smart,
    /// Copy the previous line's indentation.
    Prev,
    /// One indent unit deeper.
    Add,
    /// One indent unit shallower.
    Subtract,
}

/// Whitespace that renders `width` columns wide.
pub fn indent_string(width: usize, tab_size: usize, with_tabs: bool) -> String {
    if with_tabs && tab_size > 0 {
        let mut s = "\t".repeat(width / tab_size);
        s.push_str(&" ".repeat(width % tab_size));
        s
    } else {
        " ".repeat(width)
    }
}

fn leading_whitespace(text: &str) -> usize {
    text.len() - text.trim_start_matches([' ', '\t']).len()
}

impl EditorModel {
    /// Re-indent line `n`. Out-of-range lines are clamped.
    pub fn indent_line(&mut self, n: usize, mode: IndentMode) -> Result<(), EditorError> {
        if self.read_only_blocks("indent_line") {
            return Ok(());
        }
        self.operation(|ed| ed.indent_line_inner(n, mode))
    }

    /// Re-indent every line the selection touches.
    pub fn indent_selection(&mut self, mode: IndentMode) -> Result<(), EditorError> {
        if self.read_only_blocks("indent_selection") {
            return Ok(());
        }
        self.operation(|ed| {
            let sel = ed.selection.get();
            for n in sel.from().line..=sel.to().line {
                ed.indent_line_inner(n, mode)?;
            }
            Ok(())
        })
    }

    pub(crate) fn indent_line_inner(&mut self, n: usize, mode: IndentMode) -> Result<(), EditorError> {
        let n = n.min(self.buffer.line_count() - 1);
        let tab_size = self.options.tab_size;
        let (current, ws) = match self.buffer.line(n) {
            Some(line) => (line.indentation(tab_size), leading_whitespace(line.text())),
            None => return Ok(()),
        };
        let prev = n
            .checked_sub(1)
            .and_then(|p| self.buffer.line(p))
            .map_or(0, |l| l.indentation(tab_size));
        let target = match mode {
            IndentMode::Smart => {
                let suggested = self.highlighter.indent_for(&mut self.buffer, n);
                self.note_cache_restyles();
                suggested?.unwrap_or(prev)
            }
            IndentMode::Prev => prev,
            IndentMode::Add => current + self.options.indent_unit,
            IndentMode::Subtract => current.saturating_sub(self.options.indent_unit),
        };
        let indent = indent_string(target, tab_size, self.options.indent_with_tabs);
        let unchanged = self
            .buffer
            .line(n)
            .is_some_and(|l| l.text().get(..ws) == Some(indent.as_str()));
        if unchanged {
            return Ok(());
        }
        debug!(target: "model.operation", line = n, ?mode, from = current, to = target, "indent_line");
        self.apply_edit(Position::new(n, 0), Position::new(n, ws), &indent, Placement::Keep)?;
        Ok(())
    }
}
