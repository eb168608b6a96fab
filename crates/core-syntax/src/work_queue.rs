use core_text::Splice;
use std::collections::BTreeSet;

/// Ordered set of lines awaiting re-tokenization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkQueue {
    lines: BTreeSet<usize>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: usize) {
        self.lines.insert(line);
    }

    pub fn pop_first(&mut self) -> Option<usize> {
        self.lines.pop_first()
    }

    pub fn first(&self) -> Option<usize> {
        self.lines.first().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.lines.iter().copied()
    }

    /// Carry queued indices across an edit: entries inside the replaced span are
    /// dropped, later ones shift by the line delta, and the edit line is queued.
    pub fn remap(&mut self, splice: &Splice) {
        self.remap_span(splice.from_line, splice.removed, splice.added);
    }

    /// [`WorkQueue::remap`] for a whole-line replacement of `removed` lines by `added`.
    pub fn remap_span(&mut self, start: usize, removed: usize, added: usize) {
        let end = start + removed;
        self.lines = self
            .lines
            .iter()
            .filter_map(|&l| {
                if l < start {
                    Some(l)
                } else if l < end {
                    None
                } else {
                    Some(l - removed + added)
                }
            })
            .collect();
        self.lines.insert(start);
    }
}
