use crate::count_column;
use crate::state::OpaqueState;
use crate::style::{Fragments, StyleRuns};

/// Identifier shared by every per-line piece of one marked range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkId(pub u64);

/// A position-anchored decoration on one line. `to == None` extends to end of line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedSpan {
    pub from: usize,
    pub to: Option<usize>,
    pub style: String,
    pub id: MarkId,
}

impl MarkedSpan {
    /// Effective end offset on a line of `line_len` bytes.
    pub fn end(&self, line_len: usize) -> usize {
        self.to.unwrap_or(line_len).min(line_len)
    }
}

/// One line of the document.
#[derive(Debug, Clone, Default)]
pub struct Line {
    text: String,
    styles: StyleRuns,
    state_after: Option<OpaqueState>,
    marks: Vec<MarkedSpan>,
    line_class: Option<String>,
    gutter_marker: Option<String>,
}

impl Line {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            styles: StyleRuns::plain(text.len()),
            text,
            ..Self::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn styles(&self) -> &StyleRuns {
        &self.styles
    }

    pub fn fragments(&self) -> Fragments<'_> {
        self.styles.iter(&self.text)
    }

    /// Tokenizer state after this line; `None` while the line is untokenized.
    pub fn state_after(&self) -> Option<&OpaqueState> {
        self.state_after.as_ref()
    }

    pub fn set_state_after(&mut self, state: Option<OpaqueState>) {
        self.state_after = state;
    }

    /// Install freshly computed runs. Returns whether they differ from the previous ones.
    pub fn set_styles(&mut self, styles: StyleRuns) -> bool {
        debug_assert_eq!(styles.total_len(), self.text.len(), "style runs must cover the line");
        if styles == self.styles {
            return false;
        }
        self.styles = styles;
        true
    }

    pub fn marks(&self) -> &[MarkedSpan] {
        &self.marks
    }

    pub fn line_class(&self) -> Option<&str> {
        self.line_class.as_deref()
    }

    pub fn set_line_class(&mut self, class: Option<String>) {
        self.line_class = class;
    }

    pub fn gutter_marker(&self) -> Option<&str> {
        self.gutter_marker.as_deref()
    }

    pub fn set_gutter_marker(&mut self, marker: Option<String>) {
        self.gutter_marker = marker;
    }

    /// True when the run lengths cover the text exactly and marks are well formed.
    pub fn is_consistent(&self) -> bool {
        let len = self.text.len();
        self.styles.total_len() == len
            && self.marks.windows(2).all(|w| w[0].from <= w[1].from)
            && self
                .marks
                .iter()
                .all(|m| m.from < len && m.to.is_none_or(|to| to > m.from && to <= len))
    }

    /// Column width of the leading whitespace, expanding tabs.
    pub fn indentation(&self, tab_size: usize) -> usize {
        let ws = self
            .text
            .find(|c: char| c != ' ' && c != '\t')
            .unwrap_or(self.text.len());
        count_column(&self.text, ws, tab_size)
    }

    /// Replace bytes `[from, to)` with `text`. Styles before `from` and after `to`
    /// are kept; the new text is one unstyled run. Offsets must be char boundaries.
    pub fn replace_range(&mut self, from: usize, to: usize, text: &str) {
        let to = to.min(self.text.len());
        let from = from.min(to);
        self.text.replace_range(from..to, text);
        self.styles.replace_range(from, to, text.len());
        self.shift_marks(from, to, text.len());
        self.state_after = None;
    }

    /// Append unstyled text at the end of the line.
    pub fn push_plain(&mut self, text: &str) {
        self.text.push_str(text);
        self.styles.push(text.len(), None);
        self.state_after = None;
    }

    /// Split at byte `at`, keeping `[0, at)` and returning `[at, end)` with its
    /// styles and marks. Marks crossing `at` continue on the returned line.
    pub fn split_off(&mut self, at: usize) -> Line {
        let at = at.min(self.text.len());
        let old_len = self.text.len();
        let tail_text = self.text.split_off(at);
        let tail_styles = self.styles.split_off(at);
        let mut head_marks = Vec::with_capacity(self.marks.len());
        let mut tail_marks = Vec::new();
        for mark in self.marks.drain(..) {
            if mark.from >= at {
                tail_marks.push(MarkedSpan {
                    from: mark.from - at,
                    to: mark.to.map(|to| to - at),
                    ..mark
                });
                continue;
            }
            let end = mark.end(old_len);
            if end > at {
                tail_marks.push(MarkedSpan {
                    from: 0,
                    to: mark.to.map(|to| to - at),
                    style: mark.style.clone(),
                    id: mark.id,
                });
            }
            head_marks.push(MarkedSpan {
                to: Some(end.min(at)),
                ..mark
            });
        }
        self.marks = head_marks;
        self.state_after = None;
        let mut tail = Line {
            text: tail_text,
            styles: tail_styles,
            marks: tail_marks,
            ..Line::default()
        };
        tail.retain_live_marks();
        self.retain_live_marks();
        tail
    }

    /// Concatenate `other` onto this line, shifting its marks.
    pub fn append(&mut self, other: Line) {
        let offset = self.text.len();
        self.text.push_str(&other.text);
        self.styles.append(other.styles);
        self.marks.extend(other.marks.into_iter().map(|m| MarkedSpan {
            from: m.from + offset,
            to: m.to.map(|to| to + offset),
            ..m
        }));
        self.marks.sort_by_key(|m| m.from);
        self.state_after = None;
    }

    pub fn add_mark(&mut self, mark: MarkedSpan) {
        let idx = self.marks.partition_point(|m| m.from <= mark.from);
        self.marks.insert(idx, mark);
        self.retain_live_marks();
    }

    /// Remove every span belonging to `id`. Returns whether any was present.
    pub fn remove_mark(&mut self, id: MarkId) -> bool {
        let before = self.marks.len();
        self.marks.retain(|m| m.id != id);
        before != self.marks.len()
    }

    /// Shift mark endpoints for a replacement of `[from, to)` by `inserted` bytes.
    ///
    /// Endpoints before the edit stay, endpoints after it move by the length
    /// delta, endpoints inside it clamp to the edge of the edit that keeps the
    /// new text outside the mark.
    fn shift_marks(&mut self, from: usize, to: usize, inserted: usize) {
        if self.marks.is_empty() {
            return;
        }
        let shifted = |p: usize| p - to + from + inserted;
        for mark in &mut self.marks {
            mark.from = if mark.from < from {
                mark.from
            } else if mark.from >= to {
                shifted(mark.from)
            } else {
                from + inserted
            };
            mark.to = mark.to.map(|p| {
                if p <= from {
                    p
                } else if p >= to {
                    shifted(p)
                } else {
                    from
                }
            });
        }
        self.marks.sort_by_key(|m| m.from);
        self.retain_live_marks();
    }

    fn retain_live_marks(&mut self) {
        let len = self.text.len();
        self.marks.retain_mut(|m| {
            if let Some(to) = m.to.as_mut() {
                *to = (*to).min(len);
            }
            m.from < len && m.to.is_none_or(|to| to > m.from)
        });
    }
}
