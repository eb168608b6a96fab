//! Per-line style runs.
//!
//! A line's styling is an ordered list of `(length, style)` runs laid over the
//! line's text. Edits partition the run list literally at the edited offsets
//! instead of re-deriving it, so text outside an edit keeps its styling until
//! the highlighter gets around to the line again.
//!
//! Invariants:
//! * No run has length zero.
//! * Adjacent runs never share the same style (they are merged on insertion).

use smallvec::SmallVec;
use std::borrow::Cow;

/// Style identifier produced by a tokenizer (e.g. `"keyword"`). `None` means unstyled.
pub type StyleTag = Cow<'static, str>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRun {
    pub len: usize,
    pub style: Option<StyleTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyleRuns {
    runs: SmallVec<[StyleRun; 4]>,
}

impl StyleRuns {
    /// A single unstyled run covering `len` bytes.
    pub fn plain(len: usize) -> Self {
        let mut runs = Self::default();
        runs.push(len, None);
        runs
    }

    /// Append a run, merging it into the previous one when the style matches.
    pub fn push(&mut self, len: usize, style: Option<StyleTag>) {
        if len == 0 {
            return;
        }
        if let Some(last) = self.runs.last_mut()
            && last.style == style
        {
            last.len += len;
            return;
        }
        self.runs.push(StyleRun { len, style });
    }

    pub fn runs(&self) -> &[StyleRun] {
        &self.runs
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Sum of all run lengths; equals the owning line's byte length.
    pub fn total_len(&self) -> usize {
        self.runs.iter().map(|r| r.len).sum()
    }

    /// Iterate `(fragment, style)` pairs over `text`.
    pub fn iter<'a>(&'a self, text: &'a str) -> Fragments<'a> {
        Fragments {
            text,
            runs: self.runs.iter(),
            offset: 0,
        }
    }

    /// Style of the byte at `offset`, if any run covers it.
    pub fn style_at(&self, offset: usize) -> Option<&str> {
        let mut start = 0;
        for run in &self.runs {
            if offset < start + run.len {
                return run.style.as_deref();
            }
            start += run.len;
        }
        None
    }

    /// Split the runs at byte `at`, keeping `[0, at)` and returning `[at, end)`.
    pub fn split_off(&mut self, at: usize) -> StyleRuns {
        let mut offset = 0;
        for idx in 0..self.runs.len() {
            let run_len = self.runs[idx].len;
            if at <= offset {
                return StyleRuns {
                    runs: self.runs.drain(idx..).collect(),
                };
            }
            if at < offset + run_len {
                let head_len = at - offset;
                let style = self.runs[idx].style.clone();
                self.runs[idx].len = head_len;
                let mut tail = StyleRuns::default();
                tail.runs.push(StyleRun {
                    len: run_len - head_len,
                    style,
                });
                tail.runs.extend(self.runs.drain(idx + 1..));
                return tail;
            }
            offset += run_len;
        }
        StyleRuns::default()
    }

    /// Concatenate `other` after these runs.
    pub fn append(&mut self, other: StyleRuns) {
        for run in other.runs {
            self.push(run.len, run.style);
        }
    }

    /// Replace the byte range `[from, to)` by a single unstyled run of `new_len` bytes.
    /// Runs before `from` and after `to` keep their styles.
    pub fn replace_range(&mut self, from: usize, to: usize, new_len: usize) {
        let tail = self.split_off(to);
        self.split_off(from);
        self.push(new_len, None);
        self.append(tail);
    }
}

impl FromIterator<(usize, Option<StyleTag>)> for StyleRuns {
    fn from_iter<I: IntoIterator<Item = (usize, Option<StyleTag>)>>(iter: I) -> Self {
        let mut runs = StyleRuns::default();
        for (len, style) in iter {
            runs.push(len, style);
        }
        runs
    }
}

/// Iterator over the `(text fragment, style)` pairs of a styled line.
pub struct Fragments<'a> {
    text: &'a str,
    runs: std::slice::Iter<'a, StyleRun>,
    offset: usize,
}

impl<'a> Iterator for Fragments<'a> {
    type Item = (&'a str, Option<&'a str>);

    fn next(&mut self) -> Option<Self::Item> {
        let run = self.runs.next()?;
        let start = self.offset;
        let end = (start + run.len).min(self.text.len());
        self.offset = end;
        Some((self.text.get(start..end)?, run.style.as_deref()))
    }
}
