//! Incremental highlighting.
//!
//! Each line caches the tokenizer state after it. Edits clear the state of
//! the lines they touch and queue the first of them; a pass then walks
//! forward from the nearest usable cached state, re-tokenizing until the
//! freshly computed state matches what was cached before (nothing further
//! down can change), the document ends, or the time budget runs out.

use crate::HighlightError;
use crate::mode::{DynMode, ModeConfig};
use crate::stream::StringStream;
use crate::work_queue::WorkQueue;
use core_events::{Budget, Clock};
use core_text::{Buffer, Line, OpaqueState, Position, Splice, StyleRuns};
use std::ops::Range;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightOptions {
    /// Wall-clock budget of one pass.
    pub time_budget: Duration,
    /// Bytes tokenized per line; the rest stays unstyled.
    pub line_ceiling: usize,
    /// How far back to look for a cached state before guessing a restart line.
    pub lookback: usize,
}

impl Default for HighlightOptions {
    fn default() -> Self {
        Self {
            time_budget: Duration::from_millis(100),
            line_ceiling: 5000,
            lookback: 40,
        }
    }
}

/// Outcome of one [`Highlighter::highlight_pass`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Lines whose style runs changed.
    pub restyled: Option<Range<usize>>,
    pub lines_tokenized: usize,
    /// False when the budget ran out with work left in the queue.
    pub finished: bool,
}

impl PassReport {
    fn note_restyled(&mut self, line: usize) {
        self.restyled = Some(match self.restyled.take() {
            Some(r) => r.start.min(line)..r.end.max(line + 1),
            None => line..line + 1,
        });
    }
}

/// The token covering a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub start: usize,
    pub end: usize,
    pub string: String,
    pub style: Option<String>,
}

pub struct Highlighter {
    mode: Rc<dyn DynMode>,
    config: ModeConfig,
    options: HighlightOptions,
    queue: WorkQueue,
    /// Lines restyled while filling states outside a pass.
    restyled: Option<Range<usize>>,
}

impl std::fmt::Debug for Highlighter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Highlighter")
            .field("mode", &self.mode.name())
            .field("options", &self.options)
            .field("queue", &self.queue)
            .finish()
    }
}

impl Highlighter {
    /// A highlighter with line 0 queued, so the first pass covers the document.
    pub fn new(mode: Rc<dyn DynMode>, config: ModeConfig, options: HighlightOptions) -> Self {
        let mut queue = WorkQueue::new();
        queue.push(0);
        Self {
            mode,
            config,
            options,
            queue,
            restyled: None,
        }
    }

    pub fn mode(&self) -> &Rc<dyn DynMode> {
        &self.mode
    }

    pub fn config(&self) -> &ModeConfig {
        &self.config
    }

    pub fn options(&self) -> &HighlightOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: HighlightOptions) {
        self.options = options;
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    /// No line is waiting for re-tokenization.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Switch tokenizer; every cached state is dropped.
    pub fn set_mode(&mut self, mode: Rc<dyn DynMode>, buf: &mut Buffer) {
        debug!(target: "syntax.highlight", mode = mode.name(), "set_mode");
        self.mode = mode;
        self.reset(buf);
    }

    /// Forget all cached states and queue the whole document.
    pub fn reset(&mut self, buf: &mut Buffer) {
        for line in buf.lines_mut() {
            line.set_state_after(None);
        }
        self.queue.clear();
        self.queue.push(0);
    }

    /// Record an applied splice. Tokenization is deferred to the next pass.
    pub fn invalidate(&mut self, splice: &Splice) {
        self.queue.remap(splice);
    }

    /// Record a whole-line replacement (history replay).
    pub fn invalidate_lines(&mut self, start: usize, removed: usize, added: usize) {
        self.queue.remap_span(start, removed, added);
    }

    /// Lines whose styles changed since the last call, outside of passes.
    pub fn take_restyled(&mut self) -> Option<Range<usize>> {
        self.restyled.take()
    }

    /// Line to resume tokenizing from when `target` needs a state.
    ///
    /// Looks back at most `lookback` lines for a line with a cached state and
    /// resumes right after it. Failing that, resumes at the least indented
    /// line in the window (with a fresh start state). A window reaching the
    /// top of the document resumes at line 0.
    pub fn find_restart_point(&self, buf: &Buffer, target: usize) -> usize {
        let tab = self.config.tab_size;
        let mut search = target.min(buf.line_count());
        let mut best: Option<(usize, usize)> = None;
        loop {
            if search == 0 {
                return 0;
            }
            if target - search >= self.options.lookback {
                break;
            }
            let Some(prev) = buf.line(search - 1) else {
                break;
            };
            if prev.state_after().is_some() {
                return search;
            }
            let indent = prev.indentation(tab);
            if best.is_none_or(|(min, _)| indent < min) {
                best = Some((indent, search - 1));
            }
            search -= 1;
        }
        best.map_or(target, |(_, line)| line)
    }

    fn initial_state(&self, buf: &Buffer, start: usize) -> OpaqueState {
        if start > 0
            && let Some(state) = buf.line(start - 1).and_then(Line::state_after)
        {
            return state.clone();
        }
        self.mode.start_state(&self.config)
    }

    /// Tokenizer state in effect at the start of `line`, computing and caching
    /// states for the lines leading up to it.
    ///
    /// Filling states can split a run of untokenized lines; the untokenized
    /// remainder starting at `line` is queued so a pass still reaches it.
    pub fn state_before(&mut self, buf: &mut Buffer, line: usize) -> Result<OpaqueState, HighlightError> {
        let line = line.min(buf.line_count());
        let start = self.find_restart_point(buf, line);
        let mut state = self.initial_state(buf, start);
        for idx in start..line {
            let Some(l) = buf.line_mut(idx) else { break };
            if self.highlight_line(l, idx, &mut state)? {
                self.restyled = Some(match self.restyled.take() {
                    Some(r) => r.start.min(idx)..r.end.max(idx + 1),
                    None => idx..idx + 1,
                });
            }
            l.set_state_after(Some(state.clone()));
        }
        if start < line && buf.line(line).is_some_and(|l| l.state_after().is_none()) {
            self.queue.push(line);
        }
        Ok(state)
    }

    fn tokenize(&self, text: &str, idx: usize, state: &mut OpaqueState) -> Result<StyleRuns, HighlightError> {
        let mut runs = StyleRuns::default();
        if text.is_empty() {
            self.mode.blank_line(state);
            return Ok(runs);
        }
        let mut stream = StringStream::new(text, self.config.tab_size);
        while !stream.eol() && stream.pos() < self.options.line_ceiling {
            stream.begin_token();
            let style = self.mode.token(&mut stream, state);
            if stream.pos() <= stream.start() {
                return Err(HighlightError::Stalled {
                    mode: self.mode.name().to_owned(),
                    line: idx,
                    offset: stream.pos(),
                });
            }
            runs.push(stream.pos() - stream.start(), style);
        }
        if !stream.eol() {
            debug!(
                target: "syntax.highlight",
                line = idx,
                len = text.len(),
                ceiling = self.options.line_ceiling,
                "line_ceiling_reached"
            );
            runs.push(text.len() - stream.pos(), None);
        }
        Ok(runs)
    }

    /// Tokenize one line starting from `state`, leaving the state after the
    /// line in `state`. Returns whether the line's runs changed.
    pub fn highlight_line(&self, line: &mut Line, idx: usize, state: &mut OpaqueState) -> Result<bool, HighlightError> {
        let runs = self.tokenize(line.text(), idx, state)?;
        Ok(line.set_styles(runs))
    }

    /// Run queued work until the queue empties or the budget is spent.
    pub fn highlight_pass(&mut self, buf: &mut Buffer, clock: &dyn Clock) -> Result<PassReport, HighlightError> {
        let budget = Budget::start(clock, self.options.time_budget);
        let mut report = PassReport {
            finished: true,
            ..PassReport::default()
        };
        let count = buf.line_count();
        while let Some(first) = self.queue.pop_first() {
            if first >= count {
                continue;
            }
            let start = self.find_restart_point(buf, first);
            let mut state = self.initial_state(buf, start);
            let mut idx = start;
            while idx < count {
                let Some(line) = buf.line_mut(idx) else { break };
                let previous = line.state_after().cloned();
                let changed = self.highlight_line(line, idx, &mut state)?;
                line.set_state_after(Some(state.clone()));
                report.lines_tokenized += 1;
                if changed {
                    report.note_restyled(idx);
                }
                idx += 1;
                if !changed && previous.is_some_and(|p| p == state) {
                    break;
                }
                if budget.exhausted(clock) {
                    if idx < count {
                        self.queue.push(idx);
                        report.finished = false;
                    }
                    trace!(
                        target: "syntax.highlight",
                        start,
                        stopped_at = idx,
                        tokenized = report.lines_tokenized,
                        queued = self.queue.len(),
                        "highlight_pass_budget_exhausted"
                    );
                    report.finished &= self.queue.is_empty();
                    return Ok(report);
                }
            }
        }
        trace!(
            target: "syntax.highlight",
            tokenized = report.lines_tokenized,
            restyled = ?report.restyled,
            "highlight_pass"
        );
        Ok(report)
    }

    /// Re-tokenize the whole document from scratch without touching the buffer.
    pub fn tokenize_document(&self, buf: &Buffer) -> Result<Vec<StyleRuns>, HighlightError> {
        let mut state = self.mode.start_state(&self.config);
        buf.lines()
            .enumerate()
            .map(|(idx, line)| self.tokenize(line.text(), idx, &mut state))
            .collect()
    }

    /// The token covering the byte just before `pos`.
    pub fn token_at(&mut self, buf: &mut Buffer, pos: Position) -> Result<Token, HighlightError> {
        let pos = buf.clip_pos(pos);
        let mut state = self.state_before(buf, pos.line)?;
        let text = buf.line(pos.line).map(|l| l.text().to_owned()).unwrap_or_default();
        let mut stream = StringStream::new(&text, self.config.tab_size);
        let mut style = None;
        while stream.pos() < pos.ch && !stream.eol() {
            stream.begin_token();
            style = self.mode.token(&mut stream, &mut state);
            if stream.pos() <= stream.start() {
                return Err(HighlightError::Stalled {
                    mode: self.mode.name().to_owned(),
                    line: pos.line,
                    offset: stream.pos(),
                });
            }
        }
        Ok(Token {
            start: stream.start(),
            end: stream.pos(),
            string: stream.current().to_owned(),
            style: style.map(|s| s.into_owned()),
        })
    }

    /// Indentation the mode suggests for `line`, if it has an opinion.
    pub fn indent_for(&mut self, buf: &mut Buffer, line: usize) -> Result<Option<usize>, HighlightError> {
        let state = self.state_before(buf, line)?;
        let text = buf.line(line).map(|l| l.text().trim_start().to_owned()).unwrap_or_default();
        Ok(self.mode.indent(&state, &text, &self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;
    use crate::modes::{CLike, CLikeState};
    use core_events::ManualClock;
    use core_text::StyleTag;
    use std::borrow::Cow;

    fn clike() -> Highlighter {
        Highlighter::new(Rc::new(CLike::default()), ModeConfig::default(), HighlightOptions::default())
    }

    fn styles_of(buf: &Buffer, line: usize) -> Vec<(String, Option<String>)> {
        buf.line(line)
            .map(|l| {
                l.fragments()
                    .map(|(t, s)| (t.to_owned(), s.map(str::to_owned)))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn first_pass_styles_document() {
        let mut buf = Buffer::from_text("int a;\n/* x\ny */ b");
        let mut hl = clike();
        let clock = ManualClock::new();
        let report = hl.highlight_pass(&mut buf, &clock).unwrap();
        assert!(report.finished);
        assert_eq!(report.lines_tokenized, 3);
        assert_eq!(report.restyled, Some(0..3));
        assert!(hl.is_idle());
        assert_eq!(styles_of(&buf, 1), vec![("/* x".into(), Some("comment".into()))]);
        assert!(buf.lines().all(|l| l.state_after().is_some()));
    }

    #[test]
    fn edit_stops_early_when_state_converges() {
        let text = (0..50).map(|i| format!("int v{i};")).collect::<Vec<_>>().join("\n");
        let mut buf = Buffer::from_text(&text);
        let mut hl = clike();
        let clock = ManualClock::new();
        hl.highlight_pass(&mut buf, &clock).unwrap();

        let splice = buf.splice(Position::new(10, 4), Position::new(10, 4), &["x"]).unwrap();
        hl.invalidate(&splice);
        let report = hl.highlight_pass(&mut buf, &clock).unwrap();
        // line 10 (edited) and line 11 (state confirmed unchanged)
        assert_eq!(report.lines_tokenized, 2);
        assert_eq!(report.restyled, Some(10..11));
    }

    #[test]
    fn opening_comment_restyles_downstream() {
        let mut buf = Buffer::from_text("a\nb\nc\nd");
        let mut hl = clike();
        let clock = ManualClock::new();
        hl.highlight_pass(&mut buf, &clock).unwrap();
        let splice = buf.splice(Position::new(1, 0), Position::new(1, 0), &["/*"]).unwrap();
        hl.invalidate(&splice);
        let report = hl.highlight_pass(&mut buf, &clock).unwrap();
        assert_eq!(report.restyled, Some(1..4));
        assert_eq!(styles_of(&buf, 3), vec![("d".into(), Some("comment".into()))]);
    }

    #[test]
    fn budget_exhaustion_requeues() {
        let text = vec!["x = 1;"; 20].join("\n");
        let mut buf = Buffer::from_text(&text);
        let mut hl = clike();
        let clock = ManualClock::new();
        clock.set_auto_step(Duration::from_millis(30));
        let report = hl.highlight_pass(&mut buf, &clock).unwrap();
        assert!(!report.finished);
        assert!(report.lines_tokenized < 20);
        assert_eq!(hl.queue().first(), Some(report.lines_tokenized));
        let mut passes = 1;
        while !hl.is_idle() {
            hl.highlight_pass(&mut buf, &clock).unwrap();
            passes += 1;
        }
        assert!(passes > 1);
        assert!(buf.lines().all(|l| l.state_after().is_some()));
    }

    #[test]
    fn restart_point_prefers_cached_state_then_least_indented() {
        let mut buf = Buffer::from_text("a\n  b\nc\n    d\n      e");
        let mut hl = clike();
        assert_eq!(hl.find_restart_point(&buf, 0), 0);
        // window reaches the top
        assert_eq!(hl.find_restart_point(&buf, 4), 0);
        hl.state_before(&mut buf, 3).unwrap();
        assert_eq!(hl.find_restart_point(&buf, 4), 3);

        let narrow = Highlighter::new(
            Rc::new(CLike::default()),
            ModeConfig::default(),
            HighlightOptions {
                lookback: 3,
                ..HighlightOptions::default()
            },
        );
        let fresh = Buffer::from_text("a\n  b\nc\n    d\n      e");
        // window covers lines 1..=3, line 2 has the least indentation
        assert_eq!(narrow.find_restart_point(&fresh, 4), 2);
    }

    #[test]
    fn long_lines_are_cut_at_ceiling() {
        let line = format!("{} tail", "a".repeat(20));
        let mut buf = Buffer::from_text(&line);
        let mut hl = Highlighter::new(
            Rc::new(CLike::default()),
            ModeConfig::default(),
            HighlightOptions {
                line_ceiling: 8,
                ..HighlightOptions::default()
            },
        );
        hl.highlight_pass(&mut buf, &ManualClock::new()).unwrap();
        let frags = styles_of(&buf, 0);
        // the first token runs past the ceiling; everything after it is plain
        assert_eq!(frags[0], ("a".repeat(20), Some("variable".into())));
        assert_eq!(frags[1], (" tail".into(), None));
    }

    struct Stuck;

    impl Mode for Stuck {
        type State = ();
        fn name(&self) -> &str {
            "stuck"
        }
        fn start_state(&self, _config: &ModeConfig) {}
        fn token(&self, _stream: &mut StringStream<'_>, _state: &mut ()) -> Option<StyleTag> {
            None
        }
    }

    #[test]
    fn stalled_mode_is_an_error() {
        let mut buf = Buffer::from_text("abc");
        let mut hl = Highlighter::new(Rc::new(Stuck), ModeConfig::default(), HighlightOptions::default());
        let err = hl.highlight_pass(&mut buf, &ManualClock::new()).unwrap_err();
        assert_eq!(
            err,
            HighlightError::Stalled {
                mode: "stuck".into(),
                line: 0,
                offset: 0
            }
        );
    }

    /// A mode whose state is a plain JSON value: counts lines seen.
    struct Counting;

    impl Mode for Counting {
        type State = serde_json::Value;
        fn name(&self) -> &str {
            "counting"
        }
        fn start_state(&self, _config: &ModeConfig) -> serde_json::Value {
            serde_json::json!({ "lines": 0 })
        }
        fn token(&self, stream: &mut StringStream<'_>, state: &mut serde_json::Value) -> Option<StyleTag> {
            stream.skip_to_end();
            let n = state["lines"].as_u64().unwrap_or(0);
            state["lines"] = (n + 1).into();
            Some(Cow::Borrowed(if n % 2 == 0 { "even" } else { "odd" }))
        }
    }

    #[test]
    fn dynamic_state_modes_are_supported() {
        let mut buf = Buffer::from_text("a\nb\nc");
        let mut hl = Highlighter::new(Rc::new(Counting), ModeConfig::default(), HighlightOptions::default());
        hl.highlight_pass(&mut buf, &ManualClock::new()).unwrap();
        assert_eq!(styles_of(&buf, 2), vec![("c".into(), Some("even".into()))]);
        let state = buf.line(2).and_then(Line::state_after).unwrap();
        assert_eq!(state.downcast_ref::<serde_json::Value>().unwrap()["lines"], 3);
    }

    #[test]
    fn token_at_reports_covering_token() {
        let mut buf = Buffer::from_text("int main() {\n  return 42;\n}");
        let mut hl = clike();
        let tok = hl.token_at(&mut buf, Position::new(1, 6)).unwrap();
        assert_eq!(tok.string, "return");
        assert_eq!(tok.style.as_deref(), Some("keyword"));
        assert_eq!((tok.start, tok.end), (2, 8));
        let num = hl.token_at(&mut buf, Position::new(1, 10)).unwrap();
        assert_eq!(num.style.as_deref(), Some("number"));
        // line 0 was styled on the way
        assert_eq!(hl.take_restyled(), Some(0..1));
        assert_eq!(hl.take_restyled(), None);
    }

    #[test]
    fn set_mode_drops_cached_states() {
        let mut buf = Buffer::from_text("int a;");
        let mut hl = clike();
        let clock = ManualClock::new();
        hl.highlight_pass(&mut buf, &clock).unwrap();
        assert!(buf.line(0).unwrap().state_after().unwrap().downcast_ref::<CLikeState>().is_some());
        hl.set_mode(Rc::new(crate::modes::PlainText), &mut buf);
        assert!(buf.line(0).unwrap().state_after().is_none());
        hl.highlight_pass(&mut buf, &clock).unwrap();
        assert_eq!(styles_of(&buf, 0), vec![("int a;".into(), None)]);
    }

    #[test]
    fn indent_for_uses_mode() {
        let mut buf = Buffer::from_text("void f() {\nx;\n}");
        let mut hl = clike();
        assert_eq!(hl.indent_for(&mut buf, 1).unwrap(), Some(2));
        assert_eq!(hl.indent_for(&mut buf, 2).unwrap(), Some(0));
    }
}
