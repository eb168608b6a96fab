use core_config::EditorOptions;
use core_events::ManualClock;
use core_model::{
    Activity, ChangeObserver, ChangeSet, DisplayPatch, EditorModel, IndentMode, MAX_OBSERVER_ROUNDS, render_row,
};
use core_state::Selection;
use core_syntax::ModeRegistry;
use core_text::Position;
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::subscriber::with_default;
use tracing_subscriber::fmt::MakeWriter;

// -------------------------------------------------------------------------------------------------
// Helpers
// -------------------------------------------------------------------------------------------------

fn p(line: usize, ch: usize) -> Position {
    Position::new(line, ch)
}

fn editor_with(text: &str, mode: &str) -> (EditorModel, ManualClock) {
    let clock = ManualClock::new();
    let options = EditorOptions {
        mode: mode.to_string(),
        ..EditorOptions::default()
    };
    let ed = EditorModel::new(text, options, ModeRegistry::with_builtins(), Rc::new(clock.clone())).unwrap();
    (ed, clock)
}

fn editor(text: &str) -> (EditorModel, ManualClock) {
    editor_with(text, "plain")
}

fn assert_rows_fresh(ed: &EditorModel) {
    let showing = ed.showing();
    assert_eq!(ed.rows().len(), showing.len(), "one row per shown line");
    for (row, n) in ed.rows().iter().zip(showing) {
        assert_eq!(row, &render_row(ed.buffer(), n, ed.selection()), "row for line {n}");
    }
}

#[derive(Clone)]
struct BufferWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

struct LockedWriter<'a> {
    guard: MutexGuard<'a, Vec<u8>>,
}

impl Write for LockedWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for BufferWriter {
    type Writer = LockedWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LockedWriter {
            guard: self.inner.lock().expect("log buffer poisoned"),
        }
    }
}

fn capture_logs(f: impl FnOnce()) -> String {
    let inner = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(true)
        .with_ansi(false)
        .with_writer(BufferWriter { inner: inner.clone() })
        .finish();
    with_default(subscriber, f);
    let out = inner.lock().unwrap().clone();
    String::from_utf8(out).unwrap()
}

#[derive(Default)]
struct Recorder {
    changes: Rc<RefCell<Vec<ChangeSet>>>,
    cursors: Rc<RefCell<Vec<Selection>>>,
}

impl ChangeObserver for Recorder {
    fn on_change(&mut self, _editor: &mut EditorModel, changes: &ChangeSet) {
        self.changes.borrow_mut().push(changes.clone());
    }

    fn on_cursor_activity(&mut self, _editor: &mut EditorModel, selection: Selection) {
        self.cursors.borrow_mut().push(selection);
    }
}

// -------------------------------------------------------------------------------------------------
// Edits and history
// -------------------------------------------------------------------------------------------------

#[test]
fn replacing_inside_a_line_touches_only_that_line() {
    let (mut ed, _clock) = editor("a\nbb\nccc");
    let recorder = Recorder::default();
    let changes = recorder.changes.clone();
    ed.add_observer(Box::new(recorder));
    ed.replace_range("X", p(1, 0), p(1, 2)).unwrap();
    assert_eq!(ed.value(), "a\nX\nccc");
    let changes = changes.borrow();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].spans[0].from, p(1, 0));
    assert_eq!(changes[0].spans[0].to, p(1, 2));
    assert_eq!(changes[0].spans[0].text, vec!["X".to_string()]);
    assert_eq!(changes[0].activity, Activity::TEXT);
    assert_rows_fresh(&ed);
}

#[test]
fn rapid_typing_is_one_undo_unit() {
    let (mut ed, _clock) = editor("fn\n");
    ed.set_selection(p(0, 2), p(0, 2), false).unwrap();
    for _ in 0..40 {
        let at = ed.cursor();
        ed.insert_text(at, "a").unwrap();
    }
    assert_eq!(ed.line(0).map(|l| l.len()), Some(42));
    assert_eq!(ed.history_size().undo, 1);
    ed.undo().unwrap();
    assert_eq!(ed.value(), "fn\n");
    assert_eq!(ed.history_size().redo, 1);
    ed.redo().unwrap();
    assert_eq!(ed.value(), format!("fn{}\n", "a".repeat(40)));
    assert_eq!(ed.cursor(), p(0, 42));
}

#[test]
fn pauses_split_undo_units() {
    let (mut ed, clock) = editor("");
    ed.insert_text(p(0, 0), "a").unwrap();
    clock.advance(Duration::from_secs(1));
    ed.insert_text(p(0, 1), "b").unwrap();
    assert_eq!(ed.history_size().undo, 2);
    ed.undo().unwrap();
    assert_eq!(ed.value(), "a");
    assert_eq!(ed.cursor(), p(0, 1));
}

#[test]
fn undo_restores_selection_and_repaints() {
    let text: Vec<String> = (0..20).map(|n| format!("l{n}")).collect();
    let (mut ed, clock) = editor(&text.join("\n"));
    ed.set_viewport(0..20).unwrap();
    ed.set_selection(p(1, 0), p(1, 2), false).unwrap();
    ed.replace_selection("two", Default::default()).unwrap();
    clock.advance(Duration::from_secs(1));
    assert_eq!(ed.line(1).map(|l| l.text()), Some("two"));
    ed.take_display_patches();

    ed.undo().unwrap();
    assert_eq!(ed.value(), text.join("\n"));
    assert_eq!(ed.selection(), Selection::new(p(1, 0), p(1, 2)));
    let patches = ed.take_display_patches();
    assert!(matches!(&patches[..], [DisplayPatch::Rows { .. }]), "{patches:?}");
    assert_rows_fresh(&ed);
}

#[test]
fn undo_above_a_selection_clears_its_shifted_row() {
    let text: Vec<String> = (0..60).map(|n| format!("line{n}")).collect();
    let (mut ed, _clock) = editor(&text.join("\n"));
    ed.set_viewport(0..60).unwrap();
    ed.insert_text(p(0, 0), "x\ny\n").unwrap();
    ed.set_selection(p(30, 0), p(30, 3), false).unwrap();
    ed.take_display_patches();

    ed.undo().unwrap();
    assert_eq!(ed.value(), text.join("\n"));
    assert_eq!(ed.selection(), Selection::cursor(p(0, 0)));
    let patches = ed.take_display_patches();
    assert!(matches!(&patches[..], [DisplayPatch::Rows { .. }]), "{patches:?}");
    assert_eq!(ed.rows()[28], "<pre>line28</pre>");
    assert_rows_fresh(&ed);

    ed.set_selection(p(28, 0), p(28, 3), false).unwrap();
    ed.redo().unwrap();
    assert_eq!(ed.line(30).map(|l| l.text()), Some("line28"));
    assert_eq!(ed.rows()[30], render_row(ed.buffer(), 30, ed.selection()));
    assert_rows_fresh(&ed);
}

#[test]
fn multi_line_paste_shifts_rows() {
    let (mut ed, _clock) = editor("a\nb\nc\nd");
    ed.set_viewport(0..4).unwrap();
    ed.insert_text(p(1, 1), "1\n2\n3").unwrap();
    assert_eq!(ed.value(), "a\nb1\n2\n3\nc\nd");
    assert_eq!(ed.cursor(), p(3, 1));
    assert_eq!(ed.showing(), 0..6);
    assert_rows_fresh(&ed);
}

#[test]
fn joining_lines_removes_rows() {
    let (mut ed, _clock) = editor("a\nb\nc\nd");
    ed.set_viewport(0..4).unwrap();
    ed.delete_range(p(0, 1), p(2, 0)).unwrap();
    assert_eq!(ed.value(), "ac\nd");
    assert_eq!(ed.cursor(), p(0, 1));
    assert_rows_fresh(&ed);
}

// -------------------------------------------------------------------------------------------------
// Indentation
// -------------------------------------------------------------------------------------------------

#[test]
fn closing_brace_reindents() {
    let (mut ed, _clock) = editor_with("int f() {\n  x;\n  ", "clike");
    ed.insert_text(p(2, 2), "}").unwrap();
    assert_eq!(ed.value(), "int f() {\n  x;\n}");
    assert_eq!(ed.cursor(), p(2, 1));
}

#[test]
fn electric_chars_can_be_disabled() {
    let clock = ManualClock::new();
    let options = EditorOptions {
        mode: "clike".into(),
        electric_chars: false,
        ..EditorOptions::default()
    };
    let mut ed = EditorModel::new("{\n  ", options, ModeRegistry::with_builtins(), Rc::new(clock)).unwrap();
    ed.insert_text(p(1, 2), "}").unwrap();
    assert_eq!(ed.value(), "{\n  }");
}

#[test]
fn smart_indent_follows_brackets() {
    let (mut ed, _clock) = editor_with("if (a) {\nb;\n}", "clike");
    ed.indent_line(1, IndentMode::Smart).unwrap();
    assert_eq!(ed.value(), "if (a) {\n  b;\n}");
    ed.set_selection(p(0, 0), p(2, 1), false).unwrap();
    ed.indent_selection(IndentMode::Add).unwrap();
    assert_eq!(ed.value(), "  if (a) {\n    b;\n  }");
    ed.indent_line(1, IndentMode::Subtract).unwrap();
    assert_eq!(ed.value(), "  if (a) {\n  b;\n  }");
}

#[test]
fn plain_mode_indent_copies_previous_line() {
    let (mut ed, _clock) = editor("    a\nb");
    ed.indent_line(1, IndentMode::Smart).unwrap();
    assert_eq!(ed.value(), "    a\n    b");
}

// -------------------------------------------------------------------------------------------------
// Highlighting
// -------------------------------------------------------------------------------------------------

#[test]
fn highlighting_waits_for_the_resume_delay() {
    let text = "int x = 1;\n".repeat(30);
    let (mut ed, clock) = editor_with(&text, "clike");
    ed.set_viewport(0..10).unwrap();
    assert!(ed.next_deadline().is_some());
    assert_eq!(ed.tick().unwrap().passes, 0);
    assert!(!ed.rows()[0].contains("cm-keyword"));

    let mut idle = false;
    for _ in 0..100 {
        clock.advance(ed.options().resume_delay);
        if ed.tick().unwrap().idle {
            idle = true;
            break;
        }
    }
    assert!(idle);
    assert_eq!(ed.next_deadline(), None);
    assert!(ed.rows()[0].contains("<span class=\"cm-keyword\">int</span>"));
    assert_rows_fresh(&ed);
}

#[test]
fn edits_push_the_highlight_timer_back() {
    let (mut ed, clock) = editor_with("int a;", "clike");
    let first = ed.next_deadline().unwrap();
    clock.advance(Duration::from_millis(150));
    ed.insert_text(p(0, 6), " ").unwrap();
    let second = ed.next_deadline().unwrap();
    assert!(second > first);
    clock.advance(Duration::from_millis(100));
    assert_eq!(ed.tick().unwrap().passes, 0);
}

#[test]
fn opening_a_comment_restyles_following_lines() {
    let (mut ed, _clock) = editor_with("a\nb\nc", "clike");
    ed.highlight_until_idle().unwrap();
    ed.insert_text(p(0, 0), "/*").unwrap();
    ed.highlight_until_idle().unwrap();
    let styles: Vec<Option<&str>> = (0..3)
        .map(|n| ed.line(n).and_then(|l| l.styles().style_at(0)))
        .collect();
    assert_eq!(styles, vec![Some("comment"); 3]);
    assert_rows_fresh(&ed);
}

#[test]
fn switching_mode_clears_styles() {
    let (mut ed, _clock) = editor_with("int a;", "clike");
    ed.highlight_until_idle().unwrap();
    assert_eq!(ed.token_at(p(0, 2)).unwrap().style.as_deref(), Some("keyword"));
    ed.set_mode("plain").unwrap();
    ed.highlight_until_idle().unwrap();
    assert_eq!(ed.line(0).and_then(|l| l.styles().style_at(0)), None);
}

// -------------------------------------------------------------------------------------------------
// Observers
// -------------------------------------------------------------------------------------------------

#[test]
fn one_notification_per_operation() {
    let (mut ed, _clock) = editor("ab");
    let recorder = Recorder::default();
    let changes = recorder.changes.clone();
    let cursors = recorder.cursors.clone();
    ed.add_observer(Box::new(recorder));

    ed.operation(|ed| {
        ed.insert_text(p(0, 0), "x")?;
        ed.insert_text(p(0, 3), "y")?;
        Ok(())
    })
    .unwrap();

    let changes = changes.borrow();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].spans.len(), 2);
    assert_eq!(changes[0].spans[1].text, vec!["y".to_string()]);
    assert!(changes[0].activity.contains(Activity::TEXT | Activity::SELECTION));
    assert_eq!(cursors.borrow().as_slice(), [Selection::cursor(p(0, 4))]);
}

#[test]
fn selection_only_changes_skip_on_change() {
    let (mut ed, _clock) = editor("abc");
    let recorder = Recorder::default();
    let changes = recorder.changes.clone();
    let cursors = recorder.cursors.clone();
    ed.add_observer(Box::new(recorder));
    ed.set_selection(p(0, 1), p(0, 1), false).unwrap();
    ed.set_selection(p(0, 1), p(0, 1), false).unwrap();
    assert!(changes.borrow().is_empty());
    assert_eq!(cursors.borrow().len(), 1);
}

struct AutoClose;

impl ChangeObserver for AutoClose {
    fn on_change(&mut self, editor: &mut EditorModel, changes: &ChangeSet) {
        for span in &changes.spans {
            if span.text == ["("] {
                let at = Position::new(span.from.line, span.from.ch + 1);
                editor.replace_range(")", at, at).unwrap();
                editor.set_selection(at, at, false).unwrap();
            }
        }
    }
}

#[test]
fn observer_edits_are_reported_in_a_follow_up_round() {
    let (mut ed, _clock) = editor("f");
    ed.add_observer(Box::new(AutoClose));
    let recorder = Recorder::default();
    let changes = recorder.changes.clone();
    ed.add_observer(Box::new(recorder));

    ed.insert_text(p(0, 1), "(").unwrap();
    assert_eq!(ed.value(), "f()");
    assert_eq!(ed.cursor(), p(0, 2));
    let changes = changes.borrow();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[1].spans[0].text, vec![")".to_string()]);
    assert_rows_fresh(&ed);
}

struct Runaway;

impl ChangeObserver for Runaway {
    fn on_change(&mut self, editor: &mut EditorModel, _changes: &ChangeSet) {
        editor.insert_text(Position::origin(), "x").unwrap();
    }
}

#[test]
fn runaway_observers_are_cut_off() {
    let (mut ed, _clock) = editor("");
    ed.add_observer(Box::new(Runaway));
    let logs = capture_logs(|| {
        ed.insert_text(p(0, 0), "a").unwrap();
    });
    assert_eq!(ed.value(), format!("{}a", "x".repeat(MAX_OBSERVER_ROUNDS)));
    assert!(logs.contains("observer_rounds_exhausted"), "{logs}");
    assert!(!ed.in_operation());
}

// -------------------------------------------------------------------------------------------------
// Viewport
// -------------------------------------------------------------------------------------------------

#[test]
fn scrolling_keeps_rows_in_step() {
    let text: Vec<String> = (0..500).map(|n| format!("line {n}")).collect();
    let (mut ed, _clock) = editor(&text.join("\n"));
    ed.set_viewport(0..20).unwrap();
    assert!(ed.showing().start == 0 && ed.showing().end >= 20);
    ed.set_viewport(300..320).unwrap();
    assert!(ed.showing().start <= 300 && ed.showing().end >= 320);
    assert_rows_fresh(&ed);
    ed.insert_text(p(305, 0), "// ").unwrap();
    assert_eq!(ed.rows()[305 - ed.showing().start], "<pre>// line 305</pre>");
    assert_rows_fresh(&ed);
}

#[test]
fn read_only_is_logged() {
    let (mut ed, _clock) = editor("abc");
    ed.set_read_only(true);
    let logs = capture_logs(|| {
        ed.insert_text(p(0, 0), "x").unwrap();
    });
    assert_eq!(ed.value(), "abc");
    assert!(logs.contains("read_only_ignored"), "{logs}");
}
