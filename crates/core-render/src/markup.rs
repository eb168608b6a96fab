//! Per-line markup.
//!
//! A line renders as a sequence of spans: its style runs, decoration marks and
//! the selected sub-range are walked together and split at every boundary, so
//! each span carries one consistent set of classes.

use core_text::Line;

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn push_span(out: &mut String, classes: &str, text: &str) {
    if classes.is_empty() {
        escape_into(out, text);
    } else {
        out.push_str("<span class=\"");
        out.push_str(classes);
        out.push_str("\">");
        escape_into(out, text);
        out.push_str("</span>");
    }
}

/// Markup for `line`.
///
/// `selection` is the selected byte range on this line, `(from, None)` meaning
/// "to the end of the line". Style tags render as `cm-<style>`, mark styles are
/// appended verbatim, selected text gains `selected`. With `wrap` the spans are
/// enclosed in a `<pre>` carrying the line class.
pub fn line_markup(line: &Line, selection: Option<(usize, Option<usize>)>, wrap: bool) -> String {
    let text = line.text();
    let len = text.len();
    let sel = selection.map(|(from, to)| (from.min(len), to.unwrap_or(len).min(len)));
    let mut out = String::new();

    if wrap {
        match line.line_class() {
            Some(class) => {
                out.push_str("<pre class=\"");
                escape_into(&mut out, class);
                out.push_str("\">");
            }
            None => out.push_str("<pre>"),
        }
    }

    if text.is_empty() {
        // keep the row one character tall
        push_span(&mut out, if sel.is_some() { "selected" } else { "" }, " ");
    } else {
        let mut cuts = vec![0, len];
        let mut offset = 0;
        for run in line.styles().runs() {
            offset += run.len;
            cuts.push(offset);
        }
        for mark in line.marks() {
            cuts.push(mark.from);
            cuts.push(mark.end(len));
        }
        if let Some((from, to)) = sel {
            cuts.push(from);
            cuts.push(to);
        }
        cuts.retain(|c| *c <= len && text.is_char_boundary(*c));
        cuts.sort_unstable();
        cuts.dedup();

        let mut classes = String::new();
        for pair in cuts.windows(2) {
            let (start, end) = (pair[0], pair[1]);
            classes.clear();
            if let Some(style) = line.styles().style_at(start) {
                classes.push_str("cm-");
                classes.push_str(style);
            }
            for mark in line.marks() {
                if mark.from <= start && start < mark.end(len) {
                    if !classes.is_empty() {
                        classes.push(' ');
                    }
                    classes.push_str(&mark.style);
                }
            }
            if let Some((from, to)) = sel
                && from <= start
                && start < to
            {
                if !classes.is_empty() {
                    classes.push(' ');
                }
                classes.push_str("selected");
            }
            push_span(&mut out, &classes, &text[start..end]);
        }
    }

    if wrap {
        out.push_str("</pre>");
    }
    out
}
