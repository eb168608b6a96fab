use crate::Position;
use crate::buffer::Buffer;

/// Result of a bracket lookup next to a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BracketMatch {
    /// The bracket adjacent to the cursor.
    pub from: Position,
    /// Its partner (or the mismatching bracket), if one was reached within the scan limit.
    pub to: Option<Position>,
    pub matched: bool,
}

fn partner(c: char) -> Option<(char, bool)> {
    match c {
        '(' => Some((')', true)),
        '[' => Some((']', true)),
        '{' => Some(('}', true)),
        ')' => Some(('(', false)),
        ']' => Some(('[', false)),
        '}' => Some(('{', false)),
        _ => None,
    }
}

/// Find the bracket matching the one just before `pos` (or, failing that, at `pos`).
///
/// Only brackets carrying the same style as the starting bracket take part, so
/// brackets inside strings or comments do not pair with code. The scan covers at
/// most `max_lines` lines beyond the starting one.
pub fn match_bracket(buf: &Buffer, pos: Position, max_lines: usize) -> Option<BracketMatch> {
    let pos = buf.clip_pos(pos);
    let line = buf.line(pos.line)?;
    let text = line.text();
    let before = text[..pos.ch].char_indices().next_back();
    let at = text[pos.ch..].chars().next().map(|c| (pos.ch, c));
    let (ch_off, (want, forward)) = before
        .and_then(|(o, c)| partner(c).map(|p| (o, p)))
        .or_else(|| at.and_then(|(o, c)| partner(c).map(|p| (o, p))))?;
    let style = line.styles().style_at(ch_off);
    let from = Position::new(pos.line, ch_off);

    let mut stack = vec![want];
    let mut visit = |idx: usize, off: usize, c: char| -> Option<BracketMatch> {
        let (partner_c, opens) = partner(c)?;
        if buf.line(idx)?.styles().style_at(off) != style {
            return None;
        }
        // a bracket opening in the scan direction nests; otherwise it closes
        if opens == forward {
            stack.push(partner_c);
            return None;
        }
        let expected = stack.pop();
        let to = Some(Position::new(idx, off));
        if expected != Some(c) {
            return Some(BracketMatch { from, to, matched: false });
        }
        stack.is_empty().then_some(BracketMatch { from, to, matched: true })
    };

    if forward {
        let last = (pos.line + max_lines).min(buf.line_count() - 1);
        for idx in pos.line..=last {
            let t = buf.line(idx)?.text();
            let start = if idx == pos.line { ch_off + 1 } else { 0 };
            for (off, c) in t[start..].char_indices() {
                if let Some(found) = visit(idx, start + off, c) {
                    return Some(found);
                }
            }
        }
    } else {
        let first = pos.line.saturating_sub(max_lines);
        for idx in (first..=pos.line).rev() {
            let t = buf.line(idx)?.text();
            let end = if idx == pos.line { ch_off } else { t.len() };
            for (off, c) in t[..end].char_indices().rev() {
                if let Some(found) = visit(idx, off, c) {
                    return Some(found);
                }
            }
        }
    }
    Some(BracketMatch {
        from,
        to: None,
        matched: false,
    })
}
