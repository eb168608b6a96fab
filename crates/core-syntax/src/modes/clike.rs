//! A small C-family tokenizer: keywords, numbers, strings, line and block
//! comments, with brace-driven indentation.

use crate::mode::{Mode, ModeConfig};
use crate::stream::StringStream;
use core_text::StyleTag;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::LazyLock;

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"0[xX][0-9a-fA-F]+|[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?[uUlLfF]*").expect("number pattern compiles")
});

const KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "int", "long", "register", "return", "short",
    "signed", "sizeof", "static", "struct", "switch", "typedef", "union", "unsigned", "void",
    "volatile", "while",
];

const ATOMS: &[&str] = &["true", "false", "null", "NULL"];

#[derive(Debug, Clone)]
pub struct CLike {
    keywords: HashSet<&'static str>,
    atoms: HashSet<&'static str>,
}

impl Default for CLike {
    fn default() -> Self {
        Self {
            keywords: KEYWORDS.iter().copied().collect(),
            atoms: ATOMS.iter().copied().collect(),
        }
    }
}

/// Tokenizer state carried between lines.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CLikeState {
    /// Inside an unterminated `/* */` comment.
    pub in_comment: bool,
    /// Unclosed brackets, innermost last.
    pub brackets: Vec<char>,
}

const STYLE_COMMENT: StyleTag = Cow::Borrowed("comment");

fn closer(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

impl CLike {
    fn block_comment(stream: &mut StringStream<'_>, state: &mut CLikeState) -> Option<StyleTag> {
        loop {
            if !stream.skip_to('*') {
                stream.skip_to_end();
                return Some(STYLE_COMMENT);
            }
            stream.next();
            if stream.eat('/').is_some() {
                state.in_comment = false;
                return Some(STYLE_COMMENT);
            }
        }
    }

    fn string(stream: &mut StringStream<'_>, quote: char) -> Option<StyleTag> {
        let mut escaped = false;
        while let Some(c) = stream.next() {
            if c == quote && !escaped {
                break;
            }
            escaped = !escaped && c == '\\';
        }
        Some(Cow::Borrowed("string"))
    }
}

impl Mode for CLike {
    type State = CLikeState;

    fn name(&self) -> &str {
        "clike"
    }

    fn start_state(&self, _config: &ModeConfig) -> CLikeState {
        CLikeState::default()
    }

    fn token(&self, stream: &mut StringStream<'_>, state: &mut CLikeState) -> Option<StyleTag> {
        if state.in_comment {
            return Self::block_comment(stream, state);
        }
        if stream.eat_space() {
            return None;
        }
        if stream.match_str("//", true, false) {
            stream.skip_to_end();
            return Some(STYLE_COMMENT);
        }
        if stream.match_str("/*", true, false) {
            state.in_comment = true;
            return Self::block_comment(stream, state);
        }
        if stream.match_regex(&NUMBER, true).is_some() {
            return Some(Cow::Borrowed("number"));
        }
        let c = stream.next()?;
        match c {
            '"' | '\'' => Self::string(stream, c),
            '{' | '(' | '[' => {
                state.brackets.push(c);
                None
            }
            '}' | ')' | ']' => {
                if state.brackets.last().is_some_and(|open| closer(*open) == c) {
                    state.brackets.pop();
                }
                None
            }
            c if c.is_alphabetic() || c == '_' => {
                stream.eat_while(|c: char| c.is_alphanumeric() || c == '_');
                let word = stream.current();
                if self.keywords.contains(word) {
                    Some(Cow::Borrowed("keyword"))
                } else if self.atoms.contains(word) {
                    Some(Cow::Borrowed("atom"))
                } else {
                    Some(Cow::Borrowed("variable"))
                }
            }
            c if "+-*/%=<>!&|^~?:".contains(c) => {
                stream.eat_while(|c: char| "+-*/%=<>!&|^~?:".contains(c));
                Some(Cow::Borrowed("operator"))
            }
            _ => None,
        }
    }

    fn indent(&self, state: &CLikeState, text_after: &str, config: &ModeConfig) -> Option<usize> {
        if state.in_comment {
            return None;
        }
        let mut depth = state.brackets.len();
        if let Some(first) = text_after.chars().next()
            && state.brackets.last().is_some_and(|open| closer(*open) == first)
        {
            depth -= 1;
        }
        Some(depth * config.indent_unit)
    }

    fn electric_chars(&self) -> &str {
        "}"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(line: &str, state: &mut CLikeState) -> Vec<(String, Option<String>)> {
        let mode = CLike::default();
        let mut stream = StringStream::new(line, 4);
        let mut out = Vec::new();
        while !stream.eol() {
            stream.begin_token();
            let style = Mode::token(&mode, &mut stream, state);
            out.push((stream.current().to_owned(), style.map(|s| s.into_owned())));
        }
        out
    }

    fn s(v: &str) -> Option<String> {
        Some(v.to_owned())
    }

    #[test]
    fn classifies_basic_tokens() {
        let mut state = CLikeState::default();
        let toks = tokens("int x = 0x1F; // hi", &mut state);
        assert_eq!(
            toks,
            vec![
                ("int".into(), s("keyword")),
                (" ".into(), None),
                ("x".into(), s("variable")),
                (" ".into(), None),
                ("=".into(), s("operator")),
                (" ".into(), None),
                ("0x1F".into(), s("number")),
                (";".into(), None),
                (" ".into(), None),
                ("// hi".into(), s("comment")),
            ]
        );
    }

    #[test]
    fn number_literals_take_suffixes_and_exponents() {
        let mut state = CLikeState::default();
        let toks = tokens("1.5e-3f 42UL", &mut state);
        assert_eq!(
            toks,
            vec![
                ("1.5e-3f".into(), s("number")),
                (" ".into(), None),
                ("42UL".into(), s("number")),
            ]
        );
    }

    #[test]
    fn block_comment_spans_lines() {
        let mut state = CLikeState::default();
        tokens("a /* open", &mut state);
        assert!(state.in_comment);
        let toks = tokens("still */ b", &mut state);
        assert!(!state.in_comment);
        assert_eq!(toks[0], ("still */".into(), s("comment")));
        assert_eq!(toks.last().cloned(), Some(("b".into(), s("variable"))));
    }

    #[test]
    fn strings_honour_escapes() {
        let mut state = CLikeState::default();
        let toks = tokens(r#""a\"b" x"#, &mut state);
        assert_eq!(toks[0], (r#""a\"b""#.into(), s("string")));
    }

    #[test]
    fn indentation_follows_brackets() {
        let mode = CLike::default();
        let cfg = ModeConfig {
            indent_unit: 4,
            tab_size: 4,
        };
        let mut state = CLikeState::default();
        tokens("int main() {", &mut state);
        assert_eq!(Mode::indent(&mode, &state, "return 0;", &cfg), Some(4));
        assert_eq!(Mode::indent(&mode, &state, "}", &cfg), Some(0));
        tokens("  if (x) {", &mut state);
        assert_eq!(Mode::indent(&mode, &state, "y;", &cfg), Some(8));
    }
}
