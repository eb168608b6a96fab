//! Cursor over a single line handed to a mode's `token` function.
//!
//! A token is the text between `start()` and `pos()`; the highlighter moves
//! `start` up to `pos` before every call, and the mode must advance `pos`.

use core_text::count_column;
use regex::Regex;

/// Something a single character can be tested against.
pub trait CharPattern {
    fn matches(&self, c: char) -> bool;
}

impl CharPattern for char {
    fn matches(&self, c: char) -> bool {
        *self == c
    }
}

impl CharPattern for &Regex {
    fn matches(&self, c: char) -> bool {
        let mut buf = [0u8; 4];
        self.is_match(c.encode_utf8(&mut buf))
    }
}

impl<F: Fn(char) -> bool> CharPattern for F {
    fn matches(&self, c: char) -> bool {
        self(c)
    }
}

#[derive(Debug, Clone)]
pub struct StringStream<'a> {
    text: &'a str,
    pos: usize,
    start: usize,
    tab_size: usize,
}

impl<'a> StringStream<'a> {
    pub fn new(text: &'a str, tab_size: usize) -> Self {
        Self {
            text,
            pos: 0,
            start: 0,
            tab_size,
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub(crate) fn begin_token(&mut self) {
        self.start = self.pos;
    }

    /// At start of line.
    pub fn sol(&self) -> bool {
        self.pos == 0
    }

    /// At end of line.
    pub fn eol(&self) -> bool {
        self.pos >= self.text.len()
    }

    pub fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Consume the next char if it matches.
    pub fn eat(&mut self, pattern: impl CharPattern) -> Option<char> {
        let c = self.peek()?;
        if pattern.matches(c) {
            self.pos += c.len_utf8();
            Some(c)
        } else {
            None
        }
    }

    /// Consume chars while they match. Returns whether anything was eaten.
    pub fn eat_while(&mut self, pattern: impl CharPattern) -> bool {
        let from = self.pos;
        while let Some(c) = self.peek() {
            if !pattern.matches(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        self.pos > from
    }

    pub fn eat_space(&mut self) -> bool {
        self.eat_while(char::is_whitespace)
    }

    pub fn skip_to_end(&mut self) {
        self.pos = self.text.len();
    }

    /// Move to just before the next occurrence of `c`. Returns false (and stays
    /// put) when there is none.
    pub fn skip_to(&mut self, c: char) -> bool {
        match self.text[self.pos..].find(c) {
            Some(off) => {
                self.pos += off;
                true
            }
            None => false,
        }
    }

    /// Test for `literal` at the cursor, optionally consuming it.
    pub fn match_str(&mut self, literal: &str, consume: bool, fold_case: bool) -> bool {
        let Some(candidate) = self.text[self.pos..].get(..literal.len()) else {
            return false;
        };
        let hit = if fold_case {
            candidate.eq_ignore_ascii_case(literal)
        } else {
            candidate == literal
        };
        if hit && consume {
            self.pos += literal.len();
        }
        hit
    }

    /// Match `re` anchored at the cursor, optionally consuming it.
    pub fn match_regex(&mut self, re: &Regex, consume: bool) -> Option<&'a str> {
        let m = re.find_at(self.text, self.pos)?;
        if m.start() != self.pos || m.is_empty() {
            return None;
        }
        if consume {
            self.pos = m.end();
        }
        Some(m.as_str())
    }

    /// Un-consume `n` bytes (never past the token start).
    pub fn back_up(&mut self, n: usize) {
        let mut pos = self.pos.saturating_sub(n).max(self.start);
        while !self.text.is_char_boundary(pos) {
            pos -= 1;
        }
        self.pos = pos;
    }

    /// Text of the token so far.
    pub fn current(&self) -> &'a str {
        &self.text[self.start..self.pos]
    }

    /// Visual column of the token start.
    pub fn column(&self) -> usize {
        count_column(self.text, self.start, self.tab_size)
    }

    /// Visual width of the line's leading whitespace.
    pub fn indentation(&self) -> usize {
        let ws = self
            .text
            .find(|c: char| c != ' ' && c != '\t')
            .unwrap_or(self.text.len());
        count_column(self.text, ws, self.tab_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eat_and_current() {
        let mut s = StringStream::new("foo_1 + 2", 4);
        assert!(s.sol());
        assert!(s.eat_while(|c: char| c.is_alphanumeric() || c == '_'));
        assert_eq!(s.current(), "foo_1");
        assert!(s.eat_space());
        s.begin_token();
        assert_eq!(s.eat('+'), Some('+'));
        assert_eq!(s.eat('x'), None);
        assert_eq!(s.current(), "+");
        s.skip_to_end();
        assert!(s.eol());
    }

    #[test]
    fn regex_is_anchored() {
        let re = Regex::new(r"\d+").unwrap();
        let mut s = StringStream::new("ab12", 4);
        assert_eq!(s.match_regex(&re, true), None);
        s.next();
        s.next();
        assert_eq!(s.match_regex(&re, false), Some("12"));
        assert_eq!(s.pos(), 2);
        assert_eq!(s.match_regex(&re, true), Some("12"));
        assert!(s.eol());
    }

    #[test]
    fn match_str_folds_case() {
        let mut s = StringStream::new("SELECT x", 4);
        assert!(!s.match_str("select", false, false));
        assert!(s.match_str("select", true, true));
        assert_eq!(s.pos(), 6);
        assert!(!s.match_str("xyzzy", true, false));
    }

    #[test]
    fn skip_to_and_back_up() {
        let mut s = StringStream::new("a*/b", 4);
        assert!(s.skip_to('/'));
        assert_eq!(s.pos(), 2);
        assert!(!s.skip_to('#'));
        s.next();
        s.back_up(10);
        assert_eq!(s.pos(), 0);
    }

    #[test]
    fn columns_expand_tabs() {
        let mut s = StringStream::new("\t  x", 4);
        assert_eq!(s.indentation(), 6);
        s.eat_space();
        s.begin_token();
        assert_eq!(s.column(), 6);
    }
}
