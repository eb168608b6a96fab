//! Edit scripts replayed by the driver.
//!
//! One command per line; blank lines and `#` comments are skipped.
//!
//! ```text
//! insert 0:4 hello\nworld
//! delete 1:0 1:5
//! select 0:0 0:5 extend
//! undo
//! redo
//! scroll 100 140
//! wait 250
//! ```
//!
//! Positions are `LINE:CH` (zero based, `CH` in bytes). Insert text runs to the
//! end of the line after a single separating space; `\n`, `\t` and `\\` are
//! unescaped.

use core_text::Position;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Insert { at: Position, text: String },
    Delete { from: Position, to: Position },
    Select { anchor: Position, head: Position, extend: bool },
    Undo,
    Redo,
    Scroll { start: usize, end: usize },
    Wait(Duration),
}

/// A parsed command and the script line it came from (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub line: usize,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("script line {line}: {reason}")]
pub struct ScriptError {
    pub line: usize,
    pub reason: String,
}

pub fn parse_script(source: &str) -> Result<Vec<Step>, ScriptError> {
    let mut steps = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let command = parse_command(trimmed).map_err(|reason| ScriptError { line, reason })?;
        steps.push(Step { line, command });
    }
    Ok(steps)
}

fn parse_command(line: &str) -> Result<Command, String> {
    let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
    match verb {
        "insert" => {
            let (pos, text) = rest.split_once(' ').unwrap_or((rest, ""));
            Ok(Command::Insert {
                at: parse_pos(pos)?,
                text: unescape(text)?,
            })
        }
        "delete" => {
            let [from, to] = words::<2>(verb, rest)?;
            Ok(Command::Delete {
                from: parse_pos(from)?,
                to: parse_pos(to)?,
            })
        }
        "select" => {
            let args: Vec<&str> = rest.split_whitespace().collect();
            let extend = match args.get(2).copied() {
                None => false,
                Some("extend") => true,
                Some(other) => return Err(format!("unexpected `{other}` after select")),
            };
            if !(2..=3).contains(&args.len()) {
                return Err("select takes two positions".into());
            }
            Ok(Command::Select {
                anchor: parse_pos(args[0])?,
                head: parse_pos(args[1])?,
                extend,
            })
        }
        "undo" | "redo" if !rest.trim().is_empty() => Err(format!("{verb} takes no arguments")),
        "undo" => Ok(Command::Undo),
        "redo" => Ok(Command::Redo),
        "scroll" => {
            let [start, end] = words::<2>(verb, rest)?;
            let (start, end) = (parse_num(start)?, parse_num(end)?);
            if end < start {
                return Err(format!("scroll end {end} before start {start}"));
            }
            Ok(Command::Scroll { start, end })
        }
        "wait" => {
            let [ms] = words::<1>(verb, rest)?;
            Ok(Command::Wait(Duration::from_millis(parse_num(ms)? as u64)))
        }
        other => Err(format!("unknown command `{other}`")),
    }
}

fn words<'a, const N: usize>(verb: &str, rest: &'a str) -> Result<[&'a str; N], String> {
    let args: Vec<&str> = rest.split_whitespace().collect();
    args.try_into()
        .map_err(|args: Vec<&str>| format!("{verb} takes {N} arguments, got {}", args.len()))
}

fn parse_num(s: &str) -> Result<usize, String> {
    s.parse().map_err(|_| format!("`{s}` is not a number"))
}

fn parse_pos(s: &str) -> Result<Position, String> {
    let (line, ch) = s
        .split_once(':')
        .ok_or_else(|| format!("`{s}` is not a LINE:CH position"))?;
    Ok(Position::new(parse_num(line)?, parse_num(ch)?))
}

fn unescape(s: &str) -> Result<String, String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => return Err(format!("unknown escape `\\{other}`")),
            None => return Err("dangling `\\`".into()),
        }
    }
    Ok(out)
}
