//! Internal scanning helpers shared by the message handlers.

use crate::model::{Position, Range};
use chrono::NaiveDateTime;

const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Byte cursor over a line of TLC text.
///
/// All matching methods are all-or-nothing: on failure the cursor does not
/// move, so callers can chain alternatives without saving positions.
#[derive(Debug, Clone)]
pub(crate) struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn reset(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub(crate) fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    pub(crate) fn slice_from(&self, start: usize) -> &'a str {
        &self.src[start..self.pos]
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub(crate) fn starts_with(&self, lit: &str) -> bool {
        self.rest().starts_with(lit)
    }

    pub(crate) fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub(crate) fn eat(&mut self, lit: &str) -> bool {
        if self.starts_with(lit) {
            self.pos += lit.len();
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_any(&mut self, lits: &[&str]) -> bool {
        lits.iter().any(|lit| self.eat(lit))
    }

    pub(crate) fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// Unsigned integer, accepting `,` thousands grouping (`5,184`).
    pub(crate) fn number(&mut self) -> Option<u64> {
        let start = self.pos;
        let mut digits = String::new();
        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            digits.push(c);
            self.bump();
        }
        if digits.is_empty() {
            return None;
        }
        loop {
            let rest = self.rest().as_bytes();
            let is_group = rest.len() >= 4
                && rest[0] == b','
                && rest[1..4].iter().all(u8::is_ascii_digit)
                && rest.get(4).is_none_or(|b| !b.is_ascii_digit());
            if !is_group {
                break;
            }
            digits.push_str(&self.rest()[1..4]);
            self.pos += 4;
        }
        match digits.parse() {
            Ok(n) => Some(n),
            Err(_) => {
                self.reset(start);
                None
            }
        }
    }

    /// TLA+ identifier (letters, digits, `_`, and `!` for instance paths).
    pub(crate) fn ident(&mut self) -> Option<&'a str> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '!')
        {
            self.bump();
        }
        (self.pos > start).then(|| self.slice_from(start))
    }

    /// Advance to the next occurrence of `lit`, returning the skipped text.
    /// The cursor ends up right after `lit`.
    pub(crate) fn take_until(&mut self, lit: &str) -> Option<&'a str> {
        let idx = self.rest().find(lit)?;
        let taken = &self.rest()[..idx];
        self.pos += idx + lit.len();
        Some(taken)
    }
}

/// A TLC source location: `line L, col C to line L2, col C2 of module M`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TlcLocation {
    pub range: Range,
    pub module: String,
}

/// Match a TLC location at the scanner position.
///
/// Accepts both the short form used in state headers and coverage
/// (`line 13, col 9 to line 15, col 24 of module foo`) and the long form used
/// in error messages (`Line 38, column 10 to line 50, column 44 in foo`).
pub(crate) fn scan_location(sc: &mut Scanner<'_>) -> Option<TlcLocation> {
    let start = sc.pos();
    let location = scan_location_inner(sc);
    if location.is_none() {
        sc.reset(start);
    }
    location
}

fn scan_location_inner(sc: &mut Scanner<'_>) -> Option<TlcLocation> {
    if !sc.eat_any(&["line ", "Line "]) {
        return None;
    }
    let (start_line, start_col) = scan_line_col(sc)?;
    if !sc.eat(" to line ") {
        return None;
    }
    let (end_line, end_col) = scan_line_col(sc)?;
    if !sc.eat_any(&[" of module ", " in "]) {
        return None;
    }
    let module = sc.ident()?.to_string();
    Some(TlcLocation {
        range: Range::new(
            Position::new(start_line.saturating_sub(1), start_col.saturating_sub(1)),
            Position::new(end_line.saturating_sub(1), end_col),
        ),
        module,
    })
}

fn scan_line_col(sc: &mut Scanner<'_>) -> Option<(u32, u32)> {
    let line = sc.number()?;
    if !sc.eat(", col") {
        return None;
    }
    sc.eat("umn");
    if !sc.eat(" ") {
        return None;
    }
    let col = sc.number()?;
    Some((u32::try_from(line).ok()?, u32::try_from(col).ok()?))
}

/// Find the first TLC location anywhere in `text`.
///
/// Returns the byte span of the match together with the location.
pub(crate) fn find_location(text: &str) -> Option<(usize, usize, TlcLocation)> {
    text.char_indices()
        .filter(|&(i, c)| matches!(c, 'l' | 'L') && text[i + 1..].starts_with("ine "))
        .find_map(|(begin, _)| {
            let mut sc = Scanner::new(&text[begin..]);
            scan_location(&mut sc).map(|location| (begin, begin + sc.pos(), location))
        })
}

pub(crate) fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), DATE_TIME_FORMAT).ok()
}

/// The date-time between the last pair of parentheses:
/// `Starting... (2019-08-17 00:11:08)`.
pub(crate) fn parenthesized_date_time(text: &str) -> Option<NaiveDateTime> {
    let open = text.rfind('(')?;
    let close = open + text[open..].find(')')?;
    parse_date_time(&text[open + 1..close])
}

/// Elapsed time since `origin` as `HH:MM:SS`. Hours are not wrapped at 24.
pub(crate) fn format_elapsed(origin: NaiveDateTime, at: NaiveDateTime) -> String {
    let secs = (at - origin).num_seconds().max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Parse a TLC duration such as `886ms`, `12s`, `01min 05s` or `2h 01min`.
pub(crate) fn parse_duration_ms(text: &str) -> Option<u64> {
    let mut total = 0u64;
    let mut seen = false;
    for token in text.split_whitespace() {
        let split = token.find(|c: char| !c.is_ascii_digit())?;
        let (digits, unit) = token.split_at(split);
        let value: u64 = digits.parse().ok()?;
        let factor = match unit {
            "ms" => 1,
            "s" => 1_000,
            "min" => 60_000,
            "h" => 3_600_000,
            _ => return None,
        };
        total = total.checked_add(value.checked_mul(factor)?)?;
        seen = true;
    }
    seen.then_some(total)
}
