//! Recursive descent over TLC's value syntax.

use super::{RecordStyle, ValueId, ValueIds, ValueKey, ValueNode, ValueParseError};
use crate::util::Scanner;
use std::cmp::Ordering;
use tracing::warn;

/// Parse the body of a state message into a `Bindings` container.
///
/// A line starting with `/\` at the indentation of the first binding (or
/// less) opens a new binding; any other line continues the current one. A
/// body without any `/\` is one binding. A binding whose value does not
/// parse is kept as a leaf holding the raw text.
///
/// A value may itself be a column of `/\ name = value` lines, which becomes
/// a nested `Bindings` container. The column of each `/\` decides which
/// container it belongs to.
pub fn parse_state<S: AsRef<str>>(lines: &[S], ids: &mut ValueIds) -> ValueNode {
    let root_id = ids.next_id();
    let items = split_bindings(lines)
        .iter()
        .map(|binding| parse_binding(binding, ids))
        .collect();
    ValueNode::record(root_id, ValueKey::name(""), RecordStyle::Bindings, items)
}

/// Parse one complete value. Trailing text is an error.
pub fn parse_value(text: &str, key: ValueKey, ids: &mut ValueIds) -> Result<ValueNode, ValueParseError> {
    parse_value_at(text, 0, key, ids)
}

/// Like [`parse_value`] for text whose first line starts at `column`.
fn parse_value_at(
    text: &str,
    column: usize,
    key: ValueKey,
    ids: &mut ValueIds,
) -> Result<ValueNode, ValueParseError> {
    let mut parser = ValueParser {
        sc: Scanner::new(text),
        ids,
        first_column: column,
    };
    let node = parser.value(key)?;
    parser.sc.skip_ws();
    if !parser.sc.is_at_end() {
        return Err(parser.error("unexpected text after value"));
    }
    Ok(node)
}

fn split_bindings<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let lines: Vec<&str> = lines
        .iter()
        .map(AsRef::as_ref)
        .filter(|line| !line.trim().is_empty())
        .collect();

    let Some(indent) = lines
        .iter()
        .find(|line| line.trim_start().starts_with("/\\"))
        .map(|line| indent_of(line))
    else {
        let joined = lines.iter().map(|l| l.trim()).collect::<Vec<_>>().join("\n");
        return if joined.is_empty() { Vec::new() } else { vec![joined] };
    };

    let mut bindings: Vec<String> = Vec::new();
    for line in lines {
        let trimmed = line.trim_start();
        if indent_of(line) <= indent && trimmed.starts_with("/\\") {
            // Blank out the marker so columns in the binding match the line.
            let lead = &line[..line.len() - trimmed.len()];
            bindings.push(format!("{lead}  {}", &trimmed[2..]));
        } else if let Some(current) = bindings.last_mut() {
            current.push('\n');
            current.push_str(line);
        }
    }
    bindings
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn parse_binding(text: &str, ids: &mut ValueIds) -> ValueNode {
    let Some((name, value)) = split_assignment(text) else {
        warn!(binding = text.trim(), "State line is not an assignment");
        return ValueNode::leaf(ids.next_id(), ValueKey::name(""), text.trim());
    };
    let offset = text.len() - value.len();
    let line_start = text[..offset].rfind('\n').map_or(0, |nl| nl + 1);
    let column = text[line_start..offset].chars().count();
    match parse_value_at(value, column, ValueKey::name(name), ids) {
        Ok(node) => node,
        Err(err) => {
            warn!(variable = name, error = %err, "Unparseable value, keeping raw text");
            ValueNode::leaf(ids.next_id(), ValueKey::name(name), value.trim())
        }
    }
}

/// Split `name = value` at the first `=` surrounded by whitespace.
fn split_assignment(text: &str) -> Option<(&str, &str)> {
    let bytes = text.as_bytes();
    let idx = (1..bytes.len()).find(|&i| {
        bytes[i] == b'='
            && bytes[i - 1].is_ascii_whitespace()
            && bytes.get(i + 1).is_none_or(u8::is_ascii_whitespace)
    })?;
    let name = text[..idx].trim();
    (!name.is_empty()).then(|| (name, &text[idx + 1..]))
}

struct ValueParser<'a, 'i> {
    sc: Scanner<'a>,
    ids: &'i mut ValueIds,
    /// Column of the first character of the input in its source line.
    first_column: usize,
}

impl<'a> ValueParser<'a, '_> {
    fn error(&self, message: &'static str) -> ValueParseError {
        ValueParseError {
            offset: self.sc.pos(),
            message,
        }
    }

    /// Source column of the cursor, in characters.
    fn column(&self) -> usize {
        let consumed = self.sc.slice_from(0);
        match consumed.rfind('\n') {
            Some(nl) => consumed[nl + 1..].chars().count(),
            None => self.first_column + consumed.chars().count(),
        }
    }

    fn value(&mut self, key: ValueKey) -> Result<ValueNode, ValueParseError> {
        self.sc.skip_ws();
        let id = self.ids.next_id();
        if self.sc.starts_with("/\\") {
            return self.conjunction(id, key);
        }
        if self.sc.eat("{") {
            let items = self.list("}")?;
            return Ok(ValueNode::collection(id, key, items));
        }
        if self.sc.eat("<<") {
            let items = self.list(">>")?;
            return Ok(ValueNode::record(id, key, RecordStyle::Sequence, items));
        }
        if self.sc.eat("[") {
            let items = self.fields()?;
            return Ok(ValueNode::record(id, key, RecordStyle::Record, items));
        }
        if self.sc.starts_with("(") {
            return self.function_or_raw(id, key);
        }
        let text = if self.sc.starts_with("\"") {
            self.string()?
        } else {
            self.scalar()?
        };
        Ok(ValueNode::leaf(id, key, text))
    }

    /// Comma-separated values up to `close`, keyed by 1-based position.
    fn list(&mut self, close: &str) -> Result<Vec<ValueNode>, ValueParseError> {
        let mut items = Vec::new();
        self.sc.skip_ws();
        if self.sc.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.value(ValueKey::Index(items.len() + 1))?);
            self.sc.skip_ws();
            if self.sc.eat(",") {
                continue;
            }
            if self.sc.eat(close) {
                return Ok(items);
            }
            return Err(self.error("expected ',' or closing bracket"));
        }
    }

    fn fields(&mut self) -> Result<Vec<ValueNode>, ValueParseError> {
        let mut items = Vec::new();
        self.sc.skip_ws();
        if self.sc.eat("]") {
            return Ok(items);
        }
        loop {
            self.sc.skip_ws();
            let field = self.sc.ident().ok_or_else(|| self.error("expected record field"))?;
            self.sc.skip_ws();
            if !self.sc.eat("|->") {
                return Err(self.error("expected '|->'"));
            }
            items.push(self.value(ValueKey::name(field))?);
            self.sc.skip_ws();
            if self.sc.eat(",") {
                continue;
            }
            if self.sc.eat("]") {
                return Ok(items);
            }
            return Err(self.error("expected ',' or ']'"));
        }
    }

    /// `/\ name = value` items sharing the column of the first `/\`. A `/\`
    /// further left ends the container; one further right is an error.
    fn conjunction(&mut self, id: ValueId, key: ValueKey) -> Result<ValueNode, ValueParseError> {
        let column = self.column();
        let mut items = Vec::new();
        loop {
            self.sc.eat("/\\");
            self.sc.skip_ws();
            let name = self.sc.ident().ok_or_else(|| self.error("expected a name after '/\\'"))?;
            self.sc.skip_ws();
            if !self.sc.eat("=") {
                return Err(self.error("expected '='"));
            }
            items.push(self.value(ValueKey::name(name))?);

            let end = self.sc.pos();
            self.sc.skip_ws();
            if self.sc.starts_with("/\\") {
                match self.column().cmp(&column) {
                    Ordering::Equal => continue,
                    Ordering::Greater => return Err(self.error("misaligned '/\\'")),
                    Ordering::Less => {}
                }
            }
            self.sc.reset(end);
            return Ok(ValueNode::record(id, key, RecordStyle::Bindings, items));
        }
    }

    /// `(k :> v @@ ...)` or, failing that, a parenthesized literal kept raw.
    fn function_or_raw(&mut self, id: ValueId, key: ValueKey) -> Result<ValueNode, ValueParseError> {
        let start = self.sc.pos();
        self.sc.eat("(");

        let mut ahead = self.sc.clone();
        let is_function = Self::argument_text(&mut ahead).is_ok() && {
            ahead.skip_ws();
            ahead.starts_with(":>")
        };
        if !is_function {
            self.sc.reset(start);
            let raw = self.balanced()?;
            return Ok(ValueNode::leaf(id, key, raw));
        }

        let mut items = Vec::new();
        loop {
            let argument = Self::argument_text(&mut self.sc)?;
            self.sc.skip_ws();
            if !self.sc.eat(":>") {
                return Err(self.error("expected ':>'"));
            }
            items.push(self.value(ValueKey::Name(argument))?);
            self.sc.skip_ws();
            if self.sc.eat("@@") {
                continue;
            }
            if self.sc.eat(")") {
                return Ok(ValueNode::record(id, key, RecordStyle::Function, items));
            }
            return Err(self.error("expected '@@' or ')'"));
        }
    }

    /// Canonical text of a function argument. Arguments are not nodes and
    /// take no ids.
    fn argument_text(sc: &mut Scanner<'a>) -> Result<String, ValueParseError> {
        let mut scratch = ValueIds::disabled();
        let mut parser = ValueParser {
            sc: sc.clone(),
            ids: &mut scratch,
            first_column: 0,
        };
        let node = parser.value(ValueKey::Index(0))?;
        *sc = parser.sc;
        Ok(node.text)
    }

    fn balanced(&mut self) -> Result<&'a str, ValueParseError> {
        let start = self.sc.pos();
        let mut depth = 0usize;
        while let Some(c) = self.sc.peek() {
            match c {
                '"' => {
                    self.string()?;
                    continue;
                }
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        self.sc.bump();
                        return Ok(self.sc.slice_from(start));
                    }
                }
                _ => {}
            }
            self.sc.bump();
        }
        Err(self.error("unbalanced parenthesis"))
    }

    fn string(&mut self) -> Result<&'a str, ValueParseError> {
        let start = self.sc.pos();
        self.sc.eat("\"");
        loop {
            match self.sc.bump() {
                None => return Err(self.error("unterminated string")),
                Some('\\') => {
                    self.sc.bump();
                }
                Some('"') => return Ok(self.sc.slice_from(start)),
                Some(_) => {}
            }
        }
    }

    fn scalar(&mut self) -> Result<&'a str, ValueParseError> {
        let start = self.sc.pos();
        while let Some(c) = self.sc.peek() {
            let delimiter = c.is_whitespace()
                || matches!(c, ',' | '{' | '}' | '[' | ']' | '(' | ')' | '"')
                || ["<<", ">>", ":>", "@@", "|->"].iter().any(|d| self.sc.starts_with(d));
            if delimiter {
                break;
            }
            self.sc.bump();
        }
        if self.sc.pos() == start {
            return Err(self.error("expected a value"));
        }
        Ok(self.sc.slice_from(start))
    }
}
