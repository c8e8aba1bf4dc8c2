//! Line and message framing over TLC's stdout.
//!
//! TLC wraps most of its output in marker lines:
//!
//! ```text
//! @!@!@STARTMSG 2185:0 @!@!@
//! Starting... (2019-08-17 00:11:08)
//! @!@!@ENDMSG 2185 @!@!@
//! ```
//!
//! The [`Tokenizer`] turns arbitrarily chunked bytes into a stream of
//! [`Event`]s: complete framed messages and unframed plain lines. Markers are
//! also recognized in the middle of a physical line, since TLC does not
//! always flush a line break before or after them.

use crate::codes::Severity;
use std::collections::VecDeque;
use tracing::{debug, trace};

const START_PREFIX: &str = "@!@!@STARTMSG ";
const END_PREFIX: &str = "@!@!@ENDMSG ";
const MARKER_SUFFIX: &str = " @!@!@";

/// A complete framed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub code: u32,
    pub severity: Severity,
    /// Body lines between the markers, in order.
    pub lines: Vec<String>,
    /// Messages that opened before this one was closed.
    pub nested: Vec<NestedMessage>,
}

impl Message {
    fn open(code: u32, severity: Severity) -> Self {
        Self {
            code,
            severity,
            lines: Vec::new(),
            nested: Vec::new(),
        }
    }
}

/// A message framed inside another one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedMessage {
    /// Number of host body lines that preceded the nested message.
    pub at: usize,
    pub message: Message,
}

/// Tokenizer output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Message(Message),
    /// A line outside of any message.
    Line(String),
}

enum Marker {
    Start { code: u32, severity: Severity },
    End { code: u32 },
}

/// Incremental TLC output tokenizer.
///
/// Feed bytes with [`push`](Self::push) and drain events by iterating. The
/// iterator yields `None` when it needs more input and resumes after the
/// next push.
#[derive(Debug, Default)]
pub struct Tokenizer {
    buf: Vec<u8>,
    open: Vec<Message>,
    events: VecDeque<Event>,
    retain_raw: bool,
    raw: Vec<String>,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep every decoded physical line for [`take_raw_lines`](Self::take_raw_lines).
    pub fn retain_raw(mut self, retain: bool) -> Self {
        self.retain_raw = retain;
        self
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
        let mut consumed = 0;
        while let Some(offset) = self.buf[consumed..].iter().position(|&b| b == b'\n') {
            let end = consumed + offset;
            let line = decode_line(&self.buf[consumed..end]);
            consumed = end + 1;
            self.process_line(line);
        }
        self.buf.drain(..consumed);
    }

    /// Flush the trailing partial line and drop any message left open.
    pub fn finish(&mut self) {
        if !self.buf.is_empty() {
            let line = decode_line(&self.buf);
            self.buf.clear();
            self.process_line(line);
        }
        for message in self.open.drain(..) {
            debug!(
                code = message.code,
                lines = message.lines.len(),
                "Dropping message left open at end of stream"
            );
        }
    }

    /// Whether a framed message is currently open.
    pub fn in_message(&self) -> bool {
        !self.open.is_empty()
    }

    pub fn take_raw_lines(&mut self) -> Vec<String> {
        std::mem::take(&mut self.raw)
    }

    fn process_line(&mut self, line: String) {
        if self.retain_raw {
            self.raw.push(line.clone());
        }

        let mut rest = line.as_str();
        let mut text = String::new();
        let mut saw_marker = false;

        while let Some(idx) = find_marker(rest) {
            text.push_str(&rest[..idx]);
            let candidate = &rest[idx..];
            match parse_marker(candidate) {
                Some((Marker::Start { code, severity }, len)) => {
                    if !text.is_empty() {
                        self.emit_text(std::mem::take(&mut text));
                    }
                    trace!(code, ?severity, "Message start");
                    self.open.push(Message::open(code, severity));
                    rest = &candidate[len..];
                    saw_marker = true;
                }
                Some((Marker::End { code }, len)) if self.is_open(code) => {
                    if !text.is_empty() {
                        self.emit_text(std::mem::take(&mut text));
                    }
                    trace!(code, "Message end");
                    self.close(code);
                    rest = &candidate[len..];
                    saw_marker = true;
                }
                _ => {
                    // Not a marker we can act on; keep the '@' as text.
                    text.push('@');
                    rest = &candidate[1..];
                }
            }
        }
        text.push_str(rest);

        if !(saw_marker && text.is_empty()) {
            self.emit_text(text);
        }
    }

    fn emit_text(&mut self, text: String) {
        match self.open.last_mut() {
            Some(message) => message.lines.push(text),
            None => self.events.push_back(Event::Line(text)),
        }
    }

    fn is_open(&self, code: u32) -> bool {
        self.open.iter().any(|m| m.code == code)
    }

    fn close(&mut self, code: u32) {
        while let Some(message) = self.open.pop() {
            if message.code != code {
                debug!(
                    code = message.code,
                    closing = code,
                    "Dropping message interrupted by an outer end marker"
                );
                continue;
            }
            match self.open.last_mut() {
                Some(parent) => {
                    let at = parent.lines.len();
                    parent.nested.push(NestedMessage { at, message });
                }
                None => self.events.push_back(Event::Message(message)),
            }
            return;
        }
    }
}

impl Iterator for Tokenizer {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        self.events.pop_front()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

fn find_marker(text: &str) -> Option<usize> {
    match (text.find(START_PREFIX), text.find(END_PREFIX)) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Parse a marker at the start of `text`, returning it with its byte length.
fn parse_marker(text: &str) -> Option<(Marker, usize)> {
    if let Some(body) = text.strip_prefix(START_PREFIX) {
        let close = body.find(MARKER_SUFFIX)?;
        let (code, severity) = match body[..close].split_once(':') {
            Some((code, severity)) => {
                let level: u8 = severity.parse().ok()?;
                let severity = Severity::from_u8(level).unwrap_or_else(|| {
                    debug!(level, "Unknown message severity, treating as info");
                    Severity::Info
                });
                (code, severity)
            }
            None => (&body[..close], Severity::Info),
        };
        let code = code.parse().ok()?;
        let len = START_PREFIX.len() + close + MARKER_SUFFIX.len();
        return Some((Marker::Start { code, severity }, len));
    }
    let body = text.strip_prefix(END_PREFIX)?;
    let close = body.find(MARKER_SUFFIX)?;
    let code = body[..close].parse().ok()?;
    Some((Marker::End { code }, END_PREFIX.len() + close + MARKER_SUFFIX.len()))
}
