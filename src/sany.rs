//! SANY's unframed output between `TLC_SANY_START` and the next message.
//!
//! ```text
//! Parsing file /Users/alice/TLA/foo.tla
//! Semantic errors:
//!
//! *** Errors: 1
//!
//! line 5, col 8 to line 5, col 8 of module foo
//!
//! Unknown operator: `a'.
//! ```

use crate::model::{Position, Range};
use crate::util::{scan_location, Scanner};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Something the dispatcher needs to record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SanyEvent {
    ParsedFile { module: String, path: PathBuf },
    Diagnostic { module: String, range: Range, lines: Vec<String> },
}

#[derive(Debug, Default)]
enum Block {
    #[default]
    Idle,
    /// After a location header; text runs to the next blank line.
    Semantic {
        module: String,
        range: Range,
        lines: Vec<String>,
    },
    /// After `***Parse Error***`, up to the next blank line.
    ParseError { lines: Vec<String> },
}

#[derive(Debug, Default)]
pub(crate) struct SanySection {
    block: Block,
    last_module: Option<String>,
}

impl SanySection {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn line(&mut self, line: &str) -> Option<SanyEvent> {
        let trimmed = line.trim();
        match &mut self.block {
            Block::Semantic { lines, .. } | Block::ParseError { lines } => {
                if trimmed.is_empty() {
                    return if lines.is_empty() { None } else { self.close_block() };
                }
                if let Some(header) = semantic_header(trimmed) {
                    let done = self.close_block();
                    self.block = header;
                    return done;
                }
                lines.push(trimmed.to_string());
                None
            }
            Block::Idle => {
                if let Some(path) = trimmed.strip_prefix("Parsing file ") {
                    let path = PathBuf::from(path.trim());
                    let module = module_of(&path);
                    self.last_module = Some(module.clone());
                    return Some(SanyEvent::ParsedFile { module, path });
                }
                if trimmed.starts_with("***Parse Error***") {
                    self.block = Block::ParseError { lines: Vec::new() };
                } else if let Some(header) = semantic_header(trimmed) {
                    self.block = header;
                }
                None
            }
        }
    }

    /// Close a diagnostic still being collected.
    pub(crate) fn finish(&mut self) -> Option<SanyEvent> {
        self.close_block()
    }

    fn close_block(&mut self) -> Option<SanyEvent> {
        match std::mem::take(&mut self.block) {
            Block::Idle => None,
            Block::Semantic { module, range, lines } => {
                (!lines.is_empty()).then_some(SanyEvent::Diagnostic { module, range, lines })
            }
            Block::ParseError { lines } => {
                let located = lines.iter().find_map(|l| parse_error_location(l));
                let (range, module) = match located {
                    Some((position, module)) => (
                        Range::new(position, Position::new(position.line, position.character + 1)),
                        module.or_else(|| self.last_module.clone()),
                    ),
                    None => (Range::default(), self.last_module.clone()),
                };
                let Some(module) = module else {
                    debug!("Parse error reported before any file was parsed");
                    return None;
                };
                Some(SanyEvent::Diagnostic { module, range, lines })
            }
        }
    }
}

fn semantic_header(line: &str) -> Option<Block> {
    let mut sc = Scanner::new(line);
    let location = scan_location(&mut sc)?;
    sc.is_at_end().then(|| Block::Semantic {
        module: location.module,
        range: location.range,
        lines: Vec::new(),
    })
}

/// `... at line 7, column 1 in module foo` or without the module part.
fn parse_error_location(line: &str) -> Option<(Position, Option<String>)> {
    let idx = line.find("at line ")?;
    let mut sc = Scanner::new(&line[idx + "at line ".len()..]);
    let row = sc.number()?;
    if !sc.eat(", column ") {
        return None;
    }
    let col = sc.number()?;
    let module = sc.eat(" in module ").then(|| sc.ident()).flatten().map(str::to_string);
    let position = Position::new(
        u32::try_from(row).ok()?.saturating_sub(1),
        u32::try_from(col).ok()?.saturating_sub(1),
    );
    Some((position, module))
}

fn module_of(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
