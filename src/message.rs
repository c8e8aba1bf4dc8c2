//! Message text with source links.

use crate::model::{MessageLine, MessageSpan, MessageText};
use crate::util::find_location;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Maps TLA+ module names to their files.
///
/// Paths SANY reported while parsing win; anything else is assumed to sit
/// next to the checked spec.
#[derive(Debug, Clone, Default)]
pub(crate) struct ModuleResolver {
    spec_dir: PathBuf,
    known: HashMap<String, PathBuf>,
}

impl ModuleResolver {
    pub(crate) fn new(spec_file: &Path) -> Self {
        Self {
            spec_dir: spec_file.parent().map(Path::to_path_buf).unwrap_or_default(),
            known: HashMap::new(),
        }
    }

    pub(crate) fn register(&mut self, module: impl Into<String>, path: PathBuf) {
        self.known.insert(module.into(), path);
    }

    pub(crate) fn resolve(&self, module: &str) -> PathBuf {
        self.known
            .get(module)
            .cloned()
            .unwrap_or_else(|| self.spec_dir.join(format!("{module}.tla")))
    }
}

/// Build message text from body lines. Blank lines are dropped.
pub(crate) fn message_text<S: AsRef<str>>(lines: &[S], resolver: &ModuleResolver) -> MessageText {
    MessageText {
        lines: lines
            .iter()
            .map(AsRef::as_ref)
            .filter(|line| !line.trim().is_empty())
            .map(|line| message_line(line, resolver))
            .collect(),
    }
}

fn message_line(line: &str, resolver: &ModuleResolver) -> MessageLine {
    let mut spans = Vec::new();
    let mut rest = line;
    while let Some((begin, end, location)) = find_location(rest) {
        if begin > 0 {
            spans.push(MessageSpan::Text {
                text: rest[..begin].to_string(),
            });
        }
        spans.push(MessageSpan::SourceLink {
            text: rest[begin..end].to_string(),
            file_path: resolver.resolve(&location.module),
            location: location.range.start,
        });
        rest = &rest[end..];
    }
    if !rest.is_empty() {
        spans.push(MessageSpan::Text {
            text: rest.to_string(),
        });
    }
    MessageLine { spans }
}
