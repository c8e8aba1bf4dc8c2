//! TLA+ values as printed by TLC, and their change annotations.
//!
//! A trace state is parsed into a [`ValueNode`] tree. Keyed containers
//! (bindings, records, functions, sequences) and unordered sets have
//! different shapes so that the diff can pair children the right way for
//! each.

pub mod diff;
pub mod parse;

use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub use diff::diff_states;
pub use parse::{parse_state, parse_value};

/// Session-scoped identity of a value node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct ValueId(pub u64);

/// Hands out [`ValueId`]s in parse order, starting at 1.
///
/// A disabled arena assigns `ValueId(0)` to everything, which keeps test
/// expectations independent of parse order.
#[derive(Debug, Clone)]
pub struct ValueIds {
    next: u64,
    enabled: bool,
}

impl ValueIds {
    pub fn new() -> Self {
        Self {
            next: 1,
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            next: 0,
            enabled: false,
        }
    }

    pub fn next_id(&mut self) -> ValueId {
        if !self.enabled {
            return ValueId(0);
        }
        let id = ValueId(self.next);
        self.next += 1;
        id
    }
}

impl Default for ValueIds {
    fn default() -> Self {
        Self::new()
    }
}

/// How a node is addressed inside its parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum ValueKey {
    /// 1-based position in a set or sequence.
    Index(usize),
    /// Variable name, record field or rendered function argument.
    Name(String),
}

impl ValueKey {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }
}

impl fmt::Display for ValueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Change marker relative to the previous trace state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ChangeType {
    #[serde(rename = "A")]
    Added,
    #[serde(rename = "M")]
    Modified,
    #[serde(rename = "D")]
    Deleted,
    #[default]
    #[serde(rename = "N")]
    Unchanged,
}

/// Concrete syntax of a keyed container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordStyle {
    /// `/\ name = value` lines of a state.
    Bindings,
    /// `[field |-> value, ...]`
    Record,
    /// `(key :> value @@ ...)`
    Function,
    /// `<<a, b>>`
    Sequence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Shape {
    Leaf,
    Record {
        style: RecordStyle,
        items: Vec<ValueNode>,
        #[serde(rename = "deletedItems", skip_serializing_if = "Vec::is_empty")]
        deleted_items: Vec<ValueNode>,
    },
    /// A set; children are identified by their text.
    Collection {
        items: Vec<ValueNode>,
        #[serde(rename = "deletedItems", skip_serializing_if = "Vec::is_empty")]
        deleted_items: Vec<ValueNode>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueNode {
    pub id: ValueId,
    pub key: ValueKey,
    /// Canonical text of the value. Leaves keep the text TLC printed.
    #[serde(rename = "str")]
    pub text: String,
    pub change_type: ChangeType,
    #[serde(flatten)]
    pub shape: Shape,
}

impl ValueNode {
    pub fn leaf(id: ValueId, key: ValueKey, text: impl Into<String>) -> Self {
        Self {
            id,
            key,
            text: text.into(),
            change_type: ChangeType::Unchanged,
            shape: Shape::Leaf,
        }
    }

    /// A keyed container; its text is rendered from `items`.
    pub fn record(id: ValueId, key: ValueKey, style: RecordStyle, items: Vec<ValueNode>) -> Self {
        let mut node = Self {
            id,
            key,
            text: String::new(),
            change_type: ChangeType::Unchanged,
            shape: Shape::Record {
                style,
                items,
                deleted_items: Vec::new(),
            },
        };
        node.text = node.render();
        node
    }

    /// A set; its text is rendered from `items`.
    pub fn collection(id: ValueId, key: ValueKey, items: Vec<ValueNode>) -> Self {
        let mut node = Self {
            id,
            key,
            text: String::new(),
            change_type: ChangeType::Unchanged,
            shape: Shape::Collection {
                items,
                deleted_items: Vec::new(),
            },
        };
        node.text = node.render();
        node
    }

    /// The variable tree of a state that introduces no bindings.
    pub fn empty_state(id: ValueId) -> Self {
        Self::record(id, ValueKey::name(""), RecordStyle::Bindings, Vec::new())
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.shape, Shape::Leaf)
    }

    pub fn items(&self) -> &[ValueNode] {
        match &self.shape {
            Shape::Leaf => &[],
            Shape::Record { items, .. } | Shape::Collection { items, .. } => items,
        }
    }

    pub fn deleted_items(&self) -> &[ValueNode] {
        match &self.shape {
            Shape::Leaf => &[],
            Shape::Record { deleted_items, .. } | Shape::Collection { deleted_items, .. } => {
                deleted_items
            }
        }
    }

    /// Child by key.
    pub fn get(&self, key: &str) -> Option<&ValueNode> {
        self.items().iter().find(|item| match &item.key {
            ValueKey::Name(name) => name == key,
            ValueKey::Index(i) => key.parse::<usize>().ok() == Some(*i),
        })
    }

    /// Depth-first lookup by id, deleted items included.
    pub fn find(&self, id: ValueId) -> Option<&ValueNode> {
        if self.id == id {
            return Some(self);
        }
        self.items()
            .iter()
            .chain(self.deleted_items())
            .find_map(|child| child.find(id))
    }

    /// Canonical text of this node built from its children.
    pub fn render(&self) -> String {
        match &self.shape {
            Shape::Leaf => self.text.clone(),
            Shape::Collection { items, .. } => {
                format!("{{{}}}", join(items, ", ", |n| n.text.clone()))
            }
            Shape::Record { style, items, .. } => match style {
                RecordStyle::Bindings => join(items, "\n", |n| {
                    let head = format!("/\\ {} = ", n.key);
                    // Nested bindings continue under their first line.
                    let indent = format!("\n{}", " ".repeat(head.chars().count()));
                    format!("{head}{}", n.text.replace('\n', &indent))
                }),
                RecordStyle::Record => {
                    format!("[{}]", join(items, ", ", |n| format!("{} |-> {}", n.key, n.text)))
                }
                RecordStyle::Function => {
                    format!("({})", join(items, " @@ ", |n| format!("{} :> {}", n.key, n.text)))
                }
                RecordStyle::Sequence => {
                    format!("<<{}>>", join(items, ", ", |n| n.text.clone()))
                }
            },
        }
    }

    /// Set the marker on this node and reset it below.
    pub(crate) fn mark_subtree(&mut self, change: ChangeType) {
        self.change_type = change;
        if let Shape::Record { items, deleted_items, .. } | Shape::Collection { items, deleted_items } =
            &mut self.shape
        {
            deleted_items.clear();
            for item in items {
                item.mark_subtree(ChangeType::Unchanged);
            }
        }
    }
}

fn join(items: &[ValueNode], sep: &str, f: impl Fn(&ValueNode) -> String) -> String {
    items.iter().map(f).collect::<Vec<_>>().join(sep)
}

/// A grammar mismatch in value text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {offset}")]
pub struct ValueParseError {
    pub offset: usize,
    pub message: &'static str,
}
