//! Node types: NodeId, NodeKind, NodeData, AttrValue.

use std::fmt;

use slotmap::new_key_type;

new_key_type! {
    /// Unique identifier for a tree node. Copy, lightweight (u64).
    pub struct NodeId;

    /// Identifies one registered event listener.
    pub struct ListenerId;
}

// ---------------------------------------------------------------------------
// AttrValue
// ---------------------------------------------------------------------------

/// Value of an element attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Number(f64),
    Bool(bool),
}

impl AttrValue {
    /// Numeric view of the value. Strings are parsed; booleans are not numbers.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(n) => Some(*n),
            AttrValue::Str(s) => s.trim().parse().ok(),
            AttrValue::Bool(_) => None,
        }
    }

    /// String view of the value, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(s) => f.write_str(s),
            AttrValue::Number(n) if n.is_finite() && n.fract() == 0.0 => {
                write!(f, "{}", *n as i64)
            }
            AttrValue::Number(n) => write!(f, "{n}"),
            AttrValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<&String> for AttrValue {
    fn from(value: &String) -> Self {
        AttrValue::Str(value.clone())
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Number(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Number(f64::from(value))
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

/// Whether `name` can be used as an element tag or attribute name: non-empty,
/// with no whitespace, control characters, quotes, `<`, `>`, `/` or `=`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '<' | '>' | '/' | '='))
}

// ---------------------------------------------------------------------------
// NodeKind / NodeData
// ---------------------------------------------------------------------------

/// What a node represents in the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Top-level container: the engine root or a portal layer.
    Root,
    /// A tagged element (`div`, `rect`, ...).
    Element(String),
    /// A text leaf.
    Text(String),
    /// Transparent anchor owning a reactive, boundary or portal subtree.
    Fragment,
}

/// Data associated with a single node.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub kind: NodeKind,
    /// Attributes in insertion order.
    pub attributes: Vec<(String, AttrValue)>,
    /// Listeners attached to this node.
    pub listeners: Vec<ListenerId>,
}

impl NodeData {
    fn with_kind(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: Vec::new(),
            listeners: Vec::new(),
        }
    }

    pub fn root() -> Self {
        Self::with_kind(NodeKind::Root)
    }

    pub fn element(tag: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Element(tag.into()))
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Text(content.into()))
    }

    pub fn fragment() -> Self {
        Self::with_kind(NodeKind::Fragment)
    }

    /// Set an attribute (builder).
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// The element tag, if this is an element.
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element(_))
    }

    /// Look up an attribute by name.
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Set an attribute, replacing any previous value in place.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Remove an attribute. Returns the old value, if any.
    pub fn remove_attr(&mut self, name: &str) -> Option<AttrValue> {
        let index = self.attributes.iter().position(|(n, _)| n == name)?;
        Some(self.attributes.remove(index).1)
    }

    /// Whether the whitespace-separated `class` attribute contains `class`.
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .and_then(AttrValue::as_str)
            .is_some_and(|list| list.split_whitespace().any(|c| c == class))
    }
}
