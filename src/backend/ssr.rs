//! Server-side rendering backend: the tree serialized to an HTML string.

use std::any::Any;
use std::fmt::Write as _;

use super::{Backend, Mutation};
use crate::dom::{is_valid_name, AttrValue, Dom, NodeId, NodeKind};
use crate::engine::Schedule;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Re-serializes the whole tree on every flush. Flushes synchronously.
#[derive(Debug, Default)]
pub struct SsrBackend {
    html: String,
    dirty: bool,
}

impl SsrBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// HTML from the most recent flush. Root layers are concatenated in
    /// creation order.
    pub fn html(&self) -> &str {
        &self.html
    }
}

impl Backend for SsrBackend {
    fn name(&self) -> &'static str {
        "ssr"
    }

    fn schedule(&self) -> Schedule {
        Schedule::Sync
    }

    fn apply(&mut self, _dom: &Dom, _mutation: &Mutation) {
        self.dirty = true;
    }

    fn flush(&mut self, dom: &Dom) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        self.html.clear();
        for &root in dom.roots() {
            write_node(dom, root, &mut self.html);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Serialize the subtree under `node`.
pub fn render_html(dom: &Dom, node: NodeId) -> String {
    let mut out = String::new();
    write_node(dom, node, &mut out);
    out
}

fn write_node(dom: &Dom, node: NodeId, out: &mut String) {
    let Some(data) = dom.get(node) else {
        return;
    };
    match &data.kind {
        NodeKind::Text(text) => escape_into(text, false, out),
        NodeKind::Root | NodeKind::Fragment => {
            for &child in dom.children(node) {
                write_node(dom, child, out);
            }
        }
        NodeKind::Element(tag) if !is_valid_name(tag) => {
            for &child in dom.children(node) {
                write_node(dom, child, out);
            }
        }
        NodeKind::Element(tag) => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in &data.attributes {
                if !is_valid_name(name) {
                    continue;
                }
                match value {
                    AttrValue::Bool(false) => {}
                    AttrValue::Bool(true) => {
                        out.push(' ');
                        out.push_str(name);
                    }
                    other => {
                        let _ = write!(out, " {name}=\"");
                        escape_into(&other.to_string(), true, out);
                        out.push('"');
                    }
                }
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&tag.as_str()) {
                return;
            }
            for &child in dom.children(node) {
                write_node(dom, child, out);
            }
            let _ = write!(out, "</{tag}>");
        }
    }
}

fn escape_into(raw: &str, attribute: bool, out: &mut String) {
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}
