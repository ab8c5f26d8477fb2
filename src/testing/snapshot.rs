//! Snapshot rendering helpers.
//!
//! Functions for turning engine output (HTML, tree outlines, canvas display
//! lists) into plain strings suitable for `insta` snapshots and assertions.

use std::fmt::Write as _;

use crate::backend::{render_html, DrawCommand, SsrBackend};
use crate::dom::{Dom, NodeId, NodeKind};
use crate::engine::Engine;
use crate::error::RenderError;
use crate::scope::Scope;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Render a view once on a fresh SSR engine and return its HTML.
///
/// # Examples
///
/// ```ignore
/// use sprig::testing::render_to_string;
///
/// let html = render_to_string(|s| {
///     s.element("p", |s| s.text("Hello"))?;
///     Ok(())
/// })?;
/// assert_eq!(html, "<p>Hello</p>");
/// ```
pub fn render_to_string(
    view: impl Fn(&mut Scope<'_>) -> Result<(), RenderError> + 'static,
) -> Result<String, RenderError> {
    let engine = Engine::builder(SsrBackend::new())
        .id("render_to_string")
        .build()
        .map_err(|err| RenderError::component(err.to_string()))?;
    engine.mount_with(view)?;
    Ok(engine_html(&engine))
}

/// The HTML of every root layer of `engine`, in creation order.
///
/// Reads the tree directly, so it works for any backend and reflects
/// mutations that have not been flushed yet.
pub fn engine_html(engine: &Engine) -> String {
    engine.with_dom(|dom| {
        dom.roots()
            .iter()
            .map(|&root| render_html(dom, root))
            .collect()
    })
}

/// An indented outline of the subtree under `node`, one node per line.
///
/// Elements show their attributes, text shows its content quoted. Fragments
/// and roots are shown as `#fragment` / `#root` so slot anchors are visible.
pub fn outline(dom: &Dom, node: NodeId) -> String {
    let mut out = String::new();
    write_outline(dom, node, 0, &mut out);
    out.truncate(out.trim_end().len());
    out
}

/// Convert a canvas display list to one line per command.
pub fn display_list_to_string(commands: &[DrawCommand]) -> String {
    let lines: Vec<String> = commands
        .iter()
        .map(|command| match command {
            DrawCommand::FillRect { rect, fill, .. } => format!(
                "rect {},{} {}x{} {fill}",
                rect.origin.x, rect.origin.y, rect.size.width, rect.size.height
            ),
            DrawCommand::FillText {
                origin, text, fill, ..
            } => format!("text {},{} {text:?} {fill}", origin.x, origin.y),
        })
        .collect();
    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn write_outline(dom: &Dom, node: NodeId, depth: usize, out: &mut String) {
    let Some(data) = dom.get(node) else {
        return;
    };
    let indent = "  ".repeat(depth);
    match &data.kind {
        NodeKind::Root => {
            let _ = writeln!(out, "{indent}#root");
        }
        NodeKind::Fragment => {
            let _ = writeln!(out, "{indent}#fragment");
        }
        NodeKind::Text(text) => {
            let _ = writeln!(out, "{indent}{text:?}");
        }
        NodeKind::Element(tag) => {
            let _ = write!(out, "{indent}<{tag}");
            for (name, value) in &data.attributes {
                let _ = write!(out, " {name}={value}");
            }
            if !data.listeners.is_empty() {
                let _ = write!(out, " ({} listeners)", data.listeners.len());
            }
            out.push_str(">\n");
        }
    }
    for &child in dom.children(node) {
        write_outline(dom, child, depth + 1, out);
    }
}

// ===========================================================================
// Tests
// ===========================================================================
