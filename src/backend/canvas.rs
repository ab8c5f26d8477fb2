//! Canvas backend: a retained display list repainted per animation frame.
//!
//! Elements are positioned by their `x`/`y` attributes relative to the nearest
//! positioned ancestor and painted when they carry a positive `width` and
//! `height`. Text nodes paint at their parent's origin.

use std::any::Any;

use super::{Backend, Mutation};
use crate::dom::{AttrValue, Dom, NodeData, NodeId, NodeKind};
use crate::engine::Schedule;
use crate::geometry::{Point, Rect};

const DEFAULT_FILL: &str = "black";

/// One paint operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    FillRect {
        node: NodeId,
        rect: Rect,
        fill: String,
    },
    FillText {
        node: NodeId,
        origin: Point,
        text: String,
        fill: String,
    },
}

impl DrawCommand {
    pub fn node(&self) -> NodeId {
        match self {
            DrawCommand::FillRect { node, .. } | DrawCommand::FillText { node, .. } => *node,
        }
    }
}

/// Paints on flush when the tree changed. Flushes on animation frames.
#[derive(Debug, Default)]
pub struct CanvasBackend {
    display_list: Vec<DrawCommand>,
    dirty: bool,
    paints: u64,
}

impl CanvasBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The display list from the most recent paint, in paint order.
    pub fn display_list(&self) -> &[DrawCommand] {
        &self.display_list
    }

    /// Number of repaints so far.
    pub fn paints(&self) -> u64 {
        self.paints
    }

    fn repaint(&mut self, dom: &Dom) {
        self.display_list.clear();
        for &root in dom.roots() {
            paint_node(dom, root, Point::ORIGIN, DEFAULT_FILL, &mut self.display_list);
        }
        self.paints += 1;
    }
}

fn number(data: &NodeData, name: &str) -> f64 {
    data.attr(name).and_then(AttrValue::as_number).unwrap_or(0.0)
}

fn paint_node(dom: &Dom, node: NodeId, offset: Point, fill: &str, out: &mut Vec<DrawCommand>) {
    let Some(data) = dom.get(node) else {
        return;
    };
    match &data.kind {
        NodeKind::Text(text) => {
            out.push(DrawCommand::FillText {
                node,
                origin: offset,
                text: text.clone(),
                fill: fill.to_string(),
            });
        }
        NodeKind::Element(_) => {
            let origin = offset + Point::new(number(data, "x"), number(data, "y"));
            let own_fill = data.attr("fill").and_then(AttrValue::as_str);
            let rect = Rect::new(origin.x, origin.y, number(data, "width"), number(data, "height"));
            if !rect.size.is_empty() {
                out.push(DrawCommand::FillRect {
                    node,
                    rect,
                    fill: own_fill.unwrap_or(DEFAULT_FILL).to_string(),
                });
            }
            // Text inherits the `color` of its nearest element.
            let text_fill = data
                .attr("color")
                .and_then(AttrValue::as_str)
                .unwrap_or(fill);
            for &child in dom.children(node) {
                paint_node(dom, child, origin, text_fill, out);
            }
        }
        NodeKind::Root | NodeKind::Fragment => {
            for &child in dom.children(node) {
                paint_node(dom, child, offset, fill, out);
            }
        }
    }
}

impl Backend for CanvasBackend {
    fn name(&self) -> &'static str {
        "canvas"
    }

    fn schedule(&self) -> Schedule {
        Schedule::AnimationFrame
    }

    fn apply(&mut self, _dom: &Dom, _mutation: &Mutation) {
        self.dirty = true;
    }

    fn flush(&mut self, dom: &Dom) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        self.repaint(dom);
        tracing::trace!(commands = self.display_list.len(), "canvas repainted");
    }

    /// Topmost painted rectangle under `point`.
    fn hit_test(&self, point: Point) -> Option<NodeId> {
        self.display_list.iter().rev().find_map(|cmd| match cmd {
            DrawCommand::FillRect { node, rect, .. } if rect.contains(point) => Some(*node),
            _ => None,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
